//! Tracing subscriber setup for the command line.

use color_eyre::eyre::{Result, eyre};
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install a compact stderr logger.
///
/// `RUST_LOG` wins when set; otherwise every bucketfile crate logs at info,
/// or debug when `verbose` is on.
pub fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("bucketfile={level}")))
        .map_err(|e| eyre!("Failed to create log filter: {e}"))?;

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| eyre!("Failed to install logger: {e}"))?;

    Ok(())
}
