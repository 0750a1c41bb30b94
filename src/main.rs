//! bucketfile - reliable uploads and folder management for object stores.
//!
//! Usage:
//!   bkt upload FILE... [--to FOLDER]   Upload files into a folder
//!   bkt mkdir NAME [--in FOLDER]       Create an empty folder
//!   bkt mv KEY FOLDER                  Move a file or folder
//!   bkt tree [PREFIX]                  Show the folder hierarchy
//!   bkt validate FILE...               Check files against the upload limits
//!   bkt sanitize NAME...               Show the name a file would be stored as
//!   bkt --help                         Show help

mod logging;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, bail, eyre};
use tokio_util::sync::CancellationToken;

use bucketfile_core::{ClientConfig, FileDescriptor, FolderNode, ItemRef, TransferError};
use bucketfile_ops::{
    ConflictResolution, LocalStore, TracingNotifier, TransferEvent, TransferOrchestrator,
    sanitize_filename, validate_files,
};

#[derive(Parser)]
#[command(
    name = "bucketfile",
    version,
    about = "Reliable uploads, moves and folders for object stores",
    long_about = "bucketfile validates, sanitizes and uploads files into a bucket, \
                  retrying transient failures with exponential backoff.\n\n\
                  The bucket is a local directory given with --root."
)]
struct Cli {
    /// Directory acting as the bucket
    #[arg(short, long, global = true, default_value = ".")]
    root: PathBuf,

    /// Config file (defaults to <config dir>/bucketfile/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check files against the upload limits without sending anything
    Validate {
        /// Files to check
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Show the sanitized name each input would be stored under
    Sanitize {
        /// Names to sanitize
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Upload files into a folder
    Upload {
        /// Files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Destination folder (defaults to the bucket root)
        #[arg(short, long, default_value = "")]
        to: String,

        /// What to do when a name already exists
        #[arg(long, default_value = "overwrite")]
        on_conflict: ConflictMode,

        /// Per-attempt timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Create an empty folder
    Mkdir {
        /// Folder name
        name: String,

        /// Parent folder (defaults to the bucket root)
        #[arg(long = "in", default_value = "")]
        parent: String,
    },

    /// Move a file or folder (keys ending in '/') into another folder
    Mv {
        /// Key of the item to move
        key: String,

        /// Destination folder
        destination: String,
    },

    /// Show the folder hierarchy
    Tree {
        /// Only show folders under this prefix
        #[arg(default_value = "")]
        prefix: String,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ConflictMode {
    Overwrite,
    Rename,
    Skip,
}

impl From<ConflictMode> for ConflictResolution {
    fn from(mode: ConflictMode) -> Self {
        match mode {
            ConflictMode::Overwrite => Self::Overwrite,
            ConflictMode::Rename => Self::AutoRename,
            ConflictMode::Skip => Self::Skip,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    logging::init_logging(cli.verbose)?;

    let config = load_config(cli.config.as_deref())?;
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, cancelling");
                cancel.cancel();
            }
        });
    }

    let orchestrator = TransferOrchestrator::new(
        Arc::new(LocalStore::new(&cli.root)),
        &config,
        Arc::new(TracingNotifier),
    );

    match cli.command {
        Command::Validate { files } => run_validate(&files, &config)?,
        Command::Sanitize { names } => run_sanitize(&names)?,
        Command::Upload {
            files,
            to,
            on_conflict,
            timeout,
        } => {
            let mut orchestrator = orchestrator.with_conflict_resolution(on_conflict.into());
            if let Some(secs) = timeout {
                orchestrator = orchestrator.with_attempt_timeout(Duration::from_secs(secs));
            }
            run_upload(&orchestrator, &files, to, cancel).await?;
        }
        Command::Mkdir { name, parent } => {
            let key = orchestrator
                .create_folder(&parent, &name, &cancel)
                .await
                .map_err(report)?;
            println!("Created {key}");
        }
        Command::Mv { key, destination } => {
            let item = if key.ends_with('/') {
                ItemRef::folder(&key)
            } else {
                ItemRef::file(key)
            };
            let outcome = orchestrator
                .move_item(&item, &destination, &cancel)
                .await
                .map_err(report)?;
            println!(
                "Moved {} -> {} ({} objects)",
                outcome.from, outcome.to, outcome.objects
            );
        }
        Command::Tree { prefix, format } => run_tree(&orchestrator, &prefix, format, &cancel).await?,
    }

    Ok(())
}

/// Load the config file, falling back to defaults when none exists.
fn load_config(explicit: Option<&Path>) -> Result<ClientConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match dirs::config_dir() {
            Some(dir) => dir.join("bucketfile").join("config.toml"),
            None => return Ok(ClientConfig::default()),
        },
    };

    tracing::debug!(path = %path.display(), "Loading config");
    ClientConfig::load(&path).wrap_err_with(|| format!("Invalid config file {}", path.display()))
}

fn report(error: TransferError) -> color_eyre::Report {
    eyre!(error.user_message())
}

/// Describe local files for the orchestrator.
fn describe_files(paths: &[PathBuf]) -> Result<Vec<FileDescriptor>> {
    paths
        .iter()
        .map(|path| -> Result<FileDescriptor> {
            let metadata = std::fs::metadata(path)
                .wrap_err_with(|| format!("Cannot read {}", path.display()))?;
            if !metadata.is_file() {
                bail!("{} is not a file", path.display());
            }
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            Ok(FileDescriptor::from_path(
                name,
                mime.essence_str(),
                metadata.len(),
                path,
            ))
        })
        .collect()
}

fn run_validate(paths: &[PathBuf], config: &ClientConfig) -> Result<()> {
    let files = describe_files(paths)?;
    let result = validate_files(&files, &config.limits);

    if result.is_valid {
        let total: u64 = files.iter().map(|f| f.size).sum();
        println!("{} files OK ({})", files.len(), format_size(total));
        return Ok(());
    }

    for error in &result.errors {
        println!("  {error}");
    }
    bail!("{} problem(s) found", result.errors.len())
}

fn run_sanitize(names: &[String]) -> Result<()> {
    let mut failed = 0;
    for name in names {
        match sanitize_filename(name) {
            Ok(clean) => println!("{name} -> {clean}"),
            Err(e) => {
                failed += 1;
                println!("{name} -> error: {}", e.user_message());
            }
        }
    }

    if failed > 0 {
        bail!("{failed} name(s) could not be sanitized");
    }
    Ok(())
}

async fn run_upload(
    orchestrator: &TransferOrchestrator<LocalStore>,
    paths: &[PathBuf],
    destination: String,
    cancel: CancellationToken,
) -> Result<()> {
    let files = describe_files(paths)?;
    let mut rx = orchestrator.start_upload(files, destination, cancel);

    let mut complete = None;
    while let Some(event) = rx.recv().await {
        match event {
            TransferEvent::Progress(progress) => {
                eprintln!(
                    "[{:>5.1}%] {} ({}/{})",
                    progress.percentage(),
                    progress.current_file.as_deref().unwrap_or_default(),
                    progress.files_completed,
                    progress.files_total
                );
            }
            TransferEvent::FileFailed(error) => eprintln!("  failed: {error}"),
            TransferEvent::Complete(done) => complete = Some(done),
        }
    }

    let complete = complete.ok_or_else(|| eyre!("Upload ended without a result"))?;
    println!(
        "{} ({})",
        complete.summary(),
        format_size(complete.bytes_processed)
    );
    if !complete.is_success() {
        bail!("{} upload(s) failed", complete.failed);
    }
    Ok(())
}

async fn run_tree(
    orchestrator: &TransferOrchestrator<LocalStore>,
    prefix: &str,
    format: OutputFormat,
    cancel: &CancellationToken,
) -> Result<()> {
    let (status, response) = orchestrator.folder_tree(prefix, cancel).await;

    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(&response)?);
    }

    let tree = match response.tree {
        Some(tree) if response.success => tree,
        _ => bail!(
            "{} (status {status})",
            response.error.unwrap_or_else(|| "Folder tree unavailable".to_string())
        ),
    };

    if let OutputFormat::Text = format {
        let title = if tree.prefix.is_empty() { "/" } else { tree.prefix.as_str() };
        println!("{}", "─".repeat(60));
        println!(" {} - {}", title, format_size(tree.stats.total_size));
        println!(
            " {} files, {} folders",
            tree.stats.total_files, tree.stats.total_folders
        );
        println!("{}", "─".repeat(60));
        for folder in &tree.folders {
            print_folder(folder, 0);
        }
    }

    Ok(())
}

/// Print a folder and its subfolders.
fn print_folder(node: &FolderNode, depth: usize) {
    let indent = "  ".repeat(depth);
    println!(
        "{}▼ {:<40} {:>6} files {:>10}",
        indent,
        format!("{}/", node.name),
        node.file_count,
        format_size(node.total_size)
    );
    for child in &node.children {
        print_folder(child, depth + 1);
    }
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}
