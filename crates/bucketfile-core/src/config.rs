//! Client configuration types.

use std::path::Path;
use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::error::TransferError;

/// Maximum size of a single uploaded file: 100 MiB.
pub const MAX_FILE_SIZE: u64 = 104_857_600;

/// Maximum number of files accepted in one batch.
pub const MAX_FILES_PER_BATCH: usize = 50;

/// Maximum length of a file or folder name in UTF-16 code units.
pub const MAX_NAME_LENGTH: usize = 255;

/// Limits enforced before any upload is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
#[serde(default)]
pub struct UploadLimits {
    /// Largest accepted file in bytes.
    #[builder(default = "MAX_FILE_SIZE")]
    pub max_file_size: u64,

    /// Largest accepted batch.
    #[builder(default = "MAX_FILES_PER_BATCH")]
    pub max_files_per_batch: usize,

    /// Longest accepted name in UTF-16 code units.
    #[builder(default = "MAX_NAME_LENGTH")]
    pub max_name_length: usize,
}

fn check_limits(max_files_per_batch: usize, max_name_length: usize) -> Result<(), String> {
    if max_files_per_batch == 0 {
        return Err("max_files_per_batch must be at least 1".to_string());
    }
    if max_name_length == 0 {
        return Err("max_name_length must be at least 1".to_string());
    }
    Ok(())
}

impl UploadLimitsBuilder {
    fn validate(&self) -> Result<(), String> {
        check_limits(
            self.max_files_per_batch.unwrap_or(MAX_FILES_PER_BATCH),
            self.max_name_length.unwrap_or(MAX_NAME_LENGTH),
        )
    }
}

impl UploadLimits {
    /// Create a new limits builder.
    pub fn builder() -> UploadLimitsBuilder {
        UploadLimitsBuilder::default()
    }

    /// Check the same invariants the builder enforces.
    pub fn validate(&self) -> Result<(), String> {
        check_limits(self.max_files_per_batch, self.max_name_length)
    }
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_file_size: MAX_FILE_SIZE,
            max_files_per_batch: MAX_FILES_PER_BATCH,
            max_name_length: MAX_NAME_LENGTH,
        }
    }
}

/// Backoff parameters for retried storage calls.
#[derive(Debug, Clone, Copy, PartialEq, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    #[builder(default = "3")]
    pub max_attempts: u32,

    /// Delay before the second attempt, in milliseconds.
    #[builder(default = "1000")]
    pub initial_delay_ms: u64,

    /// Upper bound for any single delay, in milliseconds.
    #[builder(default = "10_000")]
    pub max_delay_ms: u64,

    /// Multiplier applied to the delay after each retry.
    #[builder(default = "2.0")]
    pub backoff_factor: f64,
}

fn check_backoff(factor: f64) -> Result<(), String> {
    if !factor.is_finite() || factor < 1.0 {
        return Err("backoff_factor must be a finite number >= 1".to_string());
    }
    Ok(())
}

impl RetryConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        self.backoff_factor.map_or(Ok(()), check_backoff)
    }
}

impl RetryConfig {
    /// Create a new retry config builder.
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::default()
    }

    /// Check the same invariants the builder enforces.
    pub fn validate(&self) -> Result<(), String> {
        check_backoff(self.backoff_factor)
    }

    /// Initial delay as a [`Duration`].
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// Maximum delay as a [`Duration`].
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 10_000,
            backoff_factor: 2.0,
        }
    }
}

/// Settings for automatic error recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// How long to wait for connectivity to return, in milliseconds.
    pub online_timeout_ms: u64,
}

impl RecoveryConfig {
    /// Online wait timeout as a [`Duration`].
    pub fn online_timeout(&self) -> Duration {
        Duration::from_millis(self.online_timeout_ms)
    }
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            online_timeout_ms: 30_000,
        }
    }
}

/// Complete client configuration, usually read from `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Upload limits.
    pub limits: UploadLimits,
    /// Retry behaviour for storage calls.
    pub retry: RetryConfig,
    /// Recovery behaviour after retries are exhausted.
    pub recovery: RecoveryConfig,
}

impl ClientConfig {
    /// Parse a TOML document. Missing sections fall back to defaults.
    ///
    /// Values are checked like the builders check them.
    pub fn from_toml_str(source: &str) -> Result<Self, TransferError> {
        let invalid = |message: String| TransferError::Other {
            message: format!("Invalid configuration: {message}"),
        };
        let config: Self = toml::from_str(source).map_err(|e| invalid(e.to_string()))?;
        config.limits.validate().map_err(invalid)?;
        config.retry.validate().map_err(invalid)?;
        Ok(config)
    }

    /// Load configuration from a file. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, TransferError> {
        match std::fs::read_to_string(path) {
            Ok(source) => Self::from_toml_str(&source),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(TransferError::io(&e)),
        }
    }
}
