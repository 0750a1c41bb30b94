//! Core types for bucketfile.
//!
//! This crate provides the data model shared by the orchestration engine:
//! the key/path model for a flat object namespace, file descriptors,
//! validation results, folder trees, the error taxonomy and configuration.

mod config;
mod error;
mod file;
mod key;
pub mod path;
mod tree;
mod validation;

pub use config::{
    ClientConfig, MAX_FILE_SIZE, MAX_FILES_PER_BATCH, MAX_NAME_LENGTH, RecoveryConfig,
    RetryConfig, RetryConfigBuilder, UploadLimits, UploadLimitsBuilder,
};
pub use error::{BackendErrorKind, ErrorKind, KeyError, TransferError};
pub use file::{FileDescriptor, FileHandle, ItemRef, ObjectInfo};
pub use key::StorageKey;
pub use tree::{FolderNode, FolderTree, TreeStats};
pub use validation::ValidationResult;
