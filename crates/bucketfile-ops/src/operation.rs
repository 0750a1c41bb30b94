//! File operation types.

use bucketfile_core::{ErrorKind, FileDescriptor, ItemRef, TransferError};
use serde::{Deserialize, Serialize};

use crate::progress::OperationType;

/// A file operation to be executed against the store.
#[derive(Debug, Clone)]
pub enum FileOperation {
    /// Upload files into a destination folder.
    Upload {
        files: Vec<FileDescriptor>,
        destination: String,
    },
    /// Move an existing file or folder into a destination folder.
    Move { item: ItemRef, destination: String },
    /// Create an empty folder.
    CreateFolder { parent: String, name: String },
}

impl FileOperation {
    /// Create an upload operation.
    pub fn upload(files: Vec<FileDescriptor>, destination: impl Into<String>) -> Self {
        Self::Upload {
            files,
            destination: destination.into(),
        }
    }

    /// Create a move operation.
    pub fn move_to(item: ItemRef, destination: impl Into<String>) -> Self {
        Self::Move {
            item,
            destination: destination.into(),
        }
    }

    /// Create a folder creation operation.
    pub fn create_folder(parent: impl Into<String>, name: impl Into<String>) -> Self {
        Self::CreateFolder {
            parent: parent.into(),
            name: name.into(),
        }
    }

    /// The kind of operation.
    pub fn operation_type(&self) -> OperationType {
        match self {
            Self::Upload { .. } => OperationType::Upload,
            Self::Move { .. } => OperationType::Move,
            Self::CreateFolder { .. } => OperationType::CreateFolder,
        }
    }
}

/// An error that occurred for one item of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationError {
    /// The file name or key that failed.
    pub target: String,
    /// A human-readable error message.
    pub message: String,
    /// Classification of the failure.
    pub kind: ErrorKind,
}

impl OperationError {
    /// Create a new operation error.
    pub fn new(target: impl Into<String>, message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            target: target.into(),
            message: message.into(),
            kind,
        }
    }

    /// Describe a transfer error for `target`.
    pub fn from_transfer(target: impl Into<String>, error: &TransferError) -> Self {
        Self::new(target, error.user_message(), error.kind())
    }
}

impl std::fmt::Display for OperationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.target, self.message)
    }
}
