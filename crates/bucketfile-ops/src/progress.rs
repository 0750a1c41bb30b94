//! Progress reporting types for transfers.

use serde::{Deserialize, Serialize};

use crate::OperationError;

/// The type of operation being performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationType {
    Upload,
    Move,
    CreateFolder,
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Upload => write!(f, "Upload"),
            Self::Move => write!(f, "Move"),
            Self::CreateFolder => write!(f, "Create folder"),
        }
    }
}

/// Progress information for an ongoing operation.
#[derive(Debug, Clone)]
pub struct OperationProgress {
    /// The type of operation.
    pub operation_type: OperationType,
    /// Number of items finished, successfully or not.
    pub files_completed: usize,
    /// Total number of items to process.
    pub files_total: usize,
    /// Number of bytes sent so far.
    pub bytes_processed: u64,
    /// Total bytes to send (may be 0 if unknown).
    pub bytes_total: u64,
    /// The item that finished most recently.
    pub current_file: Option<String>,
    /// Errors encountered so far.
    pub errors: Vec<OperationError>,
}

impl OperationProgress {
    /// Create a new progress tracker for an operation.
    pub fn new(operation_type: OperationType, files_total: usize, bytes_total: u64) -> Self {
        Self {
            operation_type,
            files_completed: 0,
            files_total,
            bytes_processed: 0,
            bytes_total,
            current_file: None,
            errors: Vec::new(),
        }
    }

    /// Get the progress as a percentage (0.0 to 100.0).
    pub fn percentage(&self) -> f64 {
        if self.bytes_total > 0 {
            (self.bytes_processed as f64 / self.bytes_total as f64) * 100.0
        } else if self.files_total > 0 {
            (self.files_completed as f64 / self.files_total as f64) * 100.0
        } else {
            0.0
        }
    }

    /// Check if the operation has any errors.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Record a finished item.
    pub fn complete_file(&mut self, name: impl Into<String>, bytes: u64) {
        self.files_completed += 1;
        self.bytes_processed += bytes;
        self.current_file = Some(name.into());
    }

    /// Record a failed item.
    pub fn fail_file(&mut self, error: OperationError) {
        self.files_completed += 1;
        self.current_file = Some(error.target.clone());
        self.errors.push(error);
    }

    /// Snapshot the final result.
    pub fn finish(&self) -> OperationComplete {
        let failed = self.errors.len();
        OperationComplete {
            operation_type: self.operation_type,
            succeeded: self.files_completed.saturating_sub(failed),
            failed,
            bytes_processed: self.bytes_processed,
            errors: self.errors.clone(),
        }
    }
}

/// Result of a completed operation.
#[derive(Debug, Clone)]
pub struct OperationComplete {
    /// The type of operation.
    pub operation_type: OperationType,
    /// Number of items successfully processed.
    pub succeeded: usize,
    /// Number of items that failed.
    pub failed: usize,
    /// Total bytes processed.
    pub bytes_processed: u64,
    /// Errors that occurred.
    pub errors: Vec<OperationError>,
}

impl OperationComplete {
    /// Check if the operation was fully successful.
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Get a human-readable summary of the operation.
    pub fn summary(&self) -> String {
        let action = match self.operation_type {
            OperationType::Upload => "Uploaded",
            OperationType::Move => "Moved",
            OperationType::CreateFolder => "Created",
        };

        if self.failed == 0 {
            format!("{} {} items", action, self.succeeded)
        } else {
            format!(
                "{} {} items, {} failed",
                action, self.succeeded, self.failed
            )
        }
    }
}
