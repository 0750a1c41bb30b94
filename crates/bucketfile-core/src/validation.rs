//! Validation result container.

use serde::{Deserialize, Serialize};

/// Outcome of a pre-flight check. Every violation found is listed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// Whether no violation was found.
    pub is_valid: bool,
    /// Human-readable violations, in the order they were detected.
    pub errors: Vec<String>,
}

impl ValidationResult {
    /// Build a result from collected errors.
    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }

    /// A passing result.
    pub fn valid() -> Self {
        Self::from_errors(Vec::new())
    }

    /// Append the errors of another result.
    pub fn merge(mut self, other: ValidationResult) -> Self {
        self.errors.extend(other.errors);
        self.is_valid = self.errors.is_empty();
        self
    }

    /// Check whether any error mentions `needle`.
    pub fn mentions(&self, needle: &str) -> bool {
        self.errors.iter().any(|e| e.contains(needle))
    }

    /// Convert into a `Result`, turning failures into a validation error.
    pub fn into_result(self) -> Result<(), crate::TransferError> {
        if self.is_valid {
            Ok(())
        } else {
            Err(crate::TransferError::Validation {
                errors: self.errors,
            })
        }
    }
}
