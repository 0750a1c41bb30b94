//! Error types for storage operations.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use thiserror::Error;

/// Reasons a raw string is not a valid [`StorageKey`](crate::StorageKey).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// The key is empty.
    #[error("Storage key cannot be empty")]
    Empty,

    /// The key starts with `/`.
    #[error("Storage key cannot start with '/': {key}")]
    LeadingSlash { key: String },

    /// The key contains `..`.
    #[error("Storage key cannot contain '..': {key}")]
    ParentTraversal { key: String },

    /// The key contains a control character.
    #[error("Storage key contains control characters: {key:?}")]
    ControlCharacter { key: String },
}

/// Backend failure signatures reported by the object store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum BackendErrorKind {
    /// The bucket does not exist.
    #[strum(to_string = "NoSuchBucket")]
    BucketNotFound,
    /// Credentials lack permission for the request.
    #[strum(to_string = "AccessDenied")]
    AccessDenied,
    /// The request was malformed.
    #[strum(to_string = "InvalidRequest")]
    InvalidRequest,
    /// Any other backend failure.
    #[strum(to_string = "InternalError")]
    Other,
}

impl BackendErrorKind {
    /// Classify a backend error code such as `NoSuchBucket`.
    pub fn from_code(code: &str) -> Self {
        match code {
            "NoSuchBucket" => Self::BucketNotFound,
            "AccessDenied" | "Forbidden" | "AllAccessDisabled" => Self::AccessDenied,
            "InvalidRequest" | "InvalidArgument" | "MalformedXML" | "InvalidObjectName" => {
                Self::InvalidRequest
            }
            _ => Self::Other,
        }
    }
}

/// Flat classification tag of a [`TransferError`].
///
/// Used to look up recovery strategies and to decide retryability without
/// inspecting message text.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Network,
    Timeout,
    Http,
    Auth,
    BucketNotFound,
    AccessDenied,
    InvalidRequest,
    Backend,
    Aborted,
    Io,
    Other,
}

/// Errors produced while preparing or executing a transfer.
#[derive(Debug, Clone, Error)]
pub enum TransferError {
    /// Pre-flight checks failed; nothing was sent.
    #[error("Validation failed: {}", .errors.join("; "))]
    Validation { errors: Vec<String> },

    /// Connection, DNS or fetch failure.
    #[error("Network error: {message}")]
    Network { message: String },

    /// A per-attempt timeout fired.
    #[error("Request timed out after {after:?}")]
    Timeout { after: Duration },

    /// Non-success HTTP status without a more specific backend code.
    #[error("Request failed with status {status}: {message}")]
    Http { status: u16, message: String },

    /// Credentials are missing or expired.
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    /// The object store rejected the request.
    #[error("{kind}: {message}")]
    Backend {
        kind: BackendErrorKind,
        message: String,
    },

    /// A cancellation token fired.
    #[error("Operation aborted")]
    Aborted,

    /// Local I/O failure reading a file or writing to a local store.
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Anything else.
    #[error("{message}")]
    Other { message: String },
}

impl TransferError {
    /// Create a validation error from accumulated messages.
    pub fn validation(errors: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::Validation {
            errors: errors.into_iter().map(Into::into).collect(),
        }
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create an error from a backend error code and message.
    pub fn backend(code: &str, message: impl Into<String>) -> Self {
        Self::Backend {
            kind: BackendErrorKind::from_code(code),
            message: message.into(),
        }
    }

    /// Create an error from an HTTP status.
    ///
    /// 401 becomes [`TransferError::Auth`], everything else keeps its status.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 => Self::Auth { message },
            _ => Self::Http { status, message },
        }
    }

    /// Create an I/O error.
    pub fn io(error: &std::io::Error) -> Self {
        Self::Io {
            message: error.to_string(),
        }
    }

    /// The classification tag of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Network { .. } => ErrorKind::Network,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Http { .. } => ErrorKind::Http,
            Self::Auth { .. } => ErrorKind::Auth,
            Self::Backend { kind, .. } => match kind {
                BackendErrorKind::BucketNotFound => ErrorKind::BucketNotFound,
                BackendErrorKind::AccessDenied => ErrorKind::AccessDenied,
                BackendErrorKind::InvalidRequest => ErrorKind::InvalidRequest,
                BackendErrorKind::Other => ErrorKind::Backend,
            },
            Self::Aborted => ErrorKind::Aborted,
            Self::Io { .. } => ErrorKind::Io,
            Self::Other { .. } => ErrorKind::Other,
        }
    }

    /// Whether this is a transient network-class failure.
    pub fn is_network(&self) -> bool {
        match self {
            Self::Network { .. } | Self::Timeout { .. } => true,
            Self::Http { status, .. } => matches!(status, 429 | 502 | 503 | 504),
            _ => false,
        }
    }

    /// HTTP status reported to callers of the upload and tree endpoints.
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::Validation | ErrorKind::InvalidRequest => 400,
            ErrorKind::AccessDenied => 403,
            ErrorKind::BucketNotFound => 404,
            _ => 500,
        }
    }

    /// One descriptive message suitable for showing to a user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation { errors } => errors.join("\n"),
            Self::Backend {
                kind: BackendErrorKind::BucketNotFound,
                ..
            } => "Storage bucket not found".to_string(),
            Self::Backend {
                kind: BackendErrorKind::AccessDenied,
                ..
            } => "Access denied to storage bucket".to_string(),
            Self::Backend {
                kind: BackendErrorKind::InvalidRequest,
                message,
            } => format!("Invalid request: {message}"),
            Self::Auth { .. } => "Authentication failed. Please sign in again.".to_string(),
            Self::Aborted => "Operation was cancelled".to_string(),
            other if other.is_network() => {
                "Network connection failed. Please check your connection.".to_string()
            }
            other => format!("Operation failed: {other}"),
        }
    }
}

impl From<KeyError> for TransferError {
    fn from(err: KeyError) -> Self {
        Self::Validation {
            errors: vec![err.to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_code_mapping() {
        assert_eq!(TransferError::backend("NoSuchBucket", "x").status_code(), 404);
        assert_eq!(TransferError::backend("AccessDenied", "x").status_code(), 403);
        assert_eq!(TransferError::backend("InvalidRequest", "x").status_code(), 400);
        assert_eq!(TransferError::backend("SlowDown", "x").status_code(), 500);
    }

    #[test]
    fn test_network_classification() {
        assert!(TransferError::network("connection reset").is_network());
        assert!(TransferError::http(503, "unavailable").is_network());
        assert!(TransferError::http(429, "slow down").is_network());
        assert!(!TransferError::http(400, "bad").is_network());
        assert!(!TransferError::http(500, "boom").is_network());
        assert_eq!(TransferError::http(401, "expired").kind(), ErrorKind::Auth);
    }

    #[test]
    fn test_error_kind_strings() {
        assert_eq!(ErrorKind::BucketNotFound.to_string(), "bucket_not_found");
        assert_eq!("auth".parse::<ErrorKind>().unwrap(), ErrorKind::Auth);
    }

    #[test]
    fn test_user_message_is_single_line_for_backend() {
        let err = TransferError::backend("NoSuchBucket", "The bucket does not exist");
        assert_eq!(err.user_message(), "Storage bucket not found");
    }
}
