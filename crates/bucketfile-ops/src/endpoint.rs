//! Request and response bodies of the upload and folder-tree endpoints.

use serde::{Deserialize, Serialize};

use bucketfile_core::{FileDescriptor, FolderTree, TransferError};

/// Form submitted to the upload endpoint.
#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    /// The uploaded file, absent when the form had no file field.
    pub file: Option<FileDescriptor>,
    /// Destination folder, `""` for the root.
    pub path: String,
}

impl UploadRequest {
    /// Build a request for one file.
    pub fn new(file: FileDescriptor, path: impl Into<String>) -> Self {
        Self {
            file: Some(file),
            path: path.into(),
        }
    }
}

/// Body returned by the upload endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Name the object was stored under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Name as submitted, before sanitization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadResponse {
    /// A failure body carrying one message.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            key: None,
            size: None,
            content_type: None,
            filename: None,
            original_filename: None,
            etag: None,
            error: Some(error.into()),
        }
    }

    /// Status and body for a failed upload.
    pub fn from_error(error: &TransferError) -> (u16, Self) {
        (error.status_code(), Self::failure(error.user_message()))
    }
}

/// Body returned by the folder-tree endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderTreeResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tree: Option<FolderTree>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FolderTreeResponse {
    /// A successful body.
    pub fn ok(tree: FolderTree) -> Self {
        Self {
            success: true,
            tree: Some(tree),
            error: None,
        }
    }

    /// A failure body.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            tree: None,
            error: Some(error.into()),
        }
    }
}
