//! File descriptors, object listings and drag item references.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::key::StorageKey;

/// Where the bytes of a selected file live.
#[derive(Debug, Clone)]
pub enum FileHandle {
    /// Contents already held in memory.
    Bytes(Arc<[u8]>),
    /// A file on the local disk, read when the transfer starts.
    Path(PathBuf),
}

/// A file selected or dropped by the user, ready to be validated and sent.
#[derive(Debug, Clone)]
pub struct FileDescriptor {
    /// Display name as provided by the user.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Declared MIME type.
    pub mime_type: String,
    /// Source of the contents.
    pub handle: FileHandle,
}

impl FileDescriptor {
    /// Create a descriptor for in-memory contents.
    pub fn from_bytes(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Self {
        let bytes = bytes.into();
        Self {
            name: name.into(),
            size: bytes.len() as u64,
            mime_type: mime_type.into(),
            handle: FileHandle::Bytes(bytes),
        }
    }

    /// Create a descriptor for a file on disk whose size is already known.
    pub fn from_path(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        size: u64,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            size,
            mime_type: mime_type.into(),
            handle: FileHandle::Path(path.into()),
        }
    }
}

/// Reference to an existing item that is being dragged inside the app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRef {
    /// Full key of the item; folders end in `/`.
    pub key: String,
    /// Display name.
    pub name: String,
    /// Whether the item is a folder.
    pub is_folder: bool,
}

impl ItemRef {
    /// Create a reference to a file.
    pub fn file(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            name: crate::path::get_path_name(&key).to_string(),
            key,
            is_folder: false,
        }
    }

    /// Create a reference to a folder. A trailing `/` is added if missing.
    pub fn folder(key: impl AsRef<str>) -> Self {
        let key = crate::path::ensure_folder_path(key.as_ref());
        Self {
            name: crate::path::get_path_name(&key).to_string(),
            key,
            is_folder: true,
        }
    }
}

/// One entry of an object listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectInfo {
    /// Object key.
    pub key: StorageKey,
    /// Size in bytes.
    pub size: u64,
    /// Entity tag reported by the store.
    pub etag: Option<String>,
    /// Last modification time, if known.
    pub last_modified: Option<DateTime<Utc>>,
}

impl ObjectInfo {
    /// Create listing entry without optional metadata.
    pub fn new(key: StorageKey, size: u64) -> Self {
        Self {
            key,
            size,
            etag: None,
            last_modified: None,
        }
    }
}
