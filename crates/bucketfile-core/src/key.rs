//! Storage keys.

use std::fmt;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::error::KeyError;
use crate::path::{ensure_folder_path, get_parent_path, get_path_name, join_path};

/// Identifier of one object in the store.
///
/// A trailing `/` marks a folder marker. A key is never empty, never starts
/// with `/` and never contains `..` or control characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StorageKey(CompactString);

impl StorageKey {
    /// Parse and check a raw key.
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, KeyError> {
        let raw = raw.as_ref();
        if raw.is_empty() {
            return Err(KeyError::Empty);
        }
        if raw.starts_with('/') {
            return Err(KeyError::LeadingSlash { key: raw.to_string() });
        }
        if raw.contains("..") {
            return Err(KeyError::ParentTraversal { key: raw.to_string() });
        }
        if raw.chars().any(char::is_control) {
            return Err(KeyError::ControlCharacter { key: raw.to_string() });
        }
        Ok(Self(CompactString::from(raw)))
    }

    /// Build the key for `name` placed inside `folder`.
    pub fn join(folder: &str, name: &str) -> Result<Self, KeyError> {
        Self::parse(join_path(&[folder, name]))
    }

    /// Build a folder marker key for `path`.
    pub fn folder(path: &str) -> Result<Self, KeyError> {
        Self::parse(ensure_folder_path(&join_path(&[path])))
    }

    /// The raw key.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this key is a folder marker.
    pub fn is_folder(&self) -> bool {
        self.0.ends_with('/')
    }

    /// Last segment of the key, without a trailing `/`.
    pub fn name(&self) -> &str {
        get_path_name(&self.0)
    }

    /// Containing folder, `""` for keys at the root.
    pub fn parent(&self) -> &str {
        get_parent_path(&self.0)
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StorageKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for StorageKey {
    type Error = KeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<StorageKey> for String {
    fn from(key: StorageKey) -> Self {
        key.0.into()
    }
}
