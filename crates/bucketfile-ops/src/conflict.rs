//! Name conflict resolution for uploads and moves.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// How to handle a destination key that already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ConflictResolution {
    /// Write over the existing object. Uploads are idempotent per key.
    #[default]
    Overwrite,
    /// Pick a free name such as "file (1).txt".
    AutoRename,
    /// Leave the existing object alone and report a failure.
    Skip,
}

/// Split a file name into stem and extension (with the dot).
///
/// Leading-dot names like ".env" have no extension.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    }
}

/// Generate a name that does not collide with `existing`.
///
/// For "doc.txt", tries "doc (1).txt", "doc (2).txt", etc. Returns `name`
/// unchanged when it is free.
pub fn generate_unique_file_name<S: AsRef<str>>(name: &str, existing: &[S]) -> String {
    let taken: HashSet<&str> = existing.iter().map(AsRef::as_ref).collect();
    if !taken.contains(name) {
        return name.to_string();
    }

    let (stem, extension) = split_extension(name);
    (1u64..)
        .map(|i| format!("{stem} ({i}){extension}"))
        .find(|candidate| !taken.contains(candidate.as_str()))
        .unwrap_or_else(|| name.to_string())
}
