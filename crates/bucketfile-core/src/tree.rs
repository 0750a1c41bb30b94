//! Folder tree reconstructed from a flat key listing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::file::ObjectInfo;
use crate::path::{ensure_folder_path, join_path, normalize_folder};

/// Summary statistics for a listed prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeStats {
    /// Number of file objects under the prefix.
    pub total_files: u64,
    /// Number of distinct folders under the prefix.
    pub total_folders: u64,
    /// Sum of all file sizes in bytes.
    pub total_size: u64,
}

/// One folder in the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderNode {
    /// Folder name (last segment).
    pub name: String,
    /// Full folder path, ending in `/`.
    pub path: String,
    /// Files directly inside this folder.
    pub file_count: u64,
    /// Bytes stored in this folder and every subfolder.
    pub total_size: u64,
    /// Subfolders, sorted by name.
    pub children: Vec<FolderNode>,
}

impl FolderNode {
    /// Find a descendant (or self) by folder path.
    pub fn find(&self, path: &str) -> Option<&FolderNode> {
        let wanted = normalize_folder(path);
        if normalize_folder(&self.path) == wanted {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(path))
    }
}

/// Hierarchical view of every folder under a prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderTree {
    /// Prefix the tree was listed from (`""` for the bucket root).
    pub prefix: String,
    /// Top-level folders below the prefix.
    pub folders: Vec<FolderNode>,
    /// Aggregate statistics.
    pub stats: TreeStats,
}

#[derive(Default)]
struct NodeBuilder {
    children: BTreeMap<String, NodeBuilder>,
    file_count: u64,
    own_size: u64,
}

impl NodeBuilder {
    fn child(&mut self, segments: &[&str]) -> &mut NodeBuilder {
        let mut node = self;
        for segment in segments {
            node = node.children.entry((*segment).to_string()).or_default();
        }
        node
    }

    fn build(self, parent: &str, stats: &mut TreeStats) -> Vec<FolderNode> {
        self.children
            .into_iter()
            .map(|(name, builder)| {
                stats.total_folders += 1;
                let path = ensure_folder_path(&join_path(&[parent, name.as_str()]));
                let own_size = builder.own_size;
                let file_count = builder.file_count;
                let children = builder.build(&path, stats);
                let total_size = own_size + children.iter().map(|c| c.total_size).sum::<u64>();
                FolderNode {
                    name,
                    path,
                    file_count,
                    total_size,
                    children,
                }
            })
            .collect()
    }
}

impl FolderTree {
    /// Build the tree for `prefix` from a flat object listing.
    ///
    /// Objects outside the prefix are ignored. Folder markers create folders
    /// even when nothing is stored inside them.
    pub fn from_objects<'a>(prefix: &str, objects: impl IntoIterator<Item = &'a ObjectInfo>) -> Self {
        let base = ensure_folder_path(normalize_folder(prefix));
        let mut root = NodeBuilder::default();
        let mut stats = TreeStats::default();

        for object in objects {
            let Some(relative) = object.key.as_str().strip_prefix(base.as_str()) else {
                continue;
            };
            let segments: Vec<&str> = relative.split('/').filter(|s| !s.is_empty()).collect();
            if segments.is_empty() {
                continue;
            }

            if object.key.is_folder() {
                root.child(&segments);
            } else {
                let folder = root.child(&segments[..segments.len() - 1]);
                folder.file_count += 1;
                folder.own_size += object.size;
                stats.total_files += 1;
                stats.total_size += object.size;
            }
        }

        let folders = root.build(&base, &mut stats);
        Self {
            prefix: base,
            folders,
            stats,
        }
    }

    /// Find a folder anywhere in the tree.
    pub fn find(&self, path: &str) -> Option<&FolderNode> {
        self.folders.iter().find_map(|f| f.find(path))
    }
}
