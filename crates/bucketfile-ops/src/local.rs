//! Filesystem-backed object store.
//!
//! Each key maps to a path under a root directory. Folder markers are
//! directories, so every directory under the root lists as a marker.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use jwalk::{Parallelism, WalkDir};

use bucketfile_core::{ObjectInfo, StorageKey, TransferError};

use crate::storage::{BoxFuture, PutObjectOutput, StorageClient, StorageResult};

/// Object store rooted at a local directory.
///
/// The root plays the role of the bucket: if it does not exist every call
/// fails with a `NoSuchBucket` backend error.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Create a store over an existing directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The directory backing the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        key.split('/')
            .filter(|segment| !segment.is_empty())
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }

    fn check_root(&self) -> StorageResult<()> {
        if self.root.is_dir() {
            Ok(())
        } else {
            Err(TransferError::backend(
                "NoSuchBucket",
                format!("{} does not exist", self.root.display()),
            ))
        }
    }

    async fn blocking<T, F>(&self, f: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(LocalStore) -> StorageResult<T> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || {
            store.check_root()?;
            f(store)
        })
        .await
        .map_err(|e| TransferError::Other {
            message: format!("storage task failed: {e}"),
        })?
    }

    fn put_blocking(&self, key: &StorageKey, body: &[u8]) -> StorageResult<PutObjectOutput> {
        let path = self.path_for(key.as_str());
        if key.is_folder() {
            fs::create_dir_all(&path).map_err(map_io)?;
        } else {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(map_io)?;
            }
            fs::write(&path, body).map_err(map_io)?;
        }
        tracing::trace!(key = %key, bytes = body.len(), "Stored object");
        Ok(PutObjectOutput { etag: etag(body) })
    }

    fn list_blocking(&self, prefix: &str) -> StorageResult<Vec<ObjectInfo>> {
        // Only the deepest folder the prefix names in full needs walking.
        let base = prefix.rfind('/').map_or("", |idx| &prefix[..=idx]);
        let start = self.path_for(base);
        if !start.is_dir() {
            return Ok(Vec::new());
        }

        let walker = WalkDir::new(&start)
            .parallelism(Parallelism::Serial)
            .skip_hidden(false)
            .sort(true)
            .min_depth(if base.is_empty() { 1 } else { 0 });

        let mut objects = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable entry");
                    continue;
                }
            };

            let path = entry.path();
            let is_dir = entry.file_type().is_dir();
            let Some(raw) = key_for(&self.root, &path, is_dir) else {
                tracing::warn!(path = %path.display(), "Skipping entry without a valid key");
                continue;
            };
            if !raw.starts_with(prefix) {
                continue;
            }
            let key = match StorageKey::parse(&raw) {
                Ok(key) => key,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping entry without a valid key");
                    continue;
                }
            };

            let metadata = entry.metadata().map_err(|e| TransferError::Io {
                message: e.to_string(),
            })?;
            let last_modified = metadata.modified().ok().map(DateTime::<Utc>::from);

            let (size, tag) = if is_dir {
                (0, etag(&[]))
            } else {
                let contents = fs::read(&path).map_err(map_io)?;
                (contents.len() as u64, etag(&contents))
            };

            objects.push(ObjectInfo {
                key,
                size,
                etag: Some(tag),
                last_modified,
            });
        }
        Ok(objects)
    }

    fn copy_blocking(&self, from: &StorageKey, to: &StorageKey) -> StorageResult<()> {
        let source = self.path_for(from.as_str());
        let target = self.path_for(to.as_str());

        if from.is_folder() {
            if !source.is_dir() {
                return Err(no_such_key(from));
            }
            return fs::create_dir_all(&target).map_err(map_io);
        }

        if !source.is_file() {
            return Err(no_such_key(from));
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(map_io)?;
        }
        fs::copy(&source, &target).map_err(map_io)?;
        Ok(())
    }

    fn delete_blocking(&self, key: &StorageKey) -> StorageResult<()> {
        let path = self.path_for(key.as_str());
        let result = if key.is_folder() {
            fs::remove_dir(&path)
        } else {
            fs::remove_file(&path)
        };

        match result {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            // A marker only disappears once its contents are gone.
            Err(e) if key.is_folder() && e.kind() == io::ErrorKind::DirectoryNotEmpty => {
                tracing::debug!(key = %key, "Folder still has contents, keeping directory");
                Ok(())
            }
            Err(e) => Err(map_io(e)),
        }
    }
}

impl StorageClient for LocalStore {
    fn put_object<'a>(
        &'a self,
        key: &'a StorageKey,
        body: Arc<[u8]>,
        _content_type: &'a str,
    ) -> BoxFuture<'a, StorageResult<PutObjectOutput>> {
        let key = key.clone();
        Box::pin(self.blocking(move |store| store.put_blocking(&key, &body)))
    }

    fn list_objects<'a>(&'a self, prefix: &'a str) -> BoxFuture<'a, StorageResult<Vec<ObjectInfo>>> {
        let prefix = prefix.to_string();
        Box::pin(self.blocking(move |store| store.list_blocking(&prefix)))
    }

    fn copy_object<'a>(
        &'a self,
        from: &'a StorageKey,
        to: &'a StorageKey,
    ) -> BoxFuture<'a, StorageResult<()>> {
        let (from, to) = (from.clone(), to.clone());
        Box::pin(self.blocking(move |store| store.copy_blocking(&from, &to)))
    }

    fn delete_object<'a>(&'a self, key: &'a StorageKey) -> BoxFuture<'a, StorageResult<()>> {
        let key = key.clone();
        Box::pin(self.blocking(move |store| store.delete_blocking(&key)))
    }
}

/// BLAKE3 digest of an object body, hex encoded.
fn etag(body: &[u8]) -> String {
    blake3::hash(body).to_hex().to_string()
}

/// Key for a path under `root`; directories get a trailing `/`.
fn key_for(root: &Path, path: &Path, is_dir: bool) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut segments = Vec::new();
    for component in relative.components() {
        segments.push(component.as_os_str().to_str()?);
    }
    let mut key = segments.join("/");
    if key.is_empty() {
        return None;
    }
    if is_dir {
        key.push('/');
    }
    Some(key)
}

fn no_such_key(key: &StorageKey) -> TransferError {
    TransferError::backend("NoSuchKey", format!("{key} does not exist"))
}

fn map_io(error: io::Error) -> TransferError {
    match error.kind() {
        io::ErrorKind::PermissionDenied => TransferError::backend("AccessDenied", error.to_string()),
        _ => TransferError::io(&error),
    }
}
