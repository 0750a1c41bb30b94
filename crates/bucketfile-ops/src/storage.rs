//! Storage backend trait.
//!
//! The orchestration engine never talks to a concrete object store. Anything
//! that can put, list, copy and delete objects by key can be plugged in by
//! implementing [`StorageClient`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bucketfile_core::{FolderTree, ObjectInfo, StorageKey, TransferError};

/// Type alias for boxed futures returned by storage methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Result type for storage calls.
pub type StorageResult<T> = Result<T, TransferError>;

/// Response of a successful `put_object`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutObjectOutput {
    /// Entity tag assigned by the store.
    pub etag: String,
}

/// Trait that every object store backend must satisfy.
///
/// Errors must be classified where they originate: a missing bucket is
/// [`TransferError::Backend`] with the matching kind, a dropped connection is
/// [`TransferError::Network`], and so on.
pub trait StorageClient: Send + Sync {
    /// Store `body` under `key`. Re-uploading the same key overwrites it.
    fn put_object<'a>(
        &'a self,
        key: &'a StorageKey,
        body: Arc<[u8]>,
        content_type: &'a str,
    ) -> BoxFuture<'a, StorageResult<PutObjectOutput>>;

    /// List every object whose key starts with `prefix`.
    fn list_objects<'a>(&'a self, prefix: &'a str) -> BoxFuture<'a, StorageResult<Vec<ObjectInfo>>>;

    /// Copy an object to a new key.
    fn copy_object<'a>(
        &'a self,
        from: &'a StorageKey,
        to: &'a StorageKey,
    ) -> BoxFuture<'a, StorageResult<()>>;

    /// Delete one object. Deleting a missing key succeeds.
    fn delete_object<'a>(&'a self, key: &'a StorageKey) -> BoxFuture<'a, StorageResult<()>>;

    /// Build the folder hierarchy under `prefix`.
    fn list_folder_tree<'a>(&'a self, prefix: &'a str) -> BoxFuture<'a, StorageResult<FolderTree>> {
        Box::pin(async move {
            let objects = self.list_objects(prefix).await?;
            Ok(FolderTree::from_objects(prefix, &objects))
        })
    }
}

impl<T: StorageClient + ?Sized> StorageClient for Arc<T> {
    fn put_object<'a>(
        &'a self,
        key: &'a StorageKey,
        body: Arc<[u8]>,
        content_type: &'a str,
    ) -> BoxFuture<'a, StorageResult<PutObjectOutput>> {
        (**self).put_object(key, body, content_type)
    }

    fn list_objects<'a>(&'a self, prefix: &'a str) -> BoxFuture<'a, StorageResult<Vec<ObjectInfo>>> {
        (**self).list_objects(prefix)
    }

    fn copy_object<'a>(
        &'a self,
        from: &'a StorageKey,
        to: &'a StorageKey,
    ) -> BoxFuture<'a, StorageResult<()>> {
        (**self).copy_object(from, to)
    }

    fn delete_object<'a>(&'a self, key: &'a StorageKey) -> BoxFuture<'a, StorageResult<()>> {
        (**self).delete_object(key)
    }

    fn list_folder_tree<'a>(&'a self, prefix: &'a str) -> BoxFuture<'a, StorageResult<FolderTree>> {
        (**self).list_folder_tree(prefix)
    }
}
