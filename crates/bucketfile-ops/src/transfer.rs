//! Transfer orchestration.
//!
//! [`TransferOrchestrator`] is the composition root: it sequences
//! validation, key construction, the storage calls themselves and
//! retry/recovery, producing one outcome per requested file or item.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use futures::future::join_all;
use futures::stream::FuturesUnordered;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use bucketfile_core::path::{ensure_folder_path, join_path, normalize_folder, strip_trailing_slash};
use bucketfile_core::{
    ClientConfig, ErrorKind, FileDescriptor, FileHandle, ItemRef, RetryConfig, StorageKey,
    TransferError, UploadLimits,
};

use crate::conflict::{ConflictResolution, generate_unique_file_name};
use crate::dragdrop::{DropCommand, can_drop_here};
use crate::endpoint::{FolderTreeResponse, UploadRequest, UploadResponse};
use crate::notify::Notifier;
use crate::operation::{FileOperation, OperationError};
use crate::progress::{OperationComplete, OperationProgress, OperationType};
use crate::recovery::{ConnectivityMonitor, ErrorRecovery};
use crate::retry::{RetryOptions, with_storage_retry, with_timeout};
use crate::storage::{StorageClient, StorageResult};
use crate::validate::{sanitize_filename, validate_file, validate_files, validate_folder_name};
use crate::OPERATION_CHANNEL_SIZE;

/// Content type used when a file declares none.
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Content type of folder marker objects.
const FOLDER_CONTENT_TYPE: &str = "application/x-directory";

/// Result of one successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    /// Key the object was stored under.
    pub key: StorageKey,
    /// Bytes sent.
    pub size: u64,
    /// Content type sent with the object.
    pub content_type: String,
    /// Entity tag assigned by the store.
    pub etag: String,
    /// Sanitized (and possibly renamed) file name.
    pub filename: String,
    /// Name as provided by the user.
    pub original_filename: String,
}

/// Result of a successful move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOutcome {
    /// Key of the item before the move.
    pub from: String,
    /// Key of the item after the move.
    pub to: String,
    /// Number of objects copied and deleted.
    pub objects: usize,
}

/// Event sent through the channel returned by
/// [`TransferOrchestrator::start_upload`].
#[derive(Debug)]
pub enum TransferEvent {
    /// A file finished, successfully or not.
    Progress(OperationProgress),
    /// A file failed.
    FileFailed(OperationError),
    /// Every file has finished.
    Complete(OperationComplete),
}

/// Sequences validation, key construction, storage calls and recovery.
pub struct TransferOrchestrator<S> {
    client: Arc<S>,
    recovery: Arc<ErrorRecovery>,
    notifier: Arc<dyn Notifier>,
    limits: UploadLimits,
    retry: RetryConfig,
    conflict: ConflictResolution,
    attempt_timeout: Option<Duration>,
}

impl<S> Clone for TransferOrchestrator<S> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            recovery: Arc::clone(&self.recovery),
            notifier: Arc::clone(&self.notifier),
            limits: self.limits,
            retry: self.retry,
            conflict: self.conflict,
            attempt_timeout: self.attempt_timeout,
        }
    }
}

impl<S> std::fmt::Debug for TransferOrchestrator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferOrchestrator")
            .field("limits", &self.limits)
            .field("retry", &self.retry)
            .field("conflict", &self.conflict)
            .field("attempt_timeout", &self.attempt_timeout)
            .field("recovery", &self.recovery)
            .finish()
    }
}

impl<S: StorageClient> TransferOrchestrator<S> {
    /// Create an orchestrator with its own recovery registry.
    pub fn new(client: Arc<S>, config: &ClientConfig, notifier: Arc<dyn Notifier>) -> Self {
        let recovery = ErrorRecovery::new(
            config.recovery,
            ConnectivityMonitor::default(),
            Arc::clone(&notifier),
        );
        Self {
            client,
            recovery: Arc::new(recovery),
            notifier,
            limits: config.limits,
            retry: config.retry,
            conflict: ConflictResolution::default(),
            attempt_timeout: None,
        }
    }

    /// Share an existing recovery registry.
    pub fn with_recovery(mut self, recovery: Arc<ErrorRecovery>) -> Self {
        self.recovery = recovery;
        self
    }

    /// Choose what happens when an uploaded name already exists.
    pub fn with_conflict_resolution(mut self, conflict: ConflictResolution) -> Self {
        self.conflict = conflict;
        self
    }

    /// Bound every storage attempt by `timeout`. A fired timeout is retried.
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    /// The storage backend.
    pub fn client(&self) -> &Arc<S> {
        &self.client
    }

    /// The recovery registry used after retries are exhausted.
    pub fn recovery(&self) -> &Arc<ErrorRecovery> {
        &self.recovery
    }

    fn retry_options(&self, cancel: &CancellationToken) -> RetryOptions {
        RetryOptions::new(self.retry).with_cancel(cancel.clone())
    }

    async fn attempt<T, F>(&self, call: F, cancel: &CancellationToken) -> StorageResult<T>
    where
        F: Future<Output = StorageResult<T>>,
    {
        match self.attempt_timeout {
            Some(timeout) => with_timeout(call, timeout, cancel).await,
            None => call.await,
        }
    }

    /// Upload one file into `destination`.
    pub async fn upload_file(
        &self,
        file: &FileDescriptor,
        destination: &str,
        cancel: &CancellationToken,
    ) -> Result<UploadOutcome, TransferError> {
        validate_file(Some(file), &self.limits).into_result()?;

        let folder = strip_trailing_slash(destination);
        let mut name = sanitize_filename(&file.name)?;
        if self.conflict != ConflictResolution::Overwrite {
            let existing = self.existing_names(folder, cancel).await?;
            name = self.resolve_conflict(name, &existing)?;
        }

        self.store_file(file, folder, name, cancel).await
    }

    /// Apply the conflict policy to `name` given the names already stored.
    fn resolve_conflict(&self, name: String, existing: &[String]) -> Result<String, TransferError> {
        if !existing.contains(&name) {
            return Ok(name);
        }
        match self.conflict {
            ConflictResolution::Overwrite => Ok(name),
            ConflictResolution::AutoRename => {
                let renamed = generate_unique_file_name(&name, existing);
                tracing::debug!(from = %name, to = %renamed, "Renamed to avoid conflict");
                Ok(renamed)
            }
            ConflictResolution::Skip => Err(TransferError::validation([format!(
                "'{name}' already exists in this folder"
            )])),
        }
    }

    /// Pick the stored name of every file in a batch up front.
    ///
    /// Names are resolved in submission order against a single listing, and
    /// each pick is reserved before the next, so concurrent uploads never
    /// land on the same key.
    async fn plan_names(
        &self,
        files: &[FileDescriptor],
        folder: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Result<String, TransferError>>, TransferError> {
        let mut taken = match self.conflict {
            ConflictResolution::Overwrite => Vec::new(),
            _ => self.existing_names(folder, cancel).await?,
        };

        Ok(files
            .iter()
            .map(|file| -> Result<String, TransferError> {
                let name = sanitize_filename(&file.name)?;
                let name = self.resolve_conflict(name, &taken)?;
                taken.push(name.clone());
                Ok(name)
            })
            .collect())
    }

    /// Write `file` under `folder/name`, retrying transient failures.
    async fn store_file(
        &self,
        file: &FileDescriptor,
        folder: &str,
        name: String,
        cancel: &CancellationToken,
    ) -> Result<UploadOutcome, TransferError> {
        let key = StorageKey::join(folder, &name)?;
        let body = read_body(file).await?;
        let content_type = if file.mime_type.is_empty() {
            DEFAULT_CONTENT_TYPE
        } else {
            file.mime_type.as_str()
        };

        let label = format!("Upload of {name}");
        let output = with_storage_retry(
            || {
                self.attempt(
                    self.client.put_object(&key, Arc::clone(&body), content_type),
                    cancel,
                )
            },
            &label,
            &self.retry_options(cancel),
            &self.recovery,
            &self.notifier,
        )
        .await?;

        tracing::info!(key = %key, size = body.len(), "Uploaded file");
        Ok(UploadOutcome {
            key,
            size: body.len() as u64,
            content_type: content_type.to_string(),
            etag: output.etag,
            filename: name,
            original_filename: file.name.clone(),
        })
    }

    /// Validate a batch as a whole, then upload every file concurrently.
    ///
    /// The returned vector is in submission order; the uploads themselves
    /// finish in any order.
    pub async fn upload_batch(
        &self,
        files: &[FileDescriptor],
        destination: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Result<UploadOutcome, TransferError>>, TransferError> {
        validate_files(files, &self.limits).into_result()?;

        let folder = strip_trailing_slash(destination);
        let names = self.plan_names(files, folder, cancel).await?;
        Ok(join_all(files.iter().zip(names).map(|(file, name)| async move {
            match name {
                Ok(name) => self.store_file(file, folder, name, cancel).await,
                Err(e) => Err(e),
            }
        }))
        .await)
    }

    /// Move a file or folder into `destination`.
    ///
    /// Every object under the item is copied first; sources are deleted only
    /// once all copies succeeded.
    pub async fn move_item(
        &self,
        item: &ItemRef,
        destination: &str,
        cancel: &CancellationToken,
    ) -> Result<MoveOutcome, TransferError> {
        if !can_drop_here(Some(item), destination) {
            return Err(TransferError::validation([format!(
                "Cannot move '{}' into '{}'",
                item.name,
                ensure_folder_path(normalize_folder(destination))
            )]));
        }

        let source = StorageKey::parse(&item.key)?;
        let destination = normalize_folder(destination);
        let label = format!("Move of {}", item.name);
        let options = self.retry_options(cancel);

        let pairs = if source.is_folder() {
            let objects = with_storage_retry(
                || self.attempt(self.client.list_objects(source.as_str()), cancel),
                &label,
                &options,
                &self.recovery,
                &self.notifier,
            )
            .await?;
            if objects.is_empty() {
                return Err(TransferError::backend(
                    "NoSuchKey",
                    format!("{source} does not exist"),
                ));
            }

            let target_prefix = ensure_folder_path(&join_path(&[destination, source.name()]));
            let mut pairs = Vec::with_capacity(objects.len() + 1);
            if !objects.iter().any(|o| o.key == source) {
                pairs.push((source.clone(), StorageKey::parse(&target_prefix)?));
            }
            for object in objects {
                let rest = object
                    .key
                    .as_str()
                    .strip_prefix(source.as_str())
                    .unwrap_or_default();
                let target = StorageKey::parse(format!("{target_prefix}{rest}"))?;
                pairs.push((object.key, target));
            }
            pairs
        } else {
            vec![(source.clone(), StorageKey::join(destination, source.name())?)]
        };

        for (from, to) in &pairs {
            if from.is_folder() {
                with_storage_retry(
                    || {
                        self.attempt(
                            self.client.put_object(to, Arc::from(&[][..]), FOLDER_CONTENT_TYPE),
                            cancel,
                        )
                    },
                    &label,
                    &options,
                    &self.recovery,
                    &self.notifier,
                )
                .await?;
            } else {
                with_storage_retry(
                    || self.attempt(self.client.copy_object(from, to), cancel),
                    &label,
                    &options,
                    &self.recovery,
                    &self.notifier,
                )
                .await?;
            }
        }

        // Deepest keys first so folder markers go after their contents.
        let mut sources: Vec<&StorageKey> = pairs.iter().map(|(from, _)| from).collect();
        sources.sort_unstable_by(|a, b| b.cmp(a));
        for key in sources {
            with_storage_retry(
                || self.attempt(self.client.delete_object(key), cancel),
                &label,
                &options,
                &self.recovery,
                &self.notifier,
            )
            .await?;
        }

        let to = match pairs.iter().find(|(from, _)| *from == source) {
            Some((_, to)) => to.to_string(),
            None => ensure_folder_path(&join_path(&[destination, source.name()])),
        };
        tracing::info!(from = %source, to = %to, objects = pairs.len(), "Moved item");
        Ok(MoveOutcome {
            from: source.to_string(),
            to,
            objects: pairs.len(),
        })
    }

    /// Create an empty folder named `name` inside `parent`.
    pub async fn create_folder(
        &self,
        parent: &str,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<StorageKey, TransferError> {
        validate_folder_name(name).into_result()?;

        let key = StorageKey::folder(&join_path(&[parent, name.trim()]))?;
        with_storage_retry(
            || {
                self.attempt(
                    self.client.put_object(&key, Arc::from(&[][..]), FOLDER_CONTENT_TYPE),
                    cancel,
                )
            },
            &format!("Creating folder {}", name.trim()),
            &self.retry_options(cancel),
            &self.recovery,
            &self.notifier,
        )
        .await?;

        tracing::info!(key = %key, "Created folder");
        Ok(key)
    }

    /// Run any file operation to completion.
    pub async fn execute(&self, operation: FileOperation, cancel: &CancellationToken) -> OperationComplete {
        let operation_type = operation.operation_type();
        match operation {
            FileOperation::Upload { files, destination } => {
                let total_bytes = files.iter().map(|f| f.size).sum();
                let mut progress = OperationProgress::new(operation_type, files.len(), total_bytes);
                match self.upload_batch(&files, &destination, cancel).await {
                    Ok(results) => {
                        for (file, result) in files.iter().zip(results) {
                            match result {
                                Ok(outcome) => progress.complete_file(outcome.filename, outcome.size),
                                Err(e) => progress.fail_file(OperationError::from_transfer(&file.name, &e)),
                            }
                        }
                    }
                    Err(e) => progress.fail_file(OperationError::from_transfer(&destination, &e)),
                }
                progress.finish()
            }
            FileOperation::Move { item, destination } => {
                let mut progress = OperationProgress::new(operation_type, 1, 0);
                match self.move_item(&item, &destination, cancel).await {
                    Ok(outcome) => progress.complete_file(outcome.to, 0),
                    Err(e) => progress.fail_file(OperationError::from_transfer(&item.key, &e)),
                }
                progress.finish()
            }
            FileOperation::CreateFolder { parent, name } => {
                let mut progress = OperationProgress::new(operation_type, 1, 0);
                match self.create_folder(&parent, &name, cancel).await {
                    Ok(key) => progress.complete_file(key.to_string(), 0),
                    Err(e) => progress.fail_file(OperationError::from_transfer(&name, &e)),
                }
                progress.finish()
            }
        }
    }

    /// Execute what a drop resolved to and report the outcome to the user.
    ///
    /// Storage failures were already reported by the retry layer, so only
    /// pre-flight rejections produce an error notice here.
    pub async fn execute_drop(&self, command: DropCommand, cancel: &CancellationToken) -> OperationComplete {
        let complete = self.execute(command.into(), cancel).await;

        if complete.is_success() {
            self.notifier.success(&complete.summary());
        } else {
            for error in complete.errors.iter().filter(|e| e.kind == ErrorKind::Validation) {
                self.notifier.error(&error.message);
            }
        }
        tracing::info!(summary = %complete.summary(), "Drop handled");
        complete
    }

    /// Execute drop commands until the channel closes or `cancel` fires.
    pub async fn run_drop_commands(
        &self,
        mut commands: mpsc::Receiver<DropCommand>,
        cancel: &CancellationToken,
    ) {
        loop {
            let command = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                command = commands.recv() => match command {
                    Some(command) => command,
                    None => break,
                },
            };
            self.execute_drop(command, cancel).await;
        }
    }

    /// Upload endpoint: one file into `request.path`.
    pub async fn handle_upload(
        &self,
        request: UploadRequest,
        cancel: &CancellationToken,
    ) -> (u16, UploadResponse) {
        let result = match &request.file {
            Some(file) => self.upload_file(file, &request.path, cancel).await,
            None => Err(TransferError::validation(
                validate_file(None, &self.limits).errors,
            )),
        };

        match result {
            Ok(outcome) => (
                200,
                UploadResponse {
                    success: true,
                    key: Some(outcome.key.to_string()),
                    size: Some(outcome.size),
                    content_type: Some(outcome.content_type),
                    filename: Some(outcome.filename),
                    original_filename: Some(outcome.original_filename),
                    etag: Some(outcome.etag),
                    error: None,
                },
            ),
            Err(e) => {
                tracing::warn!(error = %e, "Upload request failed");
                UploadResponse::from_error(&e)
            }
        }
    }

    /// Folder-tree endpoint. Any failure is reported as status 500.
    pub async fn folder_tree(&self, prefix: &str, cancel: &CancellationToken) -> (u16, FolderTreeResponse) {
        let result = with_storage_retry(
            || self.attempt(self.client.list_folder_tree(prefix), cancel),
            "Loading folders",
            &self.retry_options(cancel),
            &self.recovery,
            &self.notifier,
        )
        .await;

        match result {
            Ok(tree) => (200, FolderTreeResponse::ok(tree)),
            Err(e) => {
                tracing::warn!(error = %e, prefix, "Folder tree request failed");
                (500, FolderTreeResponse::failure(e.user_message()))
            }
        }
    }

    async fn existing_names(&self, folder: &str, cancel: &CancellationToken) -> Result<Vec<String>, TransferError> {
        let folder = normalize_folder(folder);
        let prefix = ensure_folder_path(folder);
        let objects = with_storage_retry(
            || self.attempt(self.client.list_objects(&prefix), cancel),
            "Checking existing files",
            &self.retry_options(cancel),
            &self.recovery,
            &self.notifier,
        )
        .await?;

        Ok(objects
            .iter()
            .filter(|o| !o.key.is_folder() && normalize_folder(o.key.parent()) == folder)
            .map(|o| o.key.name().to_string())
            .collect())
    }
}

impl<S: StorageClient + 'static> TransferOrchestrator<S> {
    /// Start uploading `files` in the background.
    ///
    /// Returns a receiver for progress updates. Events arrive in completion
    /// order, followed by exactly one [`TransferEvent::Complete`].
    pub fn start_upload(
        &self,
        files: Vec<FileDescriptor>,
        destination: String,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<TransferEvent> {
        let (tx, rx) = mpsc::channel(OPERATION_CHANNEL_SIZE);
        let this = self.clone();

        tokio::spawn(async move {
            this.upload_impl(files, destination, cancel, tx).await;
        });

        rx
    }

    async fn upload_impl(
        &self,
        files: Vec<FileDescriptor>,
        destination: String,
        cancel: CancellationToken,
        tx: mpsc::Sender<TransferEvent>,
    ) {
        let total_bytes = files.iter().map(|f| f.size).sum();
        let mut progress = OperationProgress::new(OperationType::Upload, files.len(), total_bytes);

        if let Err(e) = validate_files(&files, &self.limits).into_result() {
            let error = OperationError::from_transfer(&destination, &e);
            progress.fail_file(error.clone());
            let _ = tx.send(TransferEvent::FileFailed(error)).await;
            let _ = tx.send(TransferEvent::Complete(progress.finish())).await;
            return;
        }

        let folder = strip_trailing_slash(&destination);
        let names = match self.plan_names(&files, folder, &cancel).await {
            Ok(names) => names,
            Err(e) => {
                let error = OperationError::from_transfer(&destination, &e);
                progress.fail_file(error.clone());
                let _ = tx.send(TransferEvent::FileFailed(error)).await;
                let _ = tx.send(TransferEvent::Complete(progress.finish())).await;
                return;
            }
        };

        let cancel = &cancel;
        let mut pending: FuturesUnordered<_> = files
            .iter()
            .zip(names)
            .map(|(file, name)| async move {
                let result = match name {
                    Ok(name) => self.store_file(file, folder, name, cancel).await,
                    Err(e) => Err(e),
                };
                (file, result)
            })
            .collect();

        while let Some((file, result)) = pending.next().await {
            match result {
                Ok(outcome) => progress.complete_file(outcome.filename, outcome.size),
                Err(e) => {
                    let error = OperationError::from_transfer(&file.name, &e);
                    progress.fail_file(error.clone());
                    let _ = tx.send(TransferEvent::FileFailed(error)).await;
                }
            }
            let _ = tx.send(TransferEvent::Progress(progress.clone())).await;
        }

        let complete = progress.finish();
        tracing::info!(summary = %complete.summary(), "Upload batch finished");
        let _ = tx.send(TransferEvent::Complete(complete)).await;
    }
}

async fn read_body(file: &FileDescriptor) -> Result<Arc<[u8]>, TransferError> {
    match &file.handle {
        FileHandle::Bytes(bytes) => Ok(Arc::clone(bytes)),
        FileHandle::Path(path) => {
            let path = path.clone();
            let bytes = tokio::task::spawn_blocking(move || std::fs::read(path))
                .await
                .map_err(|e| TransferError::Other {
                    message: format!("read task failed: {e}"),
                })?
                .map_err(|e| TransferError::io(&e))?;
            Ok(Arc::from(bytes))
        }
    }
}
