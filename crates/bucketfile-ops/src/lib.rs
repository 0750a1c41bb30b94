//! Upload, move and drop orchestration for bucketfile.
//!
//! This crate turns user intents into sequences of storage calls against an
//! object store reached through [`StorageClient`]. Long-running work reports
//! progress over tokio channels, storage calls are retried with exponential
//! backoff, and exhausted retries get one chance at recovery through the
//! shared [`ErrorRecovery`] registry.

mod conflict;
mod dragdrop;
mod endpoint;
mod local;
mod notify;
mod operation;
mod progress;
mod recovery;
mod retry;
mod storage;
mod transfer;
mod validate;

pub use conflict::{ConflictResolution, generate_unique_file_name};
pub use dragdrop::{
    DragEvent, DragPayload, DragState, DropCommand, DropZone, ItemDropHandler, PayloadKind, Point,
    Rect, SharedDragState, can_drop_here, spawn_drop_zone,
};
pub use endpoint::{FolderTreeResponse, UploadRequest, UploadResponse};
pub use local::LocalStore;
pub use notify::{NoticeLevel, Notifier, RecordingNotifier, TracingNotifier};
pub use operation::{FileOperation, OperationError};
pub use progress::{OperationComplete, OperationProgress, OperationType};
pub use recovery::{ConnectivityMonitor, ErrorRecovery, RecoveryAction, RecoveryKey};
pub use retry::{
    RetryClassifier, RetryContext, RetryObserver, RetryOptions, is_retryable, timeout_token,
    with_retry, with_storage_retry, with_timeout,
};
pub use storage::{BoxFuture, PutObjectOutput, StorageClient, StorageResult};
pub use transfer::{MoveOutcome, TransferEvent, TransferOrchestrator, UploadOutcome};
pub use validate::{sanitize_filename, validate_file, validate_files, validate_folder_name};

/// Default channel buffer size for transfer progress updates.
pub const OPERATION_CHANNEL_SIZE: usize = 100;
