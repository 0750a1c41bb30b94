use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use bucketfile_core::{
    ClientConfig, ErrorKind, FileDescriptor, ItemRef, ObjectInfo, RecoveryConfig, RetryConfig,
    StorageKey, TransferError,
};
use bucketfile_ops::{
    BoxFuture, ConflictResolution, ConnectivityMonitor, DragEvent, DragPayload, DragState,
    DropCommand, DropZone, ErrorRecovery, LocalStore, NoticeLevel, Notifier, PayloadKind, Point,
    PutObjectOutput, RecordingNotifier, Rect, RetryOptions, StorageClient, StorageResult,
    TransferEvent, TransferOrchestrator, UploadRequest, spawn_drop_zone, with_retry,
    with_storage_retry,
};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn text(name: &str, body: &str) -> FileDescriptor {
    FileDescriptor::from_bytes(name, "text/plain", body.as_bytes().to_vec())
}

fn counter() -> Arc<AtomicU32> {
    Arc::new(AtomicU32::new(0))
}

/// Local store that fails the first few puts and always rejects `deny.txt`.
struct FlakyStore {
    inner: LocalStore,
    failures_left: AtomicU32,
    puts: AtomicU32,
}

impl FlakyStore {
    fn new(root: &std::path::Path, failures: u32) -> Self {
        Self {
            inner: LocalStore::new(root),
            failures_left: AtomicU32::new(failures),
            puts: AtomicU32::new(0),
        }
    }
}

impl StorageClient for FlakyStore {
    fn put_object<'a>(
        &'a self,
        key: &'a StorageKey,
        body: Arc<[u8]>,
        content_type: &'a str,
    ) -> BoxFuture<'a, StorageResult<PutObjectOutput>> {
        Box::pin(async move {
            self.puts.fetch_add(1, Ordering::SeqCst);
            if key.name() == "deny.txt" {
                return Err(TransferError::backend("AccessDenied", "denied"));
            }
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(TransferError::network("connection reset"));
            }
            self.inner.put_object(key, body, content_type).await
        })
    }

    fn list_objects<'a>(&'a self, prefix: &'a str) -> BoxFuture<'a, StorageResult<Vec<ObjectInfo>>> {
        self.inner.list_objects(prefix)
    }

    fn copy_object<'a>(
        &'a self,
        from: &'a StorageKey,
        to: &'a StorageKey,
    ) -> BoxFuture<'a, StorageResult<()>> {
        self.inner.copy_object(from, to)
    }

    fn delete_object<'a>(&'a self, key: &'a StorageKey) -> BoxFuture<'a, StorageResult<()>> {
        self.inner.delete_object(key)
    }
}

fn recording_orchestrator<S: StorageClient>(
    store: Arc<S>,
) -> (TransferOrchestrator<S>, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::new());
    let orch = TransferOrchestrator::new(store, &ClientConfig::default(), notifier.clone());
    (orch, notifier)
}

// ---------------------------------------------------------------------------
// with_retry
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_retry_fails_twice_then_succeeds() {
    let calls = counter();
    let retries = counter();
    let observed = Arc::clone(&retries);
    let options = RetryOptions::default().with_on_retry(move |_, _| {
        observed.fetch_add(1, Ordering::SeqCst);
    });

    let attempts = Arc::clone(&calls);
    let result = with_retry(
        || {
            let attempts = Arc::clone(&attempts);
            async move {
                if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(TransferError::network("fetch failed"))
                } else {
                    Ok("done")
                }
            }
        },
        &options,
    )
    .await;

    assert_eq!(result.unwrap(), "done");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(retries.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_retry_client_error_fails_immediately() {
    let calls = counter();
    let retries = counter();
    let observed = Arc::clone(&retries);
    let options = RetryOptions::default().with_on_retry(move |_, _| {
        observed.fetch_add(1, Ordering::SeqCst);
    });

    let attempts = Arc::clone(&calls);
    let result: Result<(), _> = with_retry(
        || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(TransferError::http(400, "bad request")) }
        },
        &options,
    )
    .await;

    assert!(matches!(result, Err(TransferError::Http { status: 400, .. })));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(retries.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_retry_already_cancelled_never_runs() {
    let calls = counter();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let options = RetryOptions::default().with_cancel(cancel);

    let attempts = Arc::clone(&calls);
    let result: Result<(), _> = with_retry(
        || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        },
        &options,
    )
    .await;

    assert!(matches!(result, Err(TransferError::Aborted)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_retry_cancel_interrupts_backoff() {
    let cancel = CancellationToken::new();
    let options = RetryOptions::new(RetryConfig {
        max_attempts: 5,
        initial_delay_ms: 60_000,
        max_delay_ms: 60_000,
        backoff_factor: 2.0,
    })
    .with_cancel(cancel.clone());

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });

    let start = tokio::time::Instant::now();
    let result: Result<(), _> = with_retry(|| async { Err(TransferError::network("down")) }, &options).await;

    assert!(matches!(result, Err(TransferError::Aborted)));
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_retry_budget_exhausted_returns_last_error() {
    let calls = counter();
    let retries = counter();
    let observed = Arc::clone(&retries);
    let options = RetryOptions::default().with_on_retry(move |attempt, _| {
        observed.store(attempt, Ordering::SeqCst);
    });

    let attempts = Arc::clone(&calls);
    let result: Result<(), _> = with_retry(
        || {
            let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Err(TransferError::network(format!("failure {n}"))) }
        },
        &options,
    )
    .await;

    let err = result.unwrap_err();
    assert_eq!(err.to_string(), "Network error: failure 3");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    // Observer saw attempts 1 and 2, never the final one.
    assert_eq!(retries.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_custom_classifier_controls_retry() {
    let calls = counter();
    let options = RetryOptions::default().with_classifier(|e| e.kind() == ErrorKind::Auth);

    let attempts = Arc::clone(&calls);
    let result: Result<(), _> = with_retry(
        || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(TransferError::network("down")) }
        },
        &options,
    )
    .await;

    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// ---------------------------------------------------------------------------
// with_storage_retry
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_storage_retry_recovers_then_runs_once_more() {
    let notifier = Arc::new(RecordingNotifier::new());
    let dyn_notifier: Arc<dyn Notifier> = notifier.clone();
    let recovery = ErrorRecovery::new(
        RecoveryConfig::default(),
        ConnectivityMonitor::new(false),
        dyn_notifier.clone(),
    );
    let monitor = recovery.connectivity().clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(10)).await;
        monitor.set_online(true);
    });

    let calls = counter();
    let attempts = Arc::clone(&calls);
    let result = with_storage_retry(
        || {
            let attempts = Arc::clone(&attempts);
            async move {
                if attempts.fetch_add(1, Ordering::SeqCst) < 3 {
                    Err(TransferError::network("reset"))
                } else {
                    Ok(42)
                }
            }
        },
        "Upload",
        &RetryOptions::default(),
        &recovery,
        &dyn_notifier,
    )
    .await;

    assert_eq!(result.unwrap(), 42);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    // One for the slow retry, one for the offline wait.
    assert_eq!(notifier.count(NoticeLevel::Warning), 2);
    assert_eq!(notifier.count(NoticeLevel::Success), 1);
    assert_eq!(notifier.count(NoticeLevel::Error), 0);
}

#[tokio::test(start_paused = true)]
async fn test_storage_retry_network_failure_while_online_is_final() {
    let notifier = Arc::new(RecordingNotifier::new());
    let dyn_notifier: Arc<dyn Notifier> = notifier.clone();
    let recovery = ErrorRecovery::new(
        RecoveryConfig::default(),
        ConnectivityMonitor::new(true),
        dyn_notifier.clone(),
    );

    let calls = counter();
    let attempts = Arc::clone(&calls);
    let result: Result<(), _> = with_storage_retry(
        || {
            let attempts = Arc::clone(&attempts);
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(TransferError::network("reset"))
            }
        },
        "Upload",
        &RetryOptions::default(),
        &recovery,
        &dyn_notifier,
    )
    .await;

    assert!(result.unwrap_err().is_network());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(notifier.count(NoticeLevel::Success), 0);
    assert_eq!(notifier.count(NoticeLevel::Error), 1);
}

#[tokio::test(start_paused = true)]
async fn test_storage_retry_extra_attempt_error_is_returned_as_is() {
    let notifier = Arc::new(RecordingNotifier::new());
    let dyn_notifier: Arc<dyn Notifier> = notifier.clone();
    let recovery = ErrorRecovery::new(
        RecoveryConfig::default(),
        ConnectivityMonitor::new(true),
        dyn_notifier.clone(),
    );
    recovery.register(ErrorKind::Network, || async { true });

    let calls = counter();
    let attempts = Arc::clone(&calls);
    let result: Result<(), _> = with_storage_retry(
        || {
            let attempts = Arc::clone(&attempts);
            async move {
                let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                Err(TransferError::network(format!("attempt {n}")))
            }
        },
        "Upload",
        &RetryOptions::default(),
        &recovery,
        &dyn_notifier,
    )
    .await;

    assert_eq!(calls.load(Ordering::SeqCst), 4);
    let error = result.unwrap_err();
    assert!(
        matches!(&error, TransferError::Network { message } if message == "attempt 4"),
        "{error}"
    );
    assert_eq!(notifier.count(NoticeLevel::Success), 1);
    assert_eq!(notifier.count(NoticeLevel::Error), 1);
}

#[tokio::test(start_paused = true)]
async fn test_storage_retry_reports_unrecoverable_failure_once() {
    let notifier = Arc::new(RecordingNotifier::new());
    let dyn_notifier: Arc<dyn Notifier> = notifier.clone();
    let recovery = ErrorRecovery::new(
        RecoveryConfig::default(),
        ConnectivityMonitor::new(true),
        dyn_notifier.clone(),
    );

    let result: Result<(), _> = with_storage_retry(
        || async { Err(TransferError::backend("NoSuchBucket", "gone")) },
        "Upload",
        &RetryOptions::default(),
        &recovery,
        &dyn_notifier,
    )
    .await;

    assert_eq!(result.unwrap_err().status_code(), 404);
    assert_eq!(notifier.count(NoticeLevel::Warning), 0);
    assert_eq!(notifier.count(NoticeLevel::Error), 1);
}

#[tokio::test(start_paused = true)]
async fn test_storage_retry_uses_registered_strategy() {
    let notifier = Arc::new(RecordingNotifier::new());
    let dyn_notifier: Arc<dyn Notifier> = notifier.clone();
    let recovery = ErrorRecovery::new(
        RecoveryConfig::default(),
        ConnectivityMonitor::new(true),
        dyn_notifier.clone(),
    );
    let refreshed = counter();
    let refreshes = Arc::clone(&refreshed);
    recovery.register(ErrorKind::Auth, move || {
        let refreshes = Arc::clone(&refreshes);
        async move {
            refreshes.fetch_add(1, Ordering::SeqCst);
            true
        }
    });

    let calls = counter();
    let attempts = Arc::clone(&calls);
    let result = with_storage_retry(
        || {
            let attempts = Arc::clone(&attempts);
            async move {
                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(TransferError::http(401, "expired"))
                } else {
                    Ok(())
                }
            }
        },
        "Listing",
        &RetryOptions::default(),
        &recovery,
        &dyn_notifier,
    )
    .await;

    assert!(result.is_ok());
    assert_eq!(refreshed.load(Ordering::SeqCst), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

// ---------------------------------------------------------------------------
// Transfer orchestrator
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_upload_survives_transient_failures() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(FlakyStore::new(dir.path(), 2));
    let (orch, notifier) = recording_orchestrator(Arc::clone(&store));

    let outcome = orch
        .upload_file(&text("a.txt", "hello"), "", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.key.as_str(), "a.txt");
    assert_eq!(store.puts.load(Ordering::SeqCst), 3);
    assert_eq!(notifier.count(NoticeLevel::Warning), 1);
    assert_eq!(notifier.count(NoticeLevel::Error), 0);
    assert_eq!(std::fs::read(dir.path().join("a.txt")).unwrap(), b"hello");
}

#[tokio::test]
async fn test_start_upload_reports_each_file() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(FlakyStore::new(dir.path(), 0));
    let (orch, _) = recording_orchestrator(store);

    let files = vec![text("a.txt", "a"), text("deny.txt", "d"), text("b.txt", "b")];
    let mut rx = orch.start_upload(files, "inbox".to_string(), CancellationToken::new());

    let mut failed = Vec::new();
    let mut progress_events = 0;
    let mut complete = None;
    while let Some(event) = rx.recv().await {
        match event {
            TransferEvent::Progress(_) => progress_events += 1,
            TransferEvent::FileFailed(error) => failed.push(error),
            TransferEvent::Complete(done) => complete = Some(done),
        }
    }

    let complete = complete.unwrap();
    assert_eq!(progress_events, 3);
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].target, "deny.txt");
    assert_eq!(failed[0].kind, ErrorKind::AccessDenied);
    assert_eq!(complete.succeeded, 2);
    assert_eq!(complete.failed, 1);
    assert!(dir.path().join("inbox/a.txt").is_file());
    assert!(dir.path().join("inbox/b.txt").is_file());
}

#[tokio::test]
async fn test_upload_batch_rejects_whole_batch_before_network() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(FlakyStore::new(dir.path(), 0));
    let (orch, _) = recording_orchestrator(Arc::clone(&store));

    let files = vec![text("a.txt", "1"), text("a.txt", "2")];
    let err = orch
        .upload_batch(&files, "", &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.user_message().contains("Duplicate file names: a.txt"));
    assert_eq!(store.puts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_upload_batch_rejects_names_that_sanitize_alike() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(FlakyStore::new(dir.path(), 0));
    let (orch, _) = recording_orchestrator(Arc::clone(&store));

    let files = vec![text("Café.txt", "accent"), text("Cafe.txt", "plain")];
    let err = orch
        .upload_batch(&files, "", &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), 400);
    assert!(err.user_message().contains("stored as 'Cafe.txt'"), "{err}");
    assert_eq!(store.puts.load(Ordering::SeqCst), 0);
    assert!(!dir.path().join("Cafe.txt").exists());
}

#[tokio::test]
async fn test_start_upload_rejects_names_that_sanitize_alike() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(FlakyStore::new(dir.path(), 0));
    let (orch, _) = recording_orchestrator(Arc::clone(&store));

    let files = vec![text("Café.txt", "accent"), text("Cafe.txt", "plain")];
    let mut rx = orch.start_upload(files, String::new(), CancellationToken::new());

    let mut complete = None;
    while let Some(event) = rx.recv().await {
        if let TransferEvent::Complete(done) = event {
            complete = Some(done);
        }
    }

    assert_eq!(complete.unwrap().succeeded, 0);
    assert_eq!(store.puts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_upload_batch_auto_rename_reserves_names_across_the_batch() {
    let dir = TempDir::new().unwrap();
    let (orch, _) = recording_orchestrator(Arc::new(LocalStore::new(dir.path())));
    let orch = orch.with_conflict_resolution(ConflictResolution::AutoRename);
    let cancel = CancellationToken::new();
    orch.upload_file(&text("a.txt", "old"), "docs", &cancel).await.unwrap();

    let files = vec![text("a.txt", "new"), text("a (1).txt", "other")];
    let results = orch.upload_batch(&files, "docs", &cancel).await.unwrap();

    let keys: Vec<String> = results
        .into_iter()
        .map(|r| r.unwrap().key.to_string())
        .collect();
    assert_eq!(keys, vec!["docs/a (1).txt", "docs/a (2).txt"]);
    assert_eq!(std::fs::read(dir.path().join("docs/a.txt")).unwrap(), b"old");
    assert_eq!(std::fs::read(dir.path().join("docs/a (1).txt")).unwrap(), b"new");
    assert_eq!(std::fs::read(dir.path().join("docs/a (2).txt")).unwrap(), b"other");
}

#[tokio::test]
async fn test_upload_batch_keeps_submission_order() {
    let dir = TempDir::new().unwrap();
    let (orch, _) = recording_orchestrator(Arc::new(LocalStore::new(dir.path())));

    let files = vec![text("one.txt", "1"), text("two.txt", "22"), text("three.txt", "333")];
    let results = orch
        .upload_batch(&files, "nums/", &CancellationToken::new())
        .await
        .unwrap();

    let keys: Vec<String> = results
        .into_iter()
        .map(|r| r.unwrap().key.to_string())
        .collect();
    assert_eq!(keys, vec!["nums/one.txt", "nums/two.txt", "nums/three.txt"]);
}

#[tokio::test]
async fn test_move_missing_folder_fails_without_writing() {
    let dir = TempDir::new().unwrap();
    let (orch, _) = recording_orchestrator(Arc::new(LocalStore::new(dir.path())));
    let cancel = CancellationToken::new();
    orch.create_folder("", "dest", &cancel).await.unwrap();

    let err = orch
        .move_item(&ItemRef::folder("ghost/"), "dest", &cancel)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Backend);
    assert!(err.to_string().contains("ghost/"), "{err}");
    assert!(!dir.path().join("dest/ghost").exists());
}

#[tokio::test]
async fn test_move_folder_rewrites_every_key() {
    let dir = TempDir::new().unwrap();
    let (orch, _) = recording_orchestrator(Arc::new(LocalStore::new(dir.path())));
    let cancel = CancellationToken::new();

    orch.upload_file(&text("c.txt", "c"), "a/b", &cancel).await.unwrap();
    orch.upload_file(&text("x.txt", "x"), "a", &cancel).await.unwrap();
    orch.create_folder("", "dest", &cancel).await.unwrap();

    let outcome = orch
        .move_item(&ItemRef::folder("a"), "dest/", &cancel)
        .await
        .unwrap();

    assert_eq!(outcome.from, "a/");
    assert_eq!(outcome.to, "dest/a/");
    assert!(dir.path().join("dest/a/b/c.txt").is_file());
    assert!(dir.path().join("dest/a/x.txt").is_file());
    assert!(!dir.path().join("a").exists());
}

#[tokio::test]
async fn test_move_into_own_subtree_is_rejected() {
    let dir = TempDir::new().unwrap();
    let (orch, _) = recording_orchestrator(Arc::new(LocalStore::new(dir.path())));

    let err = orch
        .move_item(&ItemRef::folder("a/"), "a/b/", &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_handle_upload_maps_missing_bucket() {
    let dir = TempDir::new().unwrap();
    let (orch, notifier) =
        recording_orchestrator(Arc::new(LocalStore::new(dir.path().join("missing"))));

    let request = UploadRequest::new(text("a.txt", "a"), "docs");
    let (status, body) = orch.handle_upload(request, &CancellationToken::new()).await;

    assert_eq!(status, 404);
    assert_eq!(body.error.as_deref(), Some("Storage bucket not found"));
    assert_eq!(notifier.count(NoticeLevel::Error), 1);
}

#[tokio::test]
async fn test_handle_upload_success_body() {
    let dir = TempDir::new().unwrap();
    let (orch, _) = recording_orchestrator(Arc::new(LocalStore::new(dir.path())));

    let request = UploadRequest::new(text("Café menu.txt", "soup"), "menus/");
    let (status, body) = orch.handle_upload(request, &CancellationToken::new()).await;

    assert_eq!(status, 200);
    assert!(body.success);
    assert_eq!(body.key.as_deref(), Some("menus/Cafe menu.txt"));
    assert_eq!(body.filename.as_deref(), Some("Cafe menu.txt"));
    assert_eq!(body.original_filename.as_deref(), Some("Café menu.txt"));
    assert_eq!(body.size, Some(4));
    assert_eq!(body.content_type.as_deref(), Some("text/plain"));
}

#[tokio::test]
async fn test_folder_tree_endpoint() {
    let dir = TempDir::new().unwrap();
    let (orch, _) = recording_orchestrator(Arc::new(LocalStore::new(dir.path())));
    let cancel = CancellationToken::new();

    orch.upload_file(&text("a.txt", "aaaa"), "photos/2024", &cancel).await.unwrap();
    orch.create_folder("photos", "empty", &cancel).await.unwrap();

    let (status, body) = orch.folder_tree("", &cancel).await;
    assert_eq!(status, 200);
    let tree = body.tree.unwrap();
    let photos = tree.find("photos/").unwrap();
    assert_eq!(photos.total_size, 4);
    assert!(tree.find("photos/empty/").is_some());
    assert_eq!(tree.find("photos/2024/").unwrap().file_count, 1);

    let missing = TransferOrchestrator::new(
        Arc::new(LocalStore::new(dir.path().join("nope"))),
        &ClientConfig::default(),
        Arc::new(RecordingNotifier::new()),
    );
    let (status, body) = missing.folder_tree("", &cancel).await;
    assert_eq!(status, 500);
    assert!(!body.success);
}

// ---------------------------------------------------------------------------
// Drag and drop
// ---------------------------------------------------------------------------

#[test]
fn test_leave_inside_zone_keeps_highlight() {
    let state = DragState::shared();
    let mut zone = DropZone::new("inbox/", state.clone());
    let rect = Rect::new(0.0, 0.0, 200.0, 100.0);

    zone.handle(DragEvent::Enter(PayloadKind::Files));
    assert!(zone.is_file_drag_over());
    assert_eq!(state.lock().unwrap().current_drop_target.as_deref(), Some("inbox/"));

    zone.handle(DragEvent::Leave {
        pointer: Point::new(50.0, 50.0),
        zone: rect,
    });
    assert!(zone.is_file_drag_over());

    zone.handle(DragEvent::Leave {
        pointer: Point::new(250.0, 50.0),
        zone: rect,
    });
    assert!(!zone.is_file_drag_over());
    assert_eq!(state.lock().unwrap().current_drop_target, None);
}

#[test]
fn test_illegal_item_hover_is_not_highlighted() {
    let state = DragState::shared();
    let mut zone = DropZone::new("docs/", state.clone());

    zone.handle(DragEvent::Start(ItemRef::file("docs/a.txt")));
    zone.handle(DragEvent::Over(PayloadKind::Item));
    assert!(!zone.is_item_drag_over());
    assert_eq!(state.lock().unwrap().current_drop_target, None);

    zone.set_current_path("archive/");
    zone.handle(DragEvent::Over(PayloadKind::Item));
    assert!(zone.is_item_drag_over());

    zone.handle(DragEvent::Cancel);
    assert!(!zone.is_item_drag_over());
    assert_eq!(*state.lock().unwrap(), DragState::default());
}

#[test]
fn test_item_drop_resolves_to_move() {
    let state = DragState::shared();
    let mut zone = DropZone::new("archive/", state.clone());
    let item = ItemRef::file("docs/a.txt");

    zone.handle(DragEvent::Start(item.clone()));
    let command = zone.handle(DragEvent::Drop(DragPayload::item(&item).unwrap()));

    match command {
        Some(DropCommand::Move { item: moved, destination }) => {
            assert_eq!(moved, item);
            assert_eq!(destination, "archive/");
        }
        other => panic!("expected move, got {other:?}"),
    }
    assert_eq!(*state.lock().unwrap(), DragState::default());
}

#[test]
fn test_malformed_payload_is_ignored() {
    let state = DragState::shared();
    let mut zone = DropZone::new("archive/", state.clone());

    zone.handle(DragEvent::Start(ItemRef::file("docs/a.txt")));
    let command = zone.handle(DragEvent::Drop(DragPayload::Item("{not json".to_string())));

    assert!(command.is_none());
    assert_eq!(*state.lock().unwrap(), DragState::default());
}

#[test]
fn test_item_drop_goes_to_custom_handler() {
    let state = DragState::shared();
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let mut zone = DropZone::new("archive/", state).with_item_handler(move |item, dest| {
        sink.lock().unwrap().push((item.key.clone(), dest.to_string()));
    });

    let item = ItemRef::folder("photos/");
    let command = zone.handle(DragEvent::Drop(DragPayload::item(&item).unwrap()));

    assert!(command.is_none());
    assert_eq!(
        *seen.lock().unwrap(),
        vec![("photos/".to_string(), "archive/".to_string())]
    );
}

#[test]
fn test_illegal_item_drop_is_rejected() {
    let mut zone = DropZone::new("photos/2024/", DragState::shared());
    let item = ItemRef::folder("photos/");
    let command = zone.handle(DragEvent::Drop(DragPayload::item(&item).unwrap()));
    assert!(command.is_none());
}

#[tokio::test]
async fn test_file_drop_flows_into_upload() {
    let dir = TempDir::new().unwrap();
    let (orch, notifier) = recording_orchestrator(Arc::new(LocalStore::new(dir.path())));
    let cancel = CancellationToken::new();

    let zone = DropZone::new("inbox/", DragState::shared());
    let (event_tx, event_rx) = mpsc::channel(8);
    let (command_tx, command_rx) = mpsc::channel(8);
    let handle = spawn_drop_zone(zone, event_rx, command_tx);

    event_tx.send(DragEvent::Enter(PayloadKind::Files)).await.unwrap();
    event_tx
        .send(DragEvent::Drop(DragPayload::Files(vec![text("note.txt", "hi")])))
        .await
        .unwrap();
    drop(event_tx);

    let zone = handle.await.unwrap();
    assert!(!zone.is_file_drag_over());

    orch.run_drop_commands(command_rx, &cancel).await;

    assert!(dir.path().join("inbox/note.txt").is_file());
    assert_eq!(notifier.count(NoticeLevel::Success), 1);
}
