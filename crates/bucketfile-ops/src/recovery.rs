//! Error recovery after retries are exhausted.
//!
//! An [`ErrorRecovery`] instance holds recovery strategies keyed by error
//! classification. It is created once at startup and shared by handle; only
//! one recovery runs at a time and concurrent requests fail fast.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use indexmap::IndexMap;
use tokio::sync::watch;

use bucketfile_core::{ErrorKind, RecoveryConfig, TransferError};

use crate::notify::Notifier;
use crate::storage::BoxFuture;

/// A zero-argument recovery action. Resolves to `true` when the failed
/// operation should be tried again.
pub type RecoveryAction = Arc<dyn Fn() -> BoxFuture<'static, bool> + Send + Sync>;

/// How a strategy is matched against an error.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecoveryKey {
    /// Exact match on the error's classification tag.
    Kind(ErrorKind),
    /// Substring match on the error's message.
    MessageContains(String),
}

impl RecoveryKey {
    fn matches(&self, error: &TransferError, message: &str) -> bool {
        match self {
            Self::Kind(kind) => error.kind() == *kind,
            Self::MessageContains(needle) => message.contains(needle.as_str()),
        }
    }
}

impl From<ErrorKind> for RecoveryKey {
    fn from(kind: ErrorKind) -> Self {
        Self::Kind(kind)
    }
}

impl From<&str> for RecoveryKey {
    fn from(needle: &str) -> Self {
        Self::MessageContains(needle.to_string())
    }
}

/// Online/offline state with change notification.
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    state: Arc<watch::Sender<bool>>,
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ConnectivityMonitor {
    /// Create a monitor with an initial state.
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self {
            state: Arc::new(tx),
        }
    }

    /// Whether the client currently believes it is online.
    pub fn is_online(&self) -> bool {
        *self.state.borrow()
    }

    /// Record a connectivity change. Waiters are woken on the transition to online.
    pub fn set_online(&self, online: bool) {
        self.state.send_if_modified(|current| {
            let changed = *current != online;
            *current = online;
            changed
        });
    }

    /// Wait until the client is online, up to `timeout`.
    pub async fn wait_for_online(&self, timeout: Duration) -> bool {
        let mut rx = self.state.subscribe();
        matches!(
            tokio::time::timeout(timeout, rx.wait_for(|online| *online)).await,
            Ok(Ok(_))
        )
    }
}

/// Resets the in-progress flag when a recovery finishes, however it ends.
struct InProgress<'a>(&'a AtomicBool);

impl Drop for InProgress<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Registry of recovery strategies plus built-in heuristics.
pub struct ErrorRecovery {
    strategies: Mutex<IndexMap<RecoveryKey, RecoveryAction>>,
    in_progress: AtomicBool,
    connectivity: ConnectivityMonitor,
    notifier: Arc<dyn Notifier>,
    config: RecoveryConfig,
}

impl fmt::Debug for ErrorRecovery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorRecovery")
            .field("strategies", &self.strategy_count())
            .field("in_progress", &self.is_recovering())
            .field("online", &self.connectivity.is_online())
            .field("config", &self.config)
            .finish()
    }
}

impl ErrorRecovery {
    /// Create a registry with no strategies.
    pub fn new(
        config: RecoveryConfig,
        connectivity: ConnectivityMonitor,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            strategies: Mutex::new(IndexMap::new()),
            in_progress: AtomicBool::new(false),
            connectivity,
            notifier,
            config,
        }
    }

    /// The connectivity monitor consulted for network failures.
    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    /// Register a strategy, replacing any previous one for the same key.
    pub fn register<F, Fut>(&self, key: impl Into<RecoveryKey>, action: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = bool> + Send + 'static,
    {
        let action: RecoveryAction = Arc::new(move || -> BoxFuture<'static, bool> {
            Box::pin(action())
        });
        if let Ok(mut strategies) = self.strategies.lock() {
            strategies.insert(key.into(), action);
        }
    }

    /// Number of registered strategies.
    pub fn strategy_count(&self) -> usize {
        self.strategies.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Whether a recovery is currently running.
    pub fn is_recovering(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }

    fn find_strategy(&self, error: &TransferError) -> Option<RecoveryAction> {
        let message = error.to_string();
        let strategies = self.strategies.lock().ok()?;
        strategies
            .iter()
            .find(|(key, _)| key.matches(error, &message))
            .map(|(_, action)| Arc::clone(action))
    }

    /// Try to recover from `error`. Returns whether the caller should retry.
    ///
    /// Returns `false` immediately if another recovery is already running.
    pub async fn recover(&self, error: &TransferError) -> bool {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!(error = %error, "Recovery already in progress, not retrying");
            return false;
        }
        let _guard = InProgress(&self.in_progress);

        if let Some(action) = self.find_strategy(error) {
            let recovered = action().await;
            tracing::info!(kind = %error.kind(), recovered, "Registered recovery strategy finished");
            return recovered;
        }

        if error.is_network() {
            if self.connectivity.is_online() {
                tracing::debug!("Network failure while online, nothing to wait for");
                return false;
            }
            self.notifier
                .warning("You appear to be offline. Waiting for the connection to return...");
            let restored = self
                .connectivity
                .wait_for_online(self.config.online_timeout())
                .await;
            tracing::info!(restored, "Waited for connectivity");
            return restored;
        }

        if error.kind() == ErrorKind::Auth {
            self.notifier
                .error("Your session has expired. Please sign in again.");
            return false;
        }

        false
    }
}
