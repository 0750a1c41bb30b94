//! User-visible notifications.

use std::sync::Mutex;

/// Severity of a notice shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Sink for transient user-facing messages (toasts, status lines).
pub trait Notifier: Send + Sync {
    /// Show a message.
    fn notify(&self, level: NoticeLevel, message: &str);

    /// Show a success message.
    fn success(&self, message: &str) {
        self.notify(NoticeLevel::Success, message);
    }

    /// Show a warning.
    fn warning(&self, message: &str) {
        self.notify(NoticeLevel::Warning, message);
    }

    /// Show an error.
    fn error(&self, message: &str) {
        self.notify(NoticeLevel::Error, message);
    }
}

/// Notifier that forwards every notice to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        match level {
            NoticeLevel::Info | NoticeLevel::Success => {
                tracing::info!(target: "bucketfile::notice", "{}", message)
            }
            NoticeLevel::Warning => tracing::warn!(target: "bucketfile::notice", "{}", message),
            NoticeLevel::Error => tracing::error!(target: "bucketfile::notice", "{}", message),
        }
    }
}

/// Notifier that keeps every notice in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<(NoticeLevel, String)>>,
}

impl RecordingNotifier {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn notices(&self) -> Vec<(NoticeLevel, String)> {
        self.notices
            .lock()
            .map(|n| n.clone())
            .unwrap_or_default()
    }

    /// Number of notices at `level`.
    pub fn count(&self, level: NoticeLevel) -> usize {
        self.notices().iter().filter(|(l, _)| *l == level).count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        if let Ok(mut notices) = self.notices.lock() {
            notices.push((level, message.to_string()));
        }
    }
}
