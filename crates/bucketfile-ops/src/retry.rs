//! Retry with exponential backoff and cooperative cancellation.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use bucketfile_core::{RetryConfig, TransferError};

use crate::notify::Notifier;
use crate::recovery::ErrorRecovery;

/// Decides whether an error is worth another attempt.
pub type RetryClassifier = Arc<dyn Fn(&TransferError) -> bool + Send + Sync>;

/// Called with the 1-based attempt number before each backoff delay.
pub type RetryObserver = Arc<dyn Fn(u32, &TransferError) + Send + Sync>;

/// Default classifier: network, timeout, and HTTP 429/502/503/504 failures.
pub fn is_retryable(error: &TransferError) -> bool {
    error.is_network()
}

/// Options for [`with_retry`].
#[derive(Clone, Default)]
pub struct RetryOptions {
    /// Attempt budget and delays.
    pub config: RetryConfig,
    /// Custom classifier; [`is_retryable`] when `None`.
    pub classifier: Option<RetryClassifier>,
    /// Observer invoked before every backoff delay.
    pub on_retry: Option<RetryObserver>,
    /// External cancellation.
    pub cancel: CancellationToken,
}

impl fmt::Debug for RetryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryOptions")
            .field("config", &self.config)
            .field("classifier", &self.classifier.is_some())
            .field("on_retry", &self.on_retry.is_some())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl RetryOptions {
    /// Create options with the given config and a fresh cancellation token.
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Use a custom retryability classifier.
    pub fn with_classifier(
        mut self,
        classifier: impl Fn(&TransferError) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.classifier = Some(Arc::new(classifier));
        self
    }

    /// Observe every scheduled retry.
    pub fn with_on_retry(
        mut self,
        observer: impl Fn(u32, &TransferError) + Send + Sync + 'static,
    ) -> Self {
        self.on_retry = Some(Arc::new(observer));
        self
    }

    /// Tie the retry loop to an external cancellation token.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn should_retry(&self, error: &TransferError) -> bool {
        match &self.classifier {
            Some(classifier) => classifier(error),
            None => is_retryable(error),
        }
    }
}

/// State of one in-flight [`with_retry`] invocation.
#[derive(Debug, Clone)]
pub struct RetryContext {
    /// Attempts started so far (1-based once running).
    pub attempt: u32,
    /// Total attempts allowed.
    pub max_attempts: u32,
    /// Delay before the next attempt.
    pub delay: Duration,
    /// Error of the most recent failed attempt.
    pub last_error: Option<TransferError>,
}

impl RetryContext {
    /// Create the initial context. A zero attempt budget still allows one attempt.
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            attempt: 0,
            max_attempts: config.max_attempts.max(1),
            delay: config.initial_delay(),
            last_error: None,
        }
    }

    /// Whether the current attempt is the last one allowed.
    pub fn is_final_attempt(&self) -> bool {
        self.attempt >= self.max_attempts
    }

    /// Grow the delay by the backoff factor, capped at the maximum.
    pub fn advance(&mut self, config: &RetryConfig) {
        let factor = if config.backoff_factor.is_finite() && config.backoff_factor >= 1.0 {
            config.backoff_factor
        } else {
            1.0
        };
        let max = config.max_delay();
        self.delay = Duration::try_from_secs_f64(self.delay.as_secs_f64() * factor)
            .unwrap_or(max)
            .min(max);
    }
}

/// Run `operation` until it succeeds, fails permanently, or the attempt
/// budget is spent.
///
/// Cancellation is honoured before each attempt, while an attempt is running
/// and during the backoff delay; in every case the result is
/// [`TransferError::Aborted`].
pub async fn with_retry<F, Fut, T>(mut operation: F, options: &RetryOptions) -> Result<T, TransferError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TransferError>>,
{
    let config = &options.config;
    let cancel = &options.cancel;
    let mut ctx = RetryContext::new(config);

    loop {
        if cancel.is_cancelled() {
            tracing::debug!(attempt = ctx.attempt + 1, "retry loop cancelled before attempt");
            return Err(TransferError::Aborted);
        }

        ctx.attempt += 1;
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TransferError::Aborted),
            result = operation() => result,
        };

        let error = match result {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        if matches!(error, TransferError::Aborted)
            || ctx.is_final_attempt()
            || cancel.is_cancelled()
            || !options.should_retry(&error)
        {
            return Err(error);
        }

        tracing::warn!(
            attempt = ctx.attempt,
            max_attempts = ctx.max_attempts,
            delay_ms = ctx.delay.as_millis() as u64,
            error = %error,
            "Attempt failed, retrying"
        );

        if let Some(observer) = &options.on_retry {
            observer(ctx.attempt, &error);
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransferError::Aborted),
            _ = tokio::time::sleep(ctx.delay) => {}
        }

        ctx.last_error = Some(error);
        ctx.advance(config);
    }
}

/// Derive a token that is cancelled when `parent` is, or after `after`.
///
/// The timer task stops as soon as the derived token is cancelled.
pub fn timeout_token(parent: &CancellationToken, after: Duration) -> CancellationToken {
    let token = parent.child_token();
    let timer = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = timer.cancelled() => {}
            _ = tokio::time::sleep(after) => timer.cancel(),
        }
    });
    token
}

/// Run `future` with a deadline derived from `parent`.
///
/// A fired deadline yields [`TransferError::Timeout`] (retryable); a
/// cancelled parent yields [`TransferError::Aborted`].
pub async fn with_timeout<F, T>(
    future: F,
    after: Duration,
    parent: &CancellationToken,
) -> Result<T, TransferError>
where
    F: Future<Output = Result<T, TransferError>>,
{
    let token = timeout_token(parent, after);
    let _stop_timer = token.clone().drop_guard();

    tokio::select! {
        biased;
        _ = token.cancelled() => {
            if parent.is_cancelled() {
                Err(TransferError::Aborted)
            } else {
                Err(TransferError::Timeout { after })
            }
        }
        result = future => result,
    }
}

/// Retry a storage call with user feedback and one recovery attempt.
///
/// The first scheduled retry shows a single warning. When the attempt budget
/// is spent, `recovery` gets one chance to repair the situation; if it
/// succeeds the operation runs exactly once more outside the backoff loop and
/// that attempt's error is returned as is.
pub async fn with_storage_retry<F, Fut, T>(
    mut operation: F,
    label: &str,
    options: &RetryOptions,
    recovery: &ErrorRecovery,
    notifier: &Arc<dyn Notifier>,
) -> Result<T, TransferError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TransferError>>,
{
    let warned = Arc::new(AtomicBool::new(false));
    let mut guarded = options.clone();
    {
        let inner = options.on_retry.clone();
        let warned = Arc::clone(&warned);
        let notifier = Arc::clone(notifier);
        let message = format!("{label} is taking longer than expected, retrying...");
        guarded.on_retry = Some(Arc::new(move |attempt: u32, error: &TransferError| {
            if let Some(inner) = &inner {
                inner(attempt, error);
            }
            if !warned.swap(true, Ordering::SeqCst) {
                notifier.warning(&message);
            }
        }));
    }

    let error = match with_retry(&mut operation, &guarded).await {
        Ok(value) => return Ok(value),
        Err(TransferError::Aborted) => return Err(TransferError::Aborted),
        Err(error) => error,
    };

    tracing::warn!(operation = label, error = %error, "Retries exhausted, attempting recovery");

    if !recovery.recover(&error).await {
        notifier.error(&format!("{label} failed: {}", error.user_message()));
        return Err(error);
    }

    notifier.success(&format!("Recovered, retrying {label}"));
    let cancel = &options.cancel;
    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(TransferError::Aborted),
        result = operation() => result,
    };

    if let Err(error) = &result {
        if !matches!(error, TransferError::Aborted) {
            notifier.error(&format!("{label} failed: {}", error.user_message()));
        }
    }
    result
}
