//! Timeout, retry, and cancellation wrapping for fallible async operations.
//!
//! Composition order is fixed: the timeout clamps a single attempt, the retry
//! loop sits around the timeout, and cancellation wraps the whole thing so a
//! `cancel()` short-circuits an in-flight retry/timeout cycle.

use std::future::Future;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::debug;

use crate::domain::settings::{RetryConfig, TaskOptions, TimeoutConfig};
use crate::error::BleError;

/// Observer invoked between retry attempts, with the 1-based attempt number
/// and the error that triggered it.
pub type AttemptObserver = dyn Fn(u32, &BleError) + Send + Sync;

/// Clamp `fut` to the configured deadline. `None` passes through untouched.
pub async fn with_timeout<T, F>(config: Option<&TimeoutConfig>, fut: F) -> Result<T, BleError>
where
    F: Future<Output = Result<T, BleError>>,
{
    let Some(config) = config else {
        return fut.await;
    };
    match tokio::time::timeout(Duration::from_millis(config.duration_ms), fut).await {
        Ok(result) => result,
        Err(_) => Err(BleError::Timeout {
            message: config
                .message
                .clone()
                .unwrap_or_else(|| format!("no completion within {}ms", config.duration_ms)),
        }),
    }
}

/// Run `op`, retrying on failure per the configured schedule. `None` runs the
/// operation exactly once.
pub async fn with_retry<T, F, Fut>(
    config: Option<&RetryConfig>,
    on_failed_attempt: Option<&AttemptObserver>,
    mut op: F,
) -> Result<T, BleError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BleError>>,
{
    let Some(config) = config else {
        return op().await;
    };
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= config.max_attempts {
                    return Err(err);
                }
                attempt += 1;
                if let Some(observer) = on_failed_attempt {
                    observer(attempt, &err);
                }
                debug!(attempt, error = %err, "attempt failed, retrying");
                tokio::time::sleep(config.delay_for(attempt)).await;
            }
        }
    }
}

/// Retry around timeout, per `options`. This is what the engine applies to
/// every native call.
pub async fn run_task<T, F, Fut>(options: &TaskOptions, op: F) -> Result<T, BleError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BleError>>,
{
    let timeout = options.timeout.as_ref();
    let mut op = op;
    with_retry(options.retry.as_ref(), None, move || {
        with_timeout(timeout, op())
    })
    .await
}

/// Cancellation behavior for [`cancelable`].
pub struct CancelableOptions {
    /// When true (the default) a cancel rejects the wrapped future with
    /// [`BleError::Canceled`]; otherwise it resolves with `None`.
    pub reject_on_cancel: bool,
    /// Hook invoked when the cancel actually fires.
    pub on_cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Default for CancelableOptions {
    fn default() -> Self {
        Self {
            reject_on_cancel: true,
            on_cancel: None,
        }
    }
}

/// Handle to cancel a wrapped operation. Consuming; dropping it without
/// calling [`cancel`](Self::cancel) lets the operation run to completion.
pub struct CancelHandle {
    tx: Option<oneshot::Sender<()>>,
}

impl CancelHandle {
    pub fn cancel(mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Wrap `fut` with cooperative cancellation. Returns the handle and the
/// wrapped future; the future resolves `Ok(Some(value))` on normal
/// completion.
pub fn cancelable<T, F>(
    fut: F,
    options: CancelableOptions,
) -> (CancelHandle, impl Future<Output = Result<Option<T>, BleError>>)
where
    F: Future<Output = Result<T, BleError>>,
{
    let (tx, rx) = oneshot::channel::<()>();
    let wrapped = async move {
        tokio::pin!(fut);
        tokio::select! {
            result = &mut fut => result.map(Some),
            outcome = rx => {
                if outcome.is_ok() {
                    if let Some(hook) = options.on_cancel {
                        hook();
                    }
                    if options.reject_on_cancel {
                        Err(BleError::Canceled)
                    } else {
                        Ok(None)
                    }
                } else {
                    // Handle dropped without canceling; run to completion.
                    fut.await.map(Some)
                }
            }
        }
    };
    (CancelHandle { tx: Some(tx) }, wrapped)
}
