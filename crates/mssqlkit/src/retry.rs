//! Bounded retry for drop steps that race with server-held locks.
//!
//! Every failure is treated as transient: the wrapped operations are narrow
//! lock-contention points, not general network calls.

use crate::error::{DropStep, Error, Result};
use crate::types::RetryPolicy;
use std::thread;

/// Callback trait for retry progress notifications.
pub trait RetryCallback {
    /// Called after a failed attempt that will be retried.
    ///
    /// # Arguments
    /// * `step` - Step being retried
    /// * `attempt` - Attempt that just failed (1-indexed)
    /// * `max_attempts` - Maximum number of attempts
    /// * `error` - The failure
    fn on_retry(&self, step: DropStep, attempt: u32, max_attempts: u32, error: &Error);
}

/// No-op callback.
pub struct NoCallback;

impl RetryCallback for NoCallback {
    fn on_retry(&self, _step: DropStep, _attempt: u32, _max_attempts: u32, _error: &Error) {}
}

/// Callback that reports retries through `log`.
pub struct LogCallback;

impl RetryCallback for LogCallback {
    fn on_retry(&self, step: DropStep, attempt: u32, max_attempts: u32, error: &Error) {
        log::warn!("{step}: attempt {attempt}/{max_attempts} failed: {error}");
    }
}

/// Run `operation` under `policy`.
///
/// Sleeps `policy.delay` after each failure except the last. When every
/// attempt fails the last error is returned wrapped in
/// [`Error::DropFailed`] naming `target` and `step`.
pub fn with_retry<T, F>(
    policy: &RetryPolicy,
    target: &str,
    step: DropStep,
    callback: Option<&dyn RetryCallback>,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let max_attempts = policy.attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match operation() {
            Ok(value) => {
                if attempt > 1 {
                    log::info!("{step} for {target} succeeded on attempt {attempt}");
                }
                return Ok(value);
            }
            Err(e) if attempt >= max_attempts => {
                return Err(Error::DropFailed {
                    target: target.to_string(),
                    step,
                    attempts: attempt,
                    source: Box::new(e),
                });
            }
            Err(e) => {
                if let Some(cb) = callback {
                    cb.on_retry(step, attempt, max_attempts, &e);
                }
                if !policy.delay.is_zero() {
                    thread::sleep(policy.delay);
                }
            }
        }
    }
}
