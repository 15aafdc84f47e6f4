//! Retry logic with exponential backoff for transient remote failures.

use crate::context::CancelToken;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::{Duration, Instant};

/// Granularity at which a backoff sleep notices cancellation
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Base delay between retries
    pub base_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_factor: f64,
    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// Create a new retry config with custom settings.
    pub fn new(max_attempts: u32, base_delay: Duration, backoff_factor: f64) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff_factor,
            max_delay: Duration::from_secs(30),
        }
    }

    /// Check that the backoff settings describe a non-shrinking schedule.
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfiguration`] when `backoff_factor` is below
    /// 1.0 or not finite.
    pub fn validate(&self) -> Result<()> {
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(Error::invalid(format!(
                "retry backoff_factor must be a finite number >= 1.0, got {}",
                self.backoff_factor
            )));
        }
        Ok(())
    }

    /// Calculate the delay for a given attempt number (0-indexed).
    ///
    /// The result always lies between zero and `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay = self.base_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        if delay.is_nan() {
            return Duration::ZERO;
        }
        let capped = delay.clamp(0.0, self.max_delay.as_secs_f64());
        Duration::try_from_secs_f64(capped).unwrap_or(self.max_delay)
    }

    /// Create a config that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }
}

/// Callback trait for retry progress notifications.
pub trait RetryCallback {
    /// Called when an operation is about to be retried.
    ///
    /// # Arguments
    /// * `attempt` - Attempt that just failed (1-indexed)
    /// * `max_attempts` - Maximum number of attempts
    /// * `error` - The error that triggered the retry
    /// * `delay` - Time until the next attempt
    fn on_retry(&mut self, attempt: u32, max_attempts: u32, error: &Error, delay: Duration);
}

/// No-op callback that does nothing.
pub struct NoCallback;

impl RetryCallback for NoCallback {
    fn on_retry(&mut self, _attempt: u32, _max_attempts: u32, _error: &Error, _delay: Duration) {}
}

/// Sleep for `delay`, waking early if `cancel` fires
///
/// Returns false when the sleep was cut short by cancellation.
fn sleep_unless_cancelled(delay: Duration, cancel: &CancelToken) -> bool {
    let Some(until) = Instant::now().checked_add(delay) else {
        // Unrepresentable wake time: poll until cancelled
        loop {
            if cancel.is_cancelled() {
                return false;
            }
            thread::sleep(CANCEL_POLL_INTERVAL);
        }
    };
    loop {
        if cancel.is_cancelled() {
            return false;
        }
        let now = Instant::now();
        if now >= until {
            return true;
        }
        thread::sleep((until - now).min(CANCEL_POLL_INTERVAL));
    }
}

/// Execute an operation with retry logic.
///
/// Retries the operation if it returns a retryable error, using exponential
/// backoff between attempts. The operation receives the 1-indexed attempt
/// number. Retrying stops early when `cancel` fires (returning
/// [`Error::Cancelled`]) or when the next attempt could not start before
/// `deadline` (returning the last error).
pub fn with_retry<T, F>(
    config: &RetryConfig,
    callback: &mut dyn RetryCallback,
    cancel: &CancelToken,
    deadline: Option<Instant>,
    mut operation: F,
) -> Result<T>
where
    F: FnMut(u32) -> Result<T>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut last_error: Option<Error> = None;

    for attempt in 0..max_attempts {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        match operation(attempt + 1) {
            Ok(result) => return Ok(result),
            Err(e) => {
                // If error is not retryable, return immediately
                if !e.is_retryable() {
                    return Err(e);
                }

                // If this was the last attempt, return the error
                if attempt + 1 >= max_attempts {
                    last_error = Some(e);
                    break;
                }

                let delay = config.delay_for_attempt(attempt);
                if let Some(deadline) = deadline
                    && Instant::now().checked_add(delay).is_none_or(|next| next >= deadline)
                {
                    log::debug!("Deadline reached after attempt {}, not retrying", attempt + 1);
                    return Err(e);
                }

                callback.on_retry(attempt + 1, max_attempts, &e, delay);

                if !sleep_unless_cancelled(delay, cancel) {
                    return Err(Error::Cancelled);
                }

                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| Error::transient("retry exhausted")))
}
