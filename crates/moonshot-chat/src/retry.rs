//! Bounded exponential-backoff retry around transport calls

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ChatError;

/// Observer notified about retry attempts
pub trait RetryListener: Send + Sync {
    /// An attempt (1-based) failed; called for every failure, retried or not
    fn on_error(&self, attempt: u32, error: &ChatError);

    /// The operation succeeded after `retries` failed attempts
    fn on_success(&self, retries: u32) {
        let _ = retries;
    }
}

/// Retry policy applied to every non-streamed completion request
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_backoff: Duration,
    multiplier: f64,
    max_backoff: Duration,
    listeners: Vec<Arc<dyn RetryListener>>,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("initial_backoff", &self.initial_backoff)
            .field("multiplier", &self.multiplier)
            .field("max_backoff", &self.max_backoff)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(10, Duration::from_secs(2), 5.0, Duration::from_secs(180))
    }
}

impl RetryPolicy {
    /// Policy with explicit limits
    ///
    /// `max_attempts` counts the first attempt and is clamped to at least one;
    /// `multiplier` is clamped to at least `1.0`.
    pub fn new(max_attempts: u32, initial_backoff: Duration, multiplier: f64, max_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            multiplier: multiplier.max(1.0),
            max_backoff,
            listeners: Vec::new(),
        }
    }

    /// Ten attempts with a one millisecond fixed delay, for tests
    pub fn short() -> Self {
        Self::new(10, Duration::from_millis(1), 1.0, Duration::from_millis(1))
    }

    /// Policy that never retries
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, 1.0, Duration::ZERO)
    }

    /// Register a listener
    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn RetryListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Maximum number of attempts, including the first
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before retry number `retry` (1-based), capped at the maximum backoff
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry.saturating_sub(1)).unwrap_or(i32::MAX);
        let factor = self.multiplier.powi(exponent);
        let secs = self.initial_backoff.as_secs_f64() * factor;
        if !secs.is_finite() || secs >= self.max_backoff.as_secs_f64() {
            return self.max_backoff;
        }
        Duration::from_secs_f64(secs)
    }

    /// Run `operation`, retrying transient failures until attempts run out
    ///
    /// Non-transient errors return immediately. On exhaustion the last error
    /// is returned unchanged.
    pub async fn execute<T, F, Fut>(&self, mut operation: F) -> Result<T, ChatError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ChatError>>,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => {
                    for listener in &self.listeners {
                        listener.on_success(attempt - 1);
                    }
                    return Ok(value);
                }
                Err(error) => {
                    for listener in &self.listeners {
                        listener.on_error(attempt, &error);
                    }

                    if !error.is_transient() || attempt >= self.max_attempts {
                        return Err(error);
                    }

                    let delay = self.backoff(attempt);
                    tracing::debug!(
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %error,
                        "retrying chat completion request"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
