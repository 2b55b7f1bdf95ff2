//! Bounded retry with geometric backoff for any fallible async operation.
//!
//! A decorator-like wrapper, not a trait object: `RetryPolicy::run` takes a
//! closure producing a fresh future per attempt, same shape as
//! `ExponentialBackoffPolicy::execute_with_retry` elsewhere in this crate's
//! ecosystem, but reusing the retryable/non-retryable split already carried
//! by [`BimbasError`](crate::error::BimbasError) instead of a separate trait.

use std::future::Future;
use std::time::Duration;

use crate::error::BimbasError;

/// Retry parameters: up to `max_attempts` invocations, sleeping `delay`
/// between attempts and multiplying it by `backoff` each time.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
    backoff: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(10), 2.0)
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration, backoff: f64) -> Self {
        Self {
            max_attempts,
            delay,
            backoff,
        }
    }

    /// Run `f` with retry. `f` is called again for each attempt, so it must
    /// be cheap to construct (typically a closure that builds and sends one
    /// HTTP request).
    ///
    /// - `max_attempts <= 0` invokes `f` exactly once, with no retry logic.
    /// - Non-retryable errors propagate immediately.
    /// - After the last attempt, the last `Retryable` error is re-raised.
    pub async fn run<F, Fut, T>(&self, mut f: F) -> Result<T, BimbasError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BimbasError>>,
    {
        if self.max_attempts == 0 {
            return f().await;
        }

        let mut delay = self.delay;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match f().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    log::info!(
                        "{err} — retrying in {:.1}s (attempt {attempt}/{})",
                        delay.as_secs_f64(),
                        self.max_attempts
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.mul_f64(self.backoff);
                }
                Err(err) => {
                    if err.is_retryable() {
                        log::error!("max attempts reached, last error: {err}");
                    }
                    return Err(err);
                }
            }
        }
    }
}
