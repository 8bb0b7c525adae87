//! Backoff policy and the retry loop every gateway call runs through.
//!
//! A failed attempt is retried only when [`HuginnError::is_transient()`]
//! says so. Between attempts the loop sleeps for a provider `Retry-After`
//! hint when one was given, otherwise for a jittered exponential delay.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::telemetry;
use crate::{HuginnError, Result};

/// Backoff policy for one gateway.
///
/// With the defaults a record gets three attempts, sleeping roughly 1-2s
/// and then 2-4s in between:
///
/// ```rust
/// # use huginn::RetryConfig;
/// # use std::time::Duration;
/// let config = RetryConfig::new();
/// assert_eq!(config.delay_for_attempt(0), Duration::from_secs(2));
/// assert_eq!(config.delay_for_attempt(10), Duration::from_secs(60));
/// ```
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Attempts per record and configuration, the first call included.
    pub max_attempts: u32,
    /// Backoff before the first retry; doubles on each further retry.
    pub initial_delay: Duration,
    /// Ceiling for both the backoff and any `Retry-After` hint.
    pub max_delay: Duration,
    /// Draw each backoff from `[delay / 2, delay]` instead of sleeping
    /// for exactly `delay`.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single attempt, no retries.
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn jitter(mut self, enabled: bool) -> Self {
        self.jitter = enabled;
        self
    }

    /// Un-jittered backoff before retry number `attempt + 1`:
    /// `initial_delay * 2^attempt`, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.initial_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay)
    }

    /// The sleep actually taken before retry number `attempt + 1`.
    ///
    /// A `Retry-After` hint is used as given (capped at `max_delay`);
    /// otherwise the backoff, jittered when enabled.
    pub fn effective_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        if let Some(hint) = retry_after {
            return hint.min(self.max_delay);
        }
        let delay = self.delay_for_attempt(attempt);
        if !self.jitter {
            return delay;
        }
        let half = delay / 2;
        half + half.mul_f64(rand::rng().random::<f64>())
    }
}

/// Run `f` until it succeeds, fails permanently, or uses up
/// `config.max_attempts`.
///
/// Permanent errors (authentication, other 4xx) come back unchanged after a
/// single attempt. Running out of attempts wraps the last transient error
/// in [`HuginnError::ExhaustedRetries`].
pub(crate) async fn with_retry<F, Fut, T>(config: &RetryConfig, provider: &str, f: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        let err = match f().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_transient() => e,
            Err(e) => return Err(e), // permanent error, no retry
        };
        attempt += 1;
        if attempt >= max_attempts {
            return Err(HuginnError::ExhaustedRetries {
                provider: provider.to_owned(),
                attempts: attempt,
                last: Box::new(err),
            });
        }
        metrics::counter!(telemetry::RETRIES_TOTAL, "provider" => provider.to_owned())
            .increment(1);
        let delay = config.effective_delay(attempt - 1, err.retry_after());
        warn!(
            provider,
            attempt,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "retrying after transient error"
        );
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_exponentially_and_caps() {
        let config = RetryConfig::new()
            .initial_delay(Duration::from_secs(1))
            .max_delay(Duration::from_secs(5));
        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(4));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(5));
        assert_eq!(config.delay_for_attempt(40), Duration::from_secs(5));
    }

    #[test]
    fn jitter_stays_within_half_to_full_delay() {
        let config = RetryConfig::new().initial_delay(Duration::from_millis(400));
        for _ in 0..100 {
            let d = config.effective_delay(1, None);
            assert!(d >= Duration::from_millis(400) && d <= Duration::from_millis(800));
        }
    }

    #[test]
    fn retry_after_hint_wins_over_backoff() {
        let config = RetryConfig::new();
        let d = config.effective_delay(0, Some(Duration::from_secs(7)));
        assert_eq!(d, Duration::from_secs(7));
    }

    #[test]
    fn default_policy() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(10), Duration::from_secs(60));
        assert!(config.jitter);
        assert_eq!(
            config.effective_delay(0, Some(Duration::from_secs(600))),
            Duration::from_secs(60)
        );
        for _ in 0..50 {
            let d = config.effective_delay(0, None);
            assert!(d >= Duration::from_secs(1) && d <= Duration::from_secs(2));
        }
    }

    #[test]
    fn disabled_means_one_attempt() {
        assert_eq!(RetryConfig::disabled().max_attempts, 1);
    }
}
