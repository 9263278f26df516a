//! Retry engine: exponential backoff with jitter, `Retry-After` overrides,
//! and cooperative cancellation of the sleep between attempts.

use std::time::Duration;

use rand::Rng;

use crate::cancel::CancelToken;
use crate::config::RetryConfig;
use crate::error::HttpcError;

/// Decides whether another attempt should be made and how long to wait
/// before making it.
#[derive(Debug, Clone)]
pub struct RetryEngine {
    config: RetryConfig,
}

impl RetryEngine {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn max_attempts(&self) -> usize {
        self.config.max_attempts
    }

    /// Whether `attempt` (0-indexed) should be retried given `error`.
    pub fn should_retry(&self, attempt: usize, error: &HttpcError) -> bool {
        attempt + 1 < self.config.max_attempts && error.is_retryable()
    }

    /// The exponential-backoff delay for `attempt` (0-indexed), before any
    /// `Retry-After` override or jitter is applied.
    pub fn base_backoff(&self, attempt: usize) -> Duration {
        let factor = self.config.backoff_factor.powi(attempt as i32);
        let millis = (self.config.base_delay.as_millis() as f64 * factor).min(
            self.config.max_delay.as_millis() as f64,
        );
        Duration::from_millis(millis as u64)
    }

    /// Final delay to sleep before the next attempt: `retry_after`, when
    /// present and valid, overrides the exponential backoff entirely (no
    /// jitter is applied on top of a server-specified delay). Otherwise,
    /// the exponential backoff is used, with up to ±10% jitter if enabled.
    pub fn delay_for(&self, attempt: usize, retry_after: Option<Duration>) -> Duration {
        if let Some(d) = retry_after {
            return d;
        }
        let base = self.base_backoff(attempt);
        if !self.config.jitter {
            return base;
        }
        jittered(base)
    }

    /// Sleep for `delay`, honoring cancellation. Returns `Err` if the
    /// token is canceled before the delay elapses.
    pub async fn sleep(&self, delay: Duration, cancel: &CancelToken) -> Result<(), HttpcError> {
        cancel.race_sleep(delay).await
    }
}

fn jittered(base: Duration) -> Duration {
    let millis = base.as_millis() as f64;
    let jitter_range = millis * 0.10;
    let offset = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
    let jittered_millis = (millis + offset).max(0.0);
    Duration::from_millis(jittered_millis as u64)
}

/// Parse a `Retry-After` header value: either an integer number of
/// seconds, or an RFC 1123 HTTP-date. Only a *positive* yielded value is
/// an override, per spec ("if yielded value is positive, use it") — a
/// date in the past, or an explicit `0`, yields `None`, falling back to
/// the exponential-backoff formula instead of retrying instantly.
pub fn parse_retry_after(value: &str, now: std::time::SystemTime) -> Option<Duration> {
    let trimmed = value.trim();
    if let Ok(secs) = trimmed.parse::<u64>() {
        return if secs > 0 { Some(Duration::from_secs(secs)) } else { None };
    }
    let when = httpdate::parse_http_date(trimmed).ok()?;
    let delay = when.duration_since(now).ok()?;
    if delay.is_zero() { None } else { Some(delay) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    fn engine(max_attempts: usize) -> RetryEngine {
        let mut cfg = RetryConfig::default();
        cfg.max_attempts = max_attempts;
        cfg.jitter = false;
        RetryEngine::new(cfg)
    }

    #[test]
    fn should_retry_respects_max_attempts() {
        let eng = engine(3);
        let retryable = HttpcError::new(crate::error::ErrorKind::Network, "boom");
        assert!(eng.should_retry(0, &retryable));
        assert!(eng.should_retry(1, &retryable));
        assert!(!eng.should_retry(2, &retryable));
    }

    #[test]
    fn should_retry_respects_error_kind() {
        let eng = engine(5);
        let non_retryable = HttpcError::validation("bad url");
        assert!(!eng.should_retry(0, &non_retryable));
    }

    #[test]
    fn base_backoff_grows_exponentially_and_caps() {
        let eng = engine(10);
        let d0 = eng.base_backoff(0);
        let d1 = eng.base_backoff(1);
        let d2 = eng.base_backoff(2);
        assert_eq!(d0, Duration::from_millis(200));
        assert_eq!(d1, Duration::from_millis(400));
        assert_eq!(d2, Duration::from_millis(800));

        let d_huge = eng.base_backoff(20);
        assert_eq!(d_huge, eng.config.max_delay);
    }

    #[test]
    fn retry_after_overrides_backoff_without_jitter() {
        let eng = engine(5);
        let delay = eng.delay_for(0, Some(Duration::from_secs(7)));
        assert_eq!(delay, Duration::from_secs(7));
    }

    #[test]
    fn parse_retry_after_integer_seconds() {
        let now = SystemTime::now();
        assert_eq!(parse_retry_after("120", now), Some(Duration::from_secs(120)));
    }

    #[test]
    fn parse_retry_after_past_http_date_yields_none() {
        let now = SystemTime::now();
        assert_eq!(parse_retry_after("Sun, 06 Nov 1994 08:49:37 GMT", now), None);
    }

    #[test]
    fn parse_retry_after_garbage_yields_none() {
        let now = SystemTime::now();
        assert_eq!(parse_retry_after("not-a-value", now), None);
    }

    #[test]
    fn parse_retry_after_zero_seconds_yields_none() {
        let now = SystemTime::now();
        assert_eq!(parse_retry_after("0", now), None);
    }

    #[test]
    fn delay_for_falls_back_to_backoff_when_retry_after_is_zero() {
        let eng = engine(5);
        let delay = eng.delay_for(0, parse_retry_after("0", SystemTime::now()));
        assert_eq!(delay, eng.base_backoff(0));
    }
}
