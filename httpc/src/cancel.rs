//! Cooperative cancellation, wrapping `tokio_util`'s cancellation token
//! with an optional deadline.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::error::HttpcError;

/// A cancel signal plus an optional absolute deadline. Cloning shares the
/// same underlying token — cancelling any clone cancels them all.
#[derive(Debug, Clone)]
pub struct CancelToken {
    inner: Arc<CancellationToken>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CancellationToken::new()),
            deadline: None,
        }
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            inner: Arc::new(CancellationToken::new()),
            deadline: Some(deadline),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn child(&self) -> Self {
        Self {
            inner: Arc::new(self.inner.child_token()),
            deadline: self.deadline,
        }
    }

    /// Returns a clone of this token with `deadline` applied, used when a
    /// caller-supplied token has no deadline of its own and a request or
    /// config timeout should install one. Shares the same underlying
    /// cancellation signal — canceling either cancels both.
    pub fn with_added_deadline(&self, deadline: Instant) -> Self {
        Self {
            inner: self.inner.clone(),
            deadline: Some(deadline),
        }
    }

    pub fn cancel(&self) {
        self.inner.cancel();
    }

    pub fn is_canceled(&self) -> bool {
        self.inner.is_cancelled()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Resolves when this token is canceled. Never resolves on its own
    /// from the deadline alone — callers race this against a deadline
    /// sleep separately (see [`Self::race_sleep`]).
    pub async fn cancelled(&self) {
        self.inner.cancelled().await
    }

    /// Time remaining until the deadline, or `None` if there is none.
    /// Returns `Some(Duration::ZERO)` if the deadline has already passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Sleep for `duration`, racing it against cancellation and the
    /// deadline (whichever comes first). Returns `Err(ContextCanceled)`
    /// if the wait was cut short.
    pub async fn race_sleep(&self, duration: Duration) -> Result<(), HttpcError> {
        let capped = match self.remaining() {
            Some(remaining) => duration.min(remaining),
            None => duration,
        };
        tokio::select! {
            _ = tokio::time::sleep(capped) => {
                if self.is_canceled() {
                    Err(HttpcError::canceled(0))
                } else if self.remaining() == Some(Duration::ZERO) && capped < duration {
                    Err(HttpcError::new(crate::error::ErrorKind::Timeout, "deadline exceeded"))
                } else {
                    Ok(())
                }
            }
            _ = self.inner.cancelled() => Err(HttpcError::canceled(0)),
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn race_sleep_completes_normally() {
        let token = CancelToken::new();
        let result = token.race_sleep(Duration::from_millis(1)).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn race_sleep_returns_err_when_canceled() {
        let token = CancelToken::new();
        let clone = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1)).await;
            clone.cancel();
        });
        let result = token.race_sleep(Duration::from_secs(5)).await;
        assert!(result.is_err());
    }

    #[test]
    fn remaining_is_none_without_deadline() {
        let token = CancelToken::new();
        assert!(token.remaining().is_none());
    }

    #[test]
    fn remaining_tracks_deadline() {
        let token = CancelToken::with_timeout(Duration::from_secs(10));
        let remaining = token.remaining().unwrap();
        assert!(remaining <= Duration::from_secs(10));
        assert!(remaining > Duration::from_secs(5));
    }

    #[test]
    fn child_token_shares_parent_cancellation() {
        let parent = CancelToken::new();
        let child = parent.child();
        assert!(!child.is_canceled());
        parent.cancel();
        assert!(child.is_canceled());
    }
}
