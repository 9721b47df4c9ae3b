//! Caller-owned cancellation signal with an optional deadline.
//!
//! Clones share the same flag, so a request handler can keep one copy and
//! hand another to the pipeline. The pipeline polls it between stages.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    /// Token that only cancels when `cancel()` is called.
    pub fn new() -> Self {
        Self::default()
    }

    /// Token that also expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed) || self.is_expired()
    }

    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Time left before the deadline. `None` when the token has no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_token_is_live() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert!(token.remaining().is_none());
    }

    #[test]
    fn cancel_is_shared_between_clones() {
        let token = CancelToken::new();
        let handed_out = token.clone();
        token.cancel();
        assert!(handed_out.is_cancelled());
    }

    #[test]
    fn zero_timeout_is_expired() {
        let token = CancelToken::with_timeout(Duration::ZERO);
        assert!(token.is_expired());
        assert!(token.is_cancelled());
        assert_eq!(token.remaining(), Some(Duration::ZERO));
    }

    #[test]
    fn long_timeout_has_budget_left() {
        let token = CancelToken::with_timeout(Duration::from_secs(60));
        assert!(!token.is_cancelled());
        assert!(token.remaining().unwrap() > Duration::from_secs(30));
    }
}
