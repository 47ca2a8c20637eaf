//! Retry logic.
//!
//! # Responsibilities
//! - Classify bind errors as retryable or fatal
//! - Track a bounded number of attempts
//!
//! # Design Decisions
//! - `AddrInUse`, `AddrNotAvailable` and `PermissionDenied` are transport
//!   errors: another process may release the port, the interface may come up
//! - Anything else (bad host, resource exhaustion) fails immediately

use std::io;

/// A fixed attempt budget: one initial try plus `retries` more.
#[derive(Debug, Clone)]
pub struct RetryBudget {
    total: u32,
    used: u32,
}

impl RetryBudget {
    pub fn new(retries: u32) -> Self {
        Self {
            total: retries.saturating_add(1),
            used: 0,
        }
    }

    /// Take one attempt from the budget. Returns false once exhausted.
    pub fn try_consume(&mut self) -> bool {
        if self.used >= self.total {
            return false;
        }
        self.used += 1;
        true
    }

    /// Attempts consumed so far.
    pub fn attempts(&self) -> u32 {
        self.used
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn remaining(&self) -> u32 {
        self.total - self.used
    }
}

/// Whether a bind failure may succeed if retried.
pub fn is_transport_bind_error(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::AddrInUse | io::ErrorKind::AddrNotAvailable | io::ErrorKind::PermissionDenied
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_allows_initial_attempt_plus_retries() {
        let mut budget = RetryBudget::new(2);
        assert_eq!(budget.total(), 3);
        assert!(budget.try_consume());
        assert!(budget.try_consume());
        assert!(budget.try_consume());
        assert!(!budget.try_consume());
        assert_eq!(budget.attempts(), 3);
        assert_eq!(budget.remaining(), 0);
    }

    #[test]
    fn zero_retries_is_a_single_attempt() {
        let mut budget = RetryBudget::new(0);
        assert!(budget.try_consume());
        assert!(!budget.try_consume());
    }

    #[test]
    fn classifies_bind_errors() {
        assert!(is_transport_bind_error(&io::Error::from(io::ErrorKind::AddrInUse)));
        assert!(is_transport_bind_error(&io::Error::from(io::ErrorKind::PermissionDenied)));
        assert!(!is_transport_bind_error(&io::Error::from(io::ErrorKind::InvalidInput)));
        assert!(!is_transport_bind_error(&io::Error::other("too many open files")));
    }
}
