//! Request correlation.
//!
//! # Responsibilities
//! - Hand out a monotonically increasing ID to every accepted request
//! - Make the ID available to handlers and echo it as `x-request-id`
//!
//! # Design Decisions
//! - IDs are assigned only after the gatekeeper accepts a request, so
//!   rejected requests do not consume them
//! - The counter lives in the process context, not in a global

use std::sync::atomic::{AtomicU64, Ordering};

/// Response header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Identifier of one accepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(u64);

impl RequestId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Source of [`RequestId`]s. Starts at 1.
#[derive(Debug)]
pub struct RequestIdGenerator {
    next: AtomicU64,
}

impl RequestIdGenerator {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    pub fn next_id(&self) -> RequestId {
        // Relaxed is enough: only uniqueness and per-thread monotonicity matter.
        RequestId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for RequestIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
