//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Listener bind:
//!     → net::listener (attempt bind)
//!     → On failure: retries.rs (retryable? budget left?)
//!     → fixed backoff, then the next attempt
//! ```
//!
//! # Design Decisions
//! - Only transport-level bind failures are retried
//! - The budget counts attempts, not elapsed time

pub mod retries;

pub use retries::{is_transport_bind_error, RetryBudget};
