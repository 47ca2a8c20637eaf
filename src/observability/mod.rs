//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events on stderr)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Supervisor log capture (stderr; stdout is reserved for READY lines)
//!     → Metrics endpoint (Prometheus scrape, opt-in)
//! ```
//!
//! # Design Decisions
//! - Every log line that concerns a module carries `module`, `kind` and
//!   `reason` fields
//! - Request IDs flow through the gatekeeper into every request log line
//! - Metric updates are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
