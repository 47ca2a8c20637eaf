//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Secret → Registry (resolve order) → orchestrator.rs (load → init)
//!     → Bind listener + run file → Serve → supervisor.rs (READY)
//!
//! Shutdown (shutdown.rs):
//!     signals.rs / stdin close / fatal error → ShutdownTrigger
//!     → stop accepting, drain → cleanup modules (reverse) → remove run
//!       file → flush logs → exit
//!
//! Fatal errors (diagnostics.rs):
//!     log + crash file + upload → shutdown(1)
//! ```
//!
//! # Design Decisions
//! - Ordered startup: secret first, then modules, then the listener
//! - Ordered shutdown: stop accept, drain, clean up in reverse
//! - One idempotent teardown path, whatever raised the request

pub mod diagnostics;
pub mod orchestrator;
pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod supervisor;

pub use orchestrator::{LoadedModule, Orchestrator, RunReport};
pub use shutdown::{ExitHook, ShutdownCoordinator, ShutdownTrigger};
pub use startup::{Bootstrap, RunningService};
