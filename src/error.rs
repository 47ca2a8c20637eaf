//! Process-level error taxonomy.
//!
//! Every variant here is fatal: it converges on the top-level handler,
//! which reports diagnostics and shuts down with exit code 1. Recoverable
//! failures live elsewhere ([`crate::modules::LoadOutcome`] for optional
//! modules, [`crate::http::ApiError`] for requests).

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

/// Exit code for a normal shutdown.
pub const EXIT_OK: i32 = 0;
/// Exit code for an unhandled fatal error.
pub const EXIT_FATAL: i32 = 1;

/// Fatal errors surfaced while starting or running the service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A mandatory module could not be loaded, initialized, or was skipped.
    #[error("mandatory module `{module}` failed: {reason}")]
    MandatoryModuleFailure { module: String, reason: String },

    /// The module dependency graph has no valid order.
    #[error("cyclic module dependency between: {}", .modules.join(", "))]
    CyclicDependency { modules: Vec<String> },

    /// A module names a dependency that was never registered.
    #[error("module `{module}` depends on unregistered module `{dependency}`")]
    UnknownDependency { module: String, dependency: String },

    /// Two descriptors share a name.
    #[error("module `{0}` is registered more than once")]
    DuplicateModule(String),

    /// A descriptor uses a name the host reports under itself.
    #[error("module name `{0}` is reserved")]
    ReservedModuleName(String),

    /// The listener could not be bound within the retry budget.
    #[error("failed to listen on {addr} after {attempts} attempts: {source}")]
    ListenExhausted {
        addr: String,
        attempts: u32,
        #[source]
        source: io::Error,
    },

    /// A listener error that is not a plain bind failure.
    #[error("listener error on {addr}: {source}")]
    Listen {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// The run file could not be written.
    #[error("failed to write run file {}: {source}", .path.display())]
    RunFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The HTTP server stopped with an I/O error.
    #[error("server error: {0}")]
    Server(#[source] io::Error),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A panic or other unexpected failure of the startup sequence.
    #[error("unexpected failure: {0}")]
    Unexpected(String),
}

impl ServiceError {
    /// Exit code the process terminates with for this error.
    pub fn exit_code(&self) -> i32 {
        EXIT_FATAL
    }
}
