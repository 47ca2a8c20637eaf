//! The feature module contract.
//!
//! Every feature module, built-in or external, is driven through the same
//! lifecycle by the orchestrator:
//!
//! 1. the descriptor's load function produces a live handle
//! 2. `initialize()` brings the feature up (may wait on I/O)
//! 3. `version()` is published to `/version` once initialized
//! 4. `cleanup()` tears it down during shutdown

use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;

use futures_util::future::BoxFuture;
use thiserror::Error;

/// Boxed future returned by module lifecycle hooks.
pub type ModuleFuture<'a, T> = BoxFuture<'a, Result<T, ModuleError>>;

/// Errors a module can report from `load`, `initialize` or `cleanup`.
#[derive(Debug, Error)]
pub enum ModuleError {
    /// Free-form failure reason.
    #[error("{0}")]
    Failed(String),

    /// I/O failure while loading or running the module.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// The module binary does not match its expected digest.
    #[error("integrity check failed for {}: expected sha256 {expected}, found {actual}", .path.display())]
    Integrity {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// The module process exited before its startup grace period elapsed.
    #[error("module process exited during startup ({0})")]
    EarlyExit(ExitStatus),
}

impl ModuleError {
    /// Shorthand for [`ModuleError::Failed`].
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }
}

/// Whether a module's failure aborts startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModulePolicy {
    /// Failure aborts the whole service.
    Mandatory,
    /// Failure only disables this capability.
    Optional,
}

impl ModulePolicy {
    pub fn is_mandatory(self) -> bool {
        matches!(self, Self::Mandatory)
    }
}

impl std::fmt::Display for ModulePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mandatory => write!(f, "mandatory"),
            Self::Optional => write!(f, "optional"),
        }
    }
}

/// A live feature module returned by a successful load.
pub trait FeatureModule: Send + Sync {
    /// Bring the feature up. Called at most once, after all dependencies are loaded.
    fn initialize(&mut self) -> ModuleFuture<'_, ()>;

    /// Release resources. Called once during shutdown, in reverse load order.
    fn cleanup(&mut self) -> ModuleFuture<'_, ()>;

    /// Version string reported by `/version`.
    fn version(&self) -> String;
}
