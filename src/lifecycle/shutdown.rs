//! Shutdown coordination.
//!
//! # Responsibilities
//! - Carry the first shutdown request (and its exit code) to every task
//! - Run module cleanup exactly once, in reverse load order
//! - Remove the run file and flush logs before exiting
//!
//! # Design Decisions
//! - [`ShutdownTrigger`] is a watch channel: late subscribers still see
//!   the request, and the first exit code wins
//! - [`ShutdownCoordinator::shutdown`] is idempotent; concurrent callers
//!   after the first return immediately
//! - A failing or panicking cleanup is logged and never stops the others

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};

use tokio::sync::{watch, Mutex};

use crate::error::EXIT_OK;
use crate::lifecycle::orchestrator::LoadedModule;
use crate::net::RunFile;
use crate::observability::logging;

/// Terminates the process. Replaced by a recorder in tests.
pub type ExitHook = Arc<dyn Fn(i32) + Send + Sync>;

/// Broadcasts a shutdown request to every long-running task.
#[derive(Clone)]
pub struct ShutdownTrigger {
    tx: Arc<watch::Sender<Option<i32>>>,
}

impl ShutdownTrigger {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Request shutdown with `code`. Returns false if one was already requested.
    pub fn trigger(&self, code: i32) -> bool {
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(code);
            true
        })
    }

    /// The exit code of the pending request, if any.
    pub fn requested(&self) -> Option<i32> {
        *self.tx.borrow()
    }

    /// Resolve once shutdown has been requested, yielding its exit code.
    pub async fn wait(&self) -> i32 {
        let mut rx = self.tx.subscribe();
        let code = match rx.wait_for(Option::is_some).await {
            Ok(code) => code.unwrap_or(EXIT_OK),
            // The sender lives in `self`, so it cannot be dropped while we wait.
            Err(_) => EXIT_OK,
        };
        code
    }
}

impl Default for ShutdownTrigger {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ShutdownTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownTrigger")
            .field("requested", &self.requested())
            .finish()
    }
}

/// Owns everything that must be released before the process exits.
pub struct ShutdownCoordinator {
    started: AtomicBool,
    modules: Mutex<Vec<LoadedModule>>,
    run_file: std::sync::Mutex<Option<PathBuf>>,
    exit: ExitHook,
}

impl ShutdownCoordinator {
    pub fn new(exit: ExitHook) -> Self {
        Self {
            started: AtomicBool::new(false),
            modules: Mutex::new(Vec::new()),
            run_file: std::sync::Mutex::new(None),
            exit,
        }
    }

    /// A coordinator that ends the process with `std::process::exit`.
    pub fn with_process_exit() -> Self {
        Self::new(Arc::new(|code| std::process::exit(code)))
    }

    /// Take ownership of loaded modules, appending them in load order.
    pub async fn adopt(&self, modules: impl IntoIterator<Item = LoadedModule>) {
        self.modules.lock().await.extend(modules);
    }

    /// Remove this run file during shutdown.
    pub fn set_run_file(&self, path: PathBuf) {
        *self.run_file.lock().unwrap_or_else(PoisonError::into_inner) = Some(path);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Release everything and exit with `code`.
    ///
    /// Returns false without doing anything if shutdown already started.
    pub async fn shutdown(&self, code: i32) -> bool {
        if self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!(code, "Shutdown already in progress");
            return false;
        }

        tracing::info!(code, "Shutting down");

        let mut modules = std::mem::take(&mut *self.modules.lock().await);
        while let Some(module) = modules.pop() {
            match module.cleanup().await {
                Ok(()) => tracing::debug!(module = %module.name(), "Module cleaned up"),
                Err(reason) => tracing::warn!(
                    module = %module.name(),
                    kind = "cleanup_failed",
                    reason = %reason,
                    "Module cleanup failed"
                ),
            }
        }

        let run_file = self
            .run_file
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(path) = run_file {
            if let Err(error) = RunFile::remove(&path) {
                tracing::warn!(path = %path.display(), error = %error, "Failed to remove run file");
            }
        }

        tracing::info!(code, "Shutdown complete");
        logging::flush();
        (self.exit)(code);
        true
    }
}

impl std::fmt::Debug for ShutdownCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownCoordinator")
            .field("started", &self.is_shutting_down())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::orchestrator::Orchestrator;
    use crate::modules::{FeatureModule, ModuleDescriptor, ModuleError, ModuleFuture};
    use futures_util::FutureExt;
    use std::sync::atomic::AtomicI32;

    struct Recorder {
        name: &'static str,
        log: Arc<std::sync::Mutex<Vec<&'static str>>>,
        fail: bool,
    }

    impl FeatureModule for Recorder {
        fn initialize(&mut self) -> ModuleFuture<'_, ()> {
            async { Ok(()) }.boxed()
        }

        fn cleanup(&mut self) -> ModuleFuture<'_, ()> {
            self.log.lock().unwrap().push(self.name);
            let fail = self.fail;
            async move {
                if fail {
                    Err(ModuleError::failed("device busy"))
                } else {
                    Ok(())
                }
            }
            .boxed()
        }

        fn version(&self) -> String {
            "1".to_string()
        }
    }

    fn recorder(
        name: &'static str,
        fail: bool,
        log: &Arc<std::sync::Mutex<Vec<&'static str>>>,
    ) -> ModuleDescriptor {
        let log = log.clone();
        ModuleDescriptor::optional(name, move || {
            let log = log.clone();
            async move { Ok(Box::new(Recorder { name, log, fail }) as Box<dyn FeatureModule>) }
        })
    }

    fn exit_recorder() -> (ExitHook, Arc<AtomicI32>, Arc<AtomicI32>) {
        let calls = Arc::new(AtomicI32::new(0));
        let code = Arc::new(AtomicI32::new(-1));
        let hook: ExitHook = {
            let calls = calls.clone();
            let code = code.clone();
            Arc::new(move |c| {
                calls.fetch_add(1, Ordering::SeqCst);
                code.store(c, Ordering::SeqCst);
            })
        };
        (hook, calls, code)
    }

    #[tokio::test]
    async fn first_trigger_wins() {
        let trigger = ShutdownTrigger::new();
        assert_eq!(trigger.requested(), None);
        assert!(trigger.trigger(1));
        assert!(!trigger.trigger(0));
        assert_eq!(trigger.requested(), Some(1));
        assert_eq!(trigger.clone().wait().await, 1);
    }

    #[tokio::test]
    async fn wait_resolves_after_trigger() {
        let trigger = ShutdownTrigger::new();
        let waiter = tokio::spawn({
            let trigger = trigger.clone();
            async move { trigger.wait().await }
        });
        tokio::task::yield_now().await;
        trigger.trigger(0);
        assert_eq!(waiter.await.unwrap(), 0);
    }

    #[tokio::test]
    async fn cleans_up_in_reverse_order_despite_failures() {
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let order = vec![
            recorder("a", false, &log),
            recorder("b", true, &log),
            recorder("c", false, &log),
        ];
        let parts = Orchestrator::new().run(&order).await.into_parts();

        let dir = tempfile::tempdir().unwrap();
        let run_file = dir.path().join("companion.json");
        RunFile::new(1, "x").write(&run_file).unwrap();

        let (hook, calls, code) = exit_recorder();
        let coordinator = ShutdownCoordinator::new(hook);
        coordinator.adopt(parts.modules).await;
        coordinator.set_run_file(run_file.clone());

        assert!(coordinator.shutdown(0).await);
        assert_eq!(*log.lock().unwrap(), vec!["c", "b", "a"]);
        assert!(!run_file.exists());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(code.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn concurrent_shutdowns_run_once() {
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let parts = Orchestrator::new()
            .run(&[recorder("only", false, &log)])
            .await
            .into_parts();

        let (hook, calls, code) = exit_recorder();
        let coordinator = Arc::new(ShutdownCoordinator::new(hook));
        coordinator.adopt(parts.modules).await;

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let coordinator = coordinator.clone();
                tokio::spawn(async move { coordinator.shutdown(i % 2).await })
            })
            .collect();

        let mut ran = 0;
        for handle in handles {
            if handle.await.unwrap() {
                ran += 1;
            }
        }

        assert_eq!(ran, 1);
        assert!(coordinator.is_shutting_down());
        assert_eq!(*log.lock().unwrap(), vec!["only"]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(code.load(Ordering::SeqCst), 0 | 1));
    }
}
