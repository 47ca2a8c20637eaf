//! Module lifecycle orchestration.
//!
//! # Responsibilities
//! - Drive each module through load → initialize in resolved order
//! - Skip modules whose dependencies are not loaded
//! - Isolate failures (errors and panics) per module
//! - Abort on the first mandatory failure
//! - Report every outcome through structured logs and metrics
//!
//! # Design Decisions
//! - Strictly sequential: one orchestration step at a time
//! - No init timeout; a hanging module stalls startup
//! - Handles that loaded but failed to initialize are kept for cleanup
//! - With [`Orchestrator::run_adopting`] a handle belongs to the shutdown
//!   coordinator from the moment it loads, so an interrupted startup still
//!   cleans it up

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::sync::Mutex;

use crate::error::ServiceError;
use crate::lifecycle::shutdown::ShutdownCoordinator;
use crate::modules::{FeatureModule, LoadOutcome, ModuleDescriptor, ModuleFuture, ModulePolicy};
use crate::observability::metrics;

const ABORTED: &str = "startup aborted";

/// A module handle that was successfully loaded.
///
/// Clones share the same handle; a lifecycle step holds its lock for as
/// long as it runs.
#[derive(Clone)]
pub struct LoadedModule {
    name: Arc<str>,
    policy: ModulePolicy,
    initialized: Arc<AtomicBool>,
    handle: Arc<Mutex<Box<dyn FeatureModule>>>,
}

impl LoadedModule {
    fn new(name: &str, policy: ModulePolicy, handle: Box<dyn FeatureModule>) -> Self {
        Self {
            name: name.into(),
            policy,
            initialized: Arc::new(AtomicBool::new(false)),
            handle: Arc::new(Mutex::new(handle)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> ModulePolicy {
        self.policy
    }

    /// Whether `initialize()` succeeded.
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    async fn initialize(&self) -> Result<String, String> {
        let mut handle = self.handle.lock().await;
        guarded(handle.initialize()).await?;
        self.initialized.store(true, Ordering::SeqCst);
        Ok(handle.version())
    }

    /// Run `cleanup()`, waiting for any step still holding the handle.
    pub(crate) async fn cleanup(&self) -> Result<(), String> {
        let mut handle = self.handle.lock().await;
        guarded(handle.cleanup()).await
    }
}

impl std::fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModule")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}

/// Everything the orchestrator produced in one run.
#[derive(Debug, Default)]
pub struct RunReport {
    outcomes: BTreeMap<String, LoadOutcome>,
    versions: BTreeMap<String, String>,
    modules: Vec<LoadedModule>,
    fatal: Option<ServiceError>,
}

impl RunReport {
    pub fn outcome(&self, name: &str) -> Option<&LoadOutcome> {
        self.outcomes.get(name)
    }

    pub fn outcomes(&self) -> &BTreeMap<String, LoadOutcome> {
        &self.outcomes
    }

    /// Versions of the modules that reached `Loaded`.
    pub fn versions(&self) -> &BTreeMap<String, String> {
        &self.versions
    }

    /// Live handles, in load order.
    pub fn modules(&self) -> &[LoadedModule] {
        &self.modules
    }

    pub fn is_fatal(&self) -> bool {
        self.fatal.is_some()
    }

    pub fn into_parts(self) -> RunParts {
        RunParts {
            outcomes: self.outcomes,
            versions: self.versions,
            modules: self.modules,
            fatal: self.fatal,
        }
    }
}

/// Owned pieces of a [`RunReport`].
#[derive(Debug)]
pub struct RunParts {
    pub outcomes: BTreeMap<String, LoadOutcome>,
    pub versions: BTreeMap<String, String>,
    pub modules: Vec<LoadedModule>,
    pub fatal: Option<ServiceError>,
}

/// Drives feature modules through their startup lifecycle.
#[derive(Debug, Default)]
pub struct Orchestrator;

impl Orchestrator {
    pub fn new() -> Self {
        Self
    }

    /// Load and initialize `order`, which must already be dependency-sorted.
    pub async fn run(&self, order: &[ModuleDescriptor]) -> RunReport {
        self.drive(order, None).await
    }

    /// Like [`Orchestrator::run`], but every handle is adopted by
    /// `coordinator` the moment its load succeeds, before `initialize()`.
    ///
    /// Dropping this future part way through leaves everything loaded so
    /// far with the coordinator, so a shutdown still cleans it up.
    pub async fn run_adopting(
        &self,
        order: &[ModuleDescriptor],
        coordinator: &ShutdownCoordinator,
    ) -> RunReport {
        self.drive(order, Some(coordinator)).await
    }

    async fn drive(
        &self,
        order: &[ModuleDescriptor],
        coordinator: Option<&ShutdownCoordinator>,
    ) -> RunReport {
        let mut report = RunReport::default();

        tracing::info!(modules = order.len(), "Starting feature modules");

        for (position, descriptor) in order.iter().enumerate() {
            let name = descriptor.name();
            let policy = descriptor.policy();

            if let Some(missing) = descriptor
                .dependencies()
                .iter()
                .find(|dep| !report.outcomes.get(*dep).is_some_and(LoadOutcome::is_loaded))
            {
                let reason = format!("dependency `{missing}` is not loaded");
                record(&mut report, name, policy, LoadOutcome::Skipped(reason.clone()));
                if policy.is_mandatory() {
                    abort(&mut report, name, reason, &order[position + 1..]);
                    break;
                }
                continue;
            }

            tracing::debug!(module = %name, %policy, "Loading module");
            let handle = match guarded(descriptor.load()).await {
                Ok(handle) => handle,
                Err(reason) => {
                    record(&mut report, name, policy, LoadOutcome::LoadFailed(reason.clone()));
                    if policy.is_mandatory() {
                        abort(&mut report, name, reason, &order[position + 1..]);
                        break;
                    }
                    continue;
                }
            };

            let module = LoadedModule::new(name, policy, handle);
            if let Some(coordinator) = coordinator {
                coordinator.adopt([module.clone()]).await;
            }
            report.modules.push(module.clone());

            match module.initialize().await {
                Ok(version) => {
                    report.versions.insert(name.to_string(), version);
                    record(&mut report, name, policy, LoadOutcome::Loaded);
                }
                Err(reason) => {
                    record(&mut report, name, policy, LoadOutcome::InitFailed(reason.clone()));
                    if policy.is_mandatory() {
                        abort(&mut report, name, reason, &order[position + 1..]);
                        break;
                    }
                }
            }
        }

        let loaded = report.outcomes.values().filter(|o| o.is_loaded()).count();
        tracing::info!(
            loaded,
            total = order.len(),
            fatal = report.is_fatal(),
            "Feature module startup finished"
        );
        report
    }
}

/// Run one lifecycle step inside an error boundary.
pub(crate) async fn guarded<T>(step: ModuleFuture<'_, T>) -> Result<T, String> {
    match AssertUnwindSafe(step).catch_unwind().await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(error.to_string()),
        Err(panic) => Err(format!("panicked: {}", panic_message(panic.as_ref()))),
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn record(report: &mut RunReport, name: &str, policy: ModulePolicy, outcome: LoadOutcome) {
    match &outcome {
        LoadOutcome::Loaded => {
            tracing::info!(module = %name, kind = outcome.kind(), %policy, "Module ready");
        }
        failed if policy.is_mandatory() => {
            tracing::error!(
                module = %name,
                kind = failed.kind(),
                %policy,
                reason = failed.reason().unwrap_or_default(),
                "Mandatory module unavailable"
            );
        }
        failed => {
            tracing::warn!(
                module = %name,
                kind = failed.kind(),
                %policy,
                reason = failed.reason().unwrap_or_default(),
                "Optional module unavailable"
            );
        }
    }
    metrics::record_module_outcome(outcome.kind());
    report.outcomes.insert(name.to_string(), outcome);
}

fn abort(report: &mut RunReport, name: &str, reason: String, remaining: &[ModuleDescriptor]) {
    for descriptor in remaining {
        record(
            report,
            descriptor.name(),
            descriptor.policy(),
            LoadOutcome::Skipped(ABORTED.to_string()),
        );
    }
    report.fatal = Some(ServiceError::MandatoryModuleFailure {
        module: name.to_string(),
        reason,
    });
}
