//! Startup orchestration.
//!
//! # Responsibilities
//! - Generate the shared secret before anything can be reached
//! - Build the module registry and run the orchestrator
//! - Hand loaded modules to the shutdown coordinator
//! - Bind the listener, publish the run file, start serving
//! - Route any fatal error to diagnostics and a code-1 shutdown
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Modules initialize in order, not concurrently
//! - The listener starts last, after every mandatory module is ready, and
//!   the gatekeeper is part of the router before the socket exists

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::task::{JoinError, JoinHandle};

use crate::config::ServiceConfig;
use crate::context::AppContext;
use crate::error::{ServiceError, EXIT_OK};
use crate::http::{HttpServer, RealtimeHub};
use crate::lifecycle::diagnostics::DiagnosticsReporter;
use crate::lifecycle::orchestrator::{panic_message, Orchestrator};
use crate::lifecycle::shutdown::{ShutdownCoordinator, ShutdownTrigger};
use crate::lifecycle::supervisor::{LogNotifier, ReadinessNotifier, StdoutNotifier};
use crate::modules::builtin::builtin_descriptors;
use crate::modules::external::external_descriptor;
use crate::modules::{LoadOutcome, ModuleDescriptor, ModuleRegistry};
use crate::net::{Binder, Endpoint, ListenerBootstrapper, SharedSecret, TcpBinder};
use crate::settings::SettingsStore;

/// Assembles and starts the service.
pub struct Bootstrap {
    config: ServiceConfig,
    extra_modules: Vec<ModuleDescriptor>,
    notifier: Arc<dyn ReadinessNotifier>,
    binder: Arc<dyn Binder>,
}

impl Bootstrap {
    pub fn new(config: ServiceConfig) -> Self {
        let notifier: Arc<dyn ReadinessNotifier> = if config.supervisor.notify_stdout {
            Arc::new(StdoutNotifier)
        } else {
            Arc::new(LogNotifier)
        };
        Self {
            config,
            extra_modules: Vec::new(),
            notifier,
            binder: Arc::new(TcpBinder),
        }
    }

    /// Register an additional module after the built-in and configured ones.
    pub fn with_module(mut self, descriptor: ModuleDescriptor) -> Self {
        self.extra_modules.push(descriptor);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn ReadinessNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_binder(mut self, binder: Arc<dyn Binder>) -> Self {
        self.binder = binder;
        self
    }

    /// Run every startup step. Each module is handed to `coordinator` as
    /// soon as it loads, so a fatal or interrupted startup still cleans it up.
    pub async fn start(
        self,
        coordinator: &ShutdownCoordinator,
        trigger: ShutdownTrigger,
    ) -> Result<RunningService, ServiceError> {
        let config = self.config;
        tracing::info!(version = env!("CARGO_PKG_VERSION"), "Companion host starting");

        let secret = SharedSecret::generate(config.security.secret_length);
        let settings = Arc::new(SettingsStore::new(
            config.settings_file_path(),
            config.settings.default_language.clone(),
        ));
        let realtime = RealtimeHub::new();

        let mut registry = ModuleRegistry::builder();
        registry.register_all(builtin_descriptors(settings.clone()))?;
        registry.register_all(config.modules.iter().cloned().map(external_descriptor))?;
        registry.register_all(self.extra_modules)?;
        let order = registry.build().resolve_order()?;

        let parts = Orchestrator::new()
            .run_adopting(&order, coordinator)
            .await
            .into_parts();
        if let Some(fatal) = parts.fatal {
            return Err(fatal);
        }

        let ctx = AppContext::new(
            config.clone(),
            secret.clone(),
            parts.versions,
            settings,
            realtime,
            trigger.clone(),
        );
        let server = HttpServer::new(ctx.clone());

        let run_file = config.run_file_path();
        let bound = ListenerBootstrapper::new(config.listener.clone())
            .with_binder(self.binder)
            .publish_to(run_file.clone(), secret)
            .bind()
            .await?;
        coordinator.set_run_file(run_file);

        let server = tokio::spawn(server.run(bound.listener, trigger));
        self.notifier.notify_ready(&bound.endpoint);

        Ok(RunningService {
            endpoint: bound.endpoint,
            outcomes: parts.outcomes,
            ctx,
            server,
        })
    }

    /// Start, serve until shutdown is requested, then shut down.
    ///
    /// Fatal errors are reported and end in a code-1 shutdown. Returns the
    /// exit code handed to the coordinator.
    pub async fn run(self, coordinator: Arc<ShutdownCoordinator>, trigger: ShutdownTrigger) -> i32 {
        let reporter = DiagnosticsReporter::new(self.config.diagnostics.clone());

        let startup = tokio::spawn({
            let coordinator = coordinator.clone();
            let trigger = trigger.clone();
            async move { self.start(&coordinator, trigger).await }
        });
        let abort = startup.abort_handle();

        let outcome = tokio::select! {
            joined = startup => match joined {
                Ok(Ok(service)) => service.wait().await,
                Ok(Err(error)) => Err(error),
                Err(join) => Err(unexpected(join)),
            },
            code = trigger.wait() => {
                tracing::warn!("Shutdown requested during startup");
                abort.abort();
                Ok(code)
            }
        };

        let code = match outcome {
            Ok(code) => code,
            Err(error) => {
                reporter.report(&error).await;
                let code = error.exit_code();
                trigger.trigger(code);
                code
            }
        };

        coordinator.shutdown(code).await;
        code
    }
}

/// A started service.
#[derive(Debug)]
pub struct RunningService {
    endpoint: Endpoint,
    outcomes: BTreeMap<String, LoadOutcome>,
    ctx: AppContext,
    server: JoinHandle<std::io::Result<()>>,
}

impl RunningService {
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.endpoint)
    }

    pub fn outcomes(&self) -> &BTreeMap<String, LoadOutcome> {
        &self.outcomes
    }

    pub fn context(&self) -> &AppContext {
        &self.ctx
    }

    /// Wait for the server to stop. Returns the requested exit code.
    pub async fn wait(self) -> Result<i32, ServiceError> {
        match self.server.await {
            Ok(Ok(())) => Ok(self.ctx.shutdown().requested().unwrap_or(EXIT_OK)),
            Ok(Err(error)) => Err(ServiceError::Server(error)),
            Err(join) => Err(unexpected(join)),
        }
    }
}

fn unexpected(join: JoinError) -> ServiceError {
    match join.try_into_panic() {
        Ok(panic) => ServiceError::Unexpected(format!("panicked: {}", panic_message(panic.as_ref()))),
        Err(join) => ServiceError::Unexpected(join.to_string()),
    }
}
