//! Shared utilities for integration and load testing.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::FutureExt;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use companion_host::config::ServiceConfig;
use companion_host::lifecycle::supervisor::ReadinessNotifier;
use companion_host::lifecycle::{Bootstrap, ExitHook, ShutdownCoordinator, ShutdownTrigger};
use companion_host::modules::{FeatureModule, ModuleDescriptor, ModuleError, ModuleFuture, ModulePolicy};
use companion_host::net::{Endpoint, RunFile};

/// How a fake module behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behaviour {
    Ok,
    FailLoad,
    FailInit,
    PanicInit,
    HangInit,
    FailCleanup,
}

/// Ordered record of lifecycle calls: `init:<name>`, `cleanup:<name>`.
pub type EventLog = Arc<Mutex<Vec<String>>>;

struct FakeModule {
    name: String,
    behaviour: Behaviour,
    log: EventLog,
}

impl FeatureModule for FakeModule {
    fn initialize(&mut self) -> ModuleFuture<'_, ()> {
        self.log.lock().unwrap().push(format!("init:{}", self.name));
        let behaviour = self.behaviour;
        async move {
            match behaviour {
                Behaviour::FailInit => Err(ModuleError::failed("device not found")),
                Behaviour::PanicInit => panic!("driver crashed"),
                Behaviour::HangInit => futures_util::future::pending().await,
                _ => Ok(()),
            }
        }
        .boxed()
    }

    fn cleanup(&mut self) -> ModuleFuture<'_, ()> {
        self.log.lock().unwrap().push(format!("cleanup:{}", self.name));
        let behaviour = self.behaviour;
        async move {
            if behaviour == Behaviour::FailCleanup {
                Err(ModuleError::failed("still busy"))
            } else {
                Ok(())
            }
        }
        .boxed()
    }

    fn version(&self) -> String {
        format!("{}-1.0", self.name)
    }
}

/// Sends the endpoint once the service is ready.
struct ChannelNotifier(Mutex<Option<oneshot::Sender<Endpoint>>>);

impl ReadinessNotifier for ChannelNotifier {
    fn notify_ready(&self, endpoint: &Endpoint) {
        if let Some(tx) = self.0.lock().unwrap().take() {
            let _ = tx.send(endpoint.clone());
        }
    }
}

/// A scratch app-data dir, an exit recorder and a shared shutdown trigger.
pub struct Harness {
    pub dir: tempfile::TempDir,
    pub config: ServiceConfig,
    pub log: EventLog,
    pub exits: Arc<Mutex<Vec<i32>>>,
    pub coordinator: Arc<ShutdownCoordinator>,
    pub trigger: ShutdownTrigger,
}

impl Harness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ServiceConfig::default();
        config.listener.host = "127.0.0.1".to_string();
        config.listener.port = 0;
        config.listener.retries = 0;
        config.listener.backoff_ms = 10;
        config.paths.app_data_dir = dir.path().to_path_buf();

        let exits = Arc::new(Mutex::new(Vec::new()));
        let hook: ExitHook = {
            let exits = exits.clone();
            Arc::new(move |code| exits.lock().unwrap().push(code))
        };

        Self {
            dir,
            config,
            log: Arc::new(Mutex::new(Vec::new())),
            exits,
            coordinator: Arc::new(ShutdownCoordinator::new(hook)),
            trigger: ShutdownTrigger::new(),
        }
    }

    pub fn bootstrap(&self) -> Bootstrap {
        Bootstrap::new(self.config.clone())
    }

    pub fn module(&self, name: &str, policy: ModulePolicy, behaviour: Behaviour) -> ModuleDescriptor {
        let log = self.log.clone();
        let name = name.to_string();
        ModuleDescriptor::new(name.clone(), policy, move || {
            let log = log.clone();
            let name = name.clone();
            async move {
                if behaviour == Behaviour::FailLoad {
                    return Err(ModuleError::failed("library missing"));
                }
                Ok(Box::new(FakeModule { name, behaviour, log }) as Box<dyn FeatureModule>)
            }
        })
    }

    pub fn run_file(&self) -> PathBuf {
        self.config.run_file_path()
    }

    pub fn events(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn exit_codes(&self) -> Vec<i32> {
        self.exits.lock().unwrap().clone()
    }

    /// Run the full service lifecycle in the background.
    pub fn spawn(&self, bootstrap: Bootstrap) -> (JoinHandle<i32>, oneshot::Receiver<Endpoint>) {
        let (tx, rx) = oneshot::channel();
        let bootstrap = bootstrap.with_notifier(Arc::new(ChannelNotifier(Mutex::new(Some(tx)))));
        let handle = tokio::spawn(bootstrap.run(self.coordinator.clone(), self.trigger.clone()));
        (handle, rx)
    }

    /// Spawn and wait until the service accepts requests.
    pub async fn start(&self, bootstrap: Bootstrap) -> Running {
        let (handle, ready) = self.spawn(bootstrap);
        let endpoint = tokio::time::timeout(Duration::from_secs(10), ready)
            .await
            .expect("service did not become ready in time")
            .expect("service stopped before becoming ready");
        let run_file = RunFile::read(&self.run_file()).unwrap();
        Running {
            base_url: format!("http://{endpoint}"),
            endpoint,
            secret: run_file.secret,
            handle,
        }
    }

    /// Request shutdown and wait for the lifecycle to finish.
    pub async fn stop(&self, running: Running) -> i32 {
        self.trigger.trigger(0);
        tokio::time::timeout(Duration::from_secs(10), running.handle)
            .await
            .expect("shutdown timed out")
            .unwrap()
    }
}

/// A started service.
pub struct Running {
    pub endpoint: Endpoint,
    pub base_url: String,
    pub secret: String,
    pub handle: JoinHandle<i32>,
}

impl Running {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET with the secret attached.
    pub async fn get(&self, path: &str) -> reqwest::Response {
        reqwest::Client::new()
            .get(self.url(path))
            .header("x-companion-token", &self.secret)
            .send()
            .await
            .unwrap()
    }

    pub fn sdk(&self) -> companion_sdk::CompanionClient {
        companion_sdk::CompanionClient::new(&self.base_url, self.secret.clone()).unwrap()
    }
}
