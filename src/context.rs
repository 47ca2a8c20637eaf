//! Process-scoped context shared with every request handler.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::ServiceConfig;
use crate::http::realtime::RealtimeHub;
use crate::http::request::RequestIdGenerator;
use crate::lifecycle::shutdown::ShutdownTrigger;
use crate::net::SharedSecret;
use crate::settings::SettingsStore;

/// Key under which `/version` reports the host itself.
pub const HOST_VERSION_KEY: &str = "host";

/// Everything handlers may read. Cheap to clone.
///
/// Built once after module orchestration; nothing in it is replaced
/// afterwards. The settings store and request counter synchronize
/// internally.
#[derive(Clone)]
pub struct AppContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    config: ServiceConfig,
    secret: SharedSecret,
    versions: BTreeMap<String, String>,
    settings: Arc<SettingsStore>,
    realtime: RealtimeHub,
    request_ids: RequestIdGenerator,
    shutdown: ShutdownTrigger,
}

impl AppContext {
    /// `versions` holds the modules that reached `Loaded`; the host's own
    /// version is added here.
    pub fn new(
        config: ServiceConfig,
        secret: SharedSecret,
        mut versions: BTreeMap<String, String>,
        settings: Arc<SettingsStore>,
        realtime: RealtimeHub,
        shutdown: ShutdownTrigger,
    ) -> Self {
        versions.insert(
            HOST_VERSION_KEY.to_string(),
            env!("CARGO_PKG_VERSION").to_string(),
        );
        Self {
            inner: Arc::new(ContextInner {
                config,
                secret,
                versions,
                settings,
                realtime,
                request_ids: RequestIdGenerator::new(),
                shutdown,
            }),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.inner.config
    }

    pub fn secret(&self) -> &SharedSecret {
        &self.inner.secret
    }

    pub fn versions(&self) -> &BTreeMap<String, String> {
        &self.inner.versions
    }

    pub fn settings(&self) -> &Arc<SettingsStore> {
        &self.inner.settings
    }

    pub fn realtime(&self) -> &RealtimeHub {
        &self.inner.realtime
    }

    pub fn request_ids(&self) -> &RequestIdGenerator {
        &self.inner.request_ids
    }

    pub fn shutdown(&self) -> &ShutdownTrigger {
        &self.inner.shutdown
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("secret", &self.inner.secret)
            .field("versions", &self.inner.versions)
            .finish_non_exhaustive()
    }
}
