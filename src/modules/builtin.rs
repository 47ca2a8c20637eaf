//! Feature modules compiled into the host.

use std::sync::Arc;

use futures_util::FutureExt;

use crate::modules::contract::{FeatureModule, ModuleError, ModuleFuture};
use crate::modules::descriptor::ModuleDescriptor;
use crate::settings::SettingsStore;

/// Name of the built-in settings module.
pub const SETTINGS_MODULE: &str = "settings";

/// Descriptors for the built-in modules, in declaration order.
pub fn builtin_descriptors(settings: Arc<SettingsStore>) -> Vec<ModuleDescriptor> {
    vec![settings_descriptor(settings)]
}

/// The mandatory settings module: loads persisted settings from disk.
pub fn settings_descriptor(store: Arc<SettingsStore>) -> ModuleDescriptor {
    ModuleDescriptor::mandatory(SETTINGS_MODULE, move || {
        let store = store.clone();
        async move {
            store
                .load()
                .map_err(|e| ModuleError::failed(e.to_string()))?;
            Ok(Box::new(SettingsModule { store }) as Box<dyn FeatureModule>)
        }
    })
}

struct SettingsModule {
    store: Arc<SettingsStore>,
}

impl FeatureModule for SettingsModule {
    fn initialize(&mut self) -> ModuleFuture<'_, ()> {
        async move {
            if let Some(parent) = self.store.path().parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            Ok(())
        }
        .boxed()
    }

    fn cleanup(&mut self) -> ModuleFuture<'_, ()> {
        async move {
            self.store
                .persist()
                .await
                .map_err(|e| ModuleError::failed(e.to_string()))
        }
        .boxed()
    }

    fn version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }
}
