//! External feature modules.
//!
//! # Responsibilities
//! - Verify the authenticity of a module executable (SHA-256 digest)
//! - Start it as a supervised child process
//! - Stop and reap it during shutdown
//!
//! # Design Decisions
//! - Verification happens in `load`, so a tampered binary is `LoadFailed`
//!   and never executed
//! - A process that exits within its startup grace period is `InitFailed`
//! - Children are killed on drop as a last resort if cleanup never runs

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use sha2::{Digest, Sha256};
use tokio::process::{Child, Command};

use crate::config::ExternalModuleConfig;
use crate::modules::contract::{FeatureModule, ModuleError, ModuleFuture, ModulePolicy};
use crate::modules::descriptor::ModuleDescriptor;

/// Build a descriptor for a configured external module.
pub fn external_descriptor(config: ExternalModuleConfig) -> ModuleDescriptor {
    let policy = if config.optional {
        ModulePolicy::Optional
    } else {
        ModulePolicy::Mandatory
    };
    let name = config.name.clone();
    let dependencies = config.depends_on.clone();
    let config = Arc::new(config);

    ModuleDescriptor::new(name, policy, move || {
        let config = config.clone();
        async move {
            verify_binary(&config.path, &config.sha256).await?;
            Ok(Box::new(ExternalModule {
                config,
                child: None,
            }) as Box<dyn FeatureModule>)
        }
    })
    .depends_on(dependencies)
}

/// Check that the file at `path` hashes to `expected` (hex, any case).
pub async fn verify_binary(path: &Path, expected: &str) -> Result<(), ModuleError> {
    let bytes = tokio::fs::read(path).await?;
    let actual = sha256_hex(&bytes);
    if actual.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(ModuleError::Integrity {
            path: path.to_path_buf(),
            expected: expected.to_ascii_lowercase(),
            actual,
        })
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

struct ExternalModule {
    config: Arc<ExternalModuleConfig>,
    child: Option<Child>,
}

impl FeatureModule for ExternalModule {
    fn initialize(&mut self) -> ModuleFuture<'_, ()> {
        async move {
            let mut child = Command::new(&self.config.path)
                .args(&self.config.args)
                .stdin(Stdio::null())
                .kill_on_drop(true)
                .spawn()?;

            tokio::time::sleep(Duration::from_millis(self.config.startup_grace_ms)).await;
            if let Some(status) = child.try_wait()? {
                return Err(ModuleError::EarlyExit(status));
            }

            tracing::info!(
                module = %self.config.name,
                pid = ?child.id(),
                "Module process started"
            );
            self.child = Some(child);
            Ok(())
        }
        .boxed()
    }

    fn cleanup(&mut self) -> ModuleFuture<'_, ()> {
        async move {
            let Some(mut child) = self.child.take() else {
                return Ok(());
            };
            match child.try_wait()? {
                Some(status) => {
                    tracing::warn!(module = %self.config.name, %status, "Module process already exited");
                }
                None => {
                    child.kill().await?;
                    tracing::debug!(module = %self.config.name, "Module process stopped");
                }
            }
            Ok(())
        }
        .boxed()
    }

    fn version(&self) -> String {
        self.config.version.clone()
    }
}
