//! Static module descriptors.

use std::future::Future;
use std::sync::Arc;

use futures_util::FutureExt;

use super::contract::{FeatureModule, ModuleError, ModuleFuture, ModulePolicy};

/// Load function stored in a descriptor.
pub type LoadFn = Arc<dyn Fn() -> ModuleFuture<'static, Box<dyn FeatureModule>> + Send + Sync>;

/// Identity, policy, dependencies and load function of one feature module.
///
/// Descriptors are created once at process start and never mutated; cloning
/// only bumps the reference count of the load function.
#[derive(Clone)]
pub struct ModuleDescriptor {
    name: String,
    policy: ModulePolicy,
    depends_on: Vec<String>,
    load: LoadFn,
}

impl ModuleDescriptor {
    /// Create a descriptor from an async load function.
    pub fn new<F, Fut>(name: impl Into<String>, policy: ModulePolicy, load: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Box<dyn FeatureModule>, ModuleError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            policy,
            depends_on: Vec::new(),
            load: Arc::new(move || load().boxed()),
        }
    }

    /// A module whose failure aborts startup.
    pub fn mandatory<F, Fut>(name: impl Into<String>, load: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Box<dyn FeatureModule>, ModuleError>> + Send + 'static,
    {
        Self::new(name, ModulePolicy::Mandatory, load)
    }

    /// A module whose failure is isolated.
    pub fn optional<F, Fut>(name: impl Into<String>, load: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Box<dyn FeatureModule>, ModuleError>> + Send + 'static,
    {
        Self::new(name, ModulePolicy::Optional, load)
    }

    /// Declare modules that must be loaded before this one.
    pub fn depends_on<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for dependency in dependencies {
            let dependency = dependency.into();
            if !self.depends_on.contains(&dependency) {
                self.depends_on.push(dependency);
            }
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> ModulePolicy {
        self.policy
    }

    pub fn dependencies(&self) -> &[String] {
        &self.depends_on
    }

    /// Run the load function.
    pub fn load(&self) -> ModuleFuture<'static, Box<dyn FeatureModule>> {
        (self.load)()
    }
}

impl std::fmt::Debug for ModuleDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleDescriptor")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .field("depends_on", &self.depends_on)
            .finish_non_exhaustive()
    }
}
