//! Module registry and dependency ordering.
//!
//! # Responsibilities
//! - Hold the fixed table of module descriptors
//! - Reject duplicate and reserved names at registration
//! - Produce a deterministic initialization order
//!
//! # Design Decisions
//! - The table is built once at process init and is immutable afterwards
//! - Ordering is Kahn's algorithm with a declaration-order ready set, so
//!   independent modules keep the order they were registered in
//! - A cycle fails the whole resolution; no partial order is returned

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::context::HOST_VERSION_KEY;
use crate::error::ServiceError;
use crate::modules::descriptor::ModuleDescriptor;

/// Collects descriptors during process init.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    descriptors: Vec<ModuleDescriptor>,
}

impl RegistryBuilder {
    /// Append a descriptor to the table.
    pub fn register(&mut self, descriptor: ModuleDescriptor) -> Result<&mut Self, ServiceError> {
        // `/version` reports the host under this key.
        if descriptor.name() == HOST_VERSION_KEY {
            return Err(ServiceError::ReservedModuleName(descriptor.name().to_string()));
        }
        if self.descriptors.iter().any(|d| d.name() == descriptor.name()) {
            return Err(ServiceError::DuplicateModule(descriptor.name().to_string()));
        }
        self.descriptors.push(descriptor);
        Ok(self)
    }

    /// Append several descriptors, stopping at the first rejected one.
    pub fn register_all<I>(&mut self, descriptors: I) -> Result<&mut Self, ServiceError>
    where
        I: IntoIterator<Item = ModuleDescriptor>,
    {
        for descriptor in descriptors {
            self.register(descriptor)?;
        }
        Ok(self)
    }

    /// Freeze the table.
    pub fn build(self) -> ModuleRegistry {
        ModuleRegistry {
            descriptors: self.descriptors.into(),
        }
    }
}

/// Immutable table of feature modules.
#[derive(Debug, Clone)]
pub struct ModuleRegistry {
    descriptors: Arc<[ModuleDescriptor]>,
}

impl ModuleRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ModuleDescriptor> {
        self.descriptors.iter().find(|d| d.name() == name)
    }

    /// Descriptors in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &ModuleDescriptor> {
        self.descriptors.iter()
    }

    /// Order descriptors so that every dependency precedes its dependents.
    pub fn resolve_order(&self) -> Result<Vec<ModuleDescriptor>, ServiceError> {
        let index: HashMap<&str, usize> = self
            .descriptors
            .iter()
            .enumerate()
            .map(|(i, d)| (d.name(), i))
            .collect();

        let count = self.descriptors.len();
        let mut in_degree = vec![0usize; count];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); count];

        for (i, descriptor) in self.descriptors.iter().enumerate() {
            for dependency in descriptor.dependencies() {
                let Some(&dep) = index.get(dependency.as_str()) else {
                    return Err(ServiceError::UnknownDependency {
                        module: descriptor.name().to_string(),
                        dependency: dependency.clone(),
                    });
                };
                in_degree[i] += 1;
                dependents[dep].push(i);
            }
        }

        let mut ready: BTreeSet<usize> = (0..count).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(count);

        while let Some(next) = ready.pop_first() {
            order.push(next);
            for &dependent in &dependents[next] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if order.len() < count {
            let cyclic = self.cycle_members(&in_degree, &dependents);
            tracing::error!(modules = ?cyclic, "Module dependency cycle detected");
            return Err(ServiceError::CyclicDependency { modules: cyclic });
        }

        Ok(order
            .into_iter()
            .map(|i| self.descriptors[i].clone())
            .collect())
    }

    /// Narrow the unresolved set down to the modules that actually sit on a
    /// cycle, dropping the ones that merely depend on one.
    fn cycle_members(&self, in_degree: &[usize], dependents: &[Vec<usize>]) -> Vec<String> {
        let mut unresolved: BTreeSet<usize> = (0..in_degree.len())
            .filter(|&i| in_degree[i] > 0)
            .collect();

        loop {
            let leaves: Vec<usize> = unresolved
                .iter()
                .copied()
                .filter(|&i| !dependents[i].iter().any(|d| unresolved.contains(d)))
                .collect();
            if leaves.is_empty() {
                break;
            }
            for leaf in leaves {
                unresolved.remove(&leaf);
            }
        }

        unresolved
            .into_iter()
            .map(|i| self.descriptors[i].name().to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::contract::{FeatureModule, ModuleError};

    fn module(name: &str, deps: &[&str]) -> ModuleDescriptor {
        ModuleDescriptor::optional(name, || async {
            Err::<Box<dyn FeatureModule>, _>(ModuleError::failed("not loadable"))
        })
        .depends_on(deps.iter().copied())
    }

    fn registry(modules: Vec<ModuleDescriptor>) -> ModuleRegistry {
        let mut builder = ModuleRegistry::builder();
        builder.register_all(modules).unwrap();
        builder.build()
    }

    fn names(order: &[ModuleDescriptor]) -> Vec<&str> {
        order.iter().map(ModuleDescriptor::name).collect()
    }

    #[test]
    fn independent_modules_keep_declaration_order() {
        let reg = registry(vec![module("c", &[]), module("a", &[]), module("b", &[])]);
        let order = reg.resolve_order().unwrap();
        assert_eq!(names(&order), vec!["c", "a", "b"]);
    }

    #[test]
    fn dependencies_precede_dependents() {
        let reg = registry(vec![
            module("ui", &["settings", "camera"]),
            module("camera", &["settings"]),
            module("settings", &[]),
            module("telemetry", &[]),
        ]);
        let order = reg.resolve_order().unwrap();
        assert_eq!(names(&order), vec!["settings", "camera", "ui", "telemetry"]);
    }

    #[test]
    fn every_module_follows_its_dependencies() {
        let reg = registry(vec![
            module("e", &["d", "b"]),
            module("d", &["c"]),
            module("c", &[]),
            module("b", &["a"]),
            module("a", &[]),
            module("f", &["a", "e"]),
        ]);
        let order = reg.resolve_order().unwrap();
        let position = |name: &str| order.iter().position(|d| d.name() == name).unwrap();

        for descriptor in reg.iter() {
            for dep in descriptor.dependencies() {
                assert!(
                    position(dep) < position(descriptor.name()),
                    "{dep} must precede {}",
                    descriptor.name()
                );
            }
        }
        assert_eq!(order.len(), reg.len());
    }

    #[test]
    fn cycle_is_rejected_and_reports_members_only() {
        let reg = registry(vec![
            module("root", &[]),
            module("a", &["c"]),
            module("b", &["a"]),
            module("c", &["b"]),
            module("downstream", &["c"]),
        ]);
        match reg.resolve_order() {
            Err(ServiceError::CyclicDependency { modules }) => {
                assert_eq!(modules, vec!["a", "b", "c"]);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let reg = registry(vec![module("loop", &["loop"])]);
        assert!(matches!(
            reg.resolve_order(),
            Err(ServiceError::CyclicDependency { .. })
        ));
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let reg = registry(vec![module("camera", &["driver"])]);
        match reg.resolve_order() {
            Err(ServiceError::UnknownDependency { module, dependency }) => {
                assert_eq!(module, "camera");
                assert_eq!(dependency, "driver");
            }
            other => panic!("expected unknown dependency, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut builder = ModuleRegistry::builder();
        builder.register(module("a", &[])).unwrap();
        let err = builder.register(module("a", &[])).unwrap_err();
        assert!(matches!(err, ServiceError::DuplicateModule(name) if name == "a"));
    }

    #[test]
    fn host_name_is_reserved() {
        let mut builder = ModuleRegistry::builder();
        let err = builder.register(module("host", &[])).unwrap_err();
        assert!(matches!(err, ServiceError::ReservedModuleName(name) if name == "host"));
        assert!(builder.build().is_empty());
    }
}
