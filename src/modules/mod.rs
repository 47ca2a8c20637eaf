//! Feature module subsystem.
//!
//! # Data Flow
//! ```text
//! Process init:
//!     builtin.rs + external.rs (config) → descriptors
//!     → registry.rs (fixed table, resolve_order)
//!     → lifecycle::orchestrator (load → initialize)
//!     → outcome.rs (one LoadOutcome per module)
//!
//! Shutdown:
//!     lifecycle::shutdown → cleanup() in reverse load order
//! ```
//!
//! # Design Decisions
//! - One polymorphic contract (contract.rs) for every module
//! - Mandatory vs optional is a descriptor policy, not a separate type
//! - Descriptors are immutable after process init

pub mod builtin;
pub mod contract;
pub mod descriptor;
pub mod external;
pub mod outcome;
pub mod registry;

pub use contract::{FeatureModule, ModuleError, ModuleFuture, ModulePolicy};
pub use descriptor::ModuleDescriptor;
pub use outcome::LoadOutcome;
pub use registry::{ModuleRegistry, RegistryBuilder};
