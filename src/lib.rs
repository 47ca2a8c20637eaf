//! Local companion host.
//!
//! Runs alongside a desktop application: loads feature modules in
//! dependency order, serves a small HTTP and WebSocket surface on loopback
//! guarded by a per-run shared secret, and shuts everything down through a
//! single idempotent path.

// Core subsystems
pub mod config;
pub mod context;
pub mod http;
pub mod modules;
pub mod net;
pub mod settings;

// Cross-cutting concerns
pub mod error;
pub mod lifecycle;
pub mod observability;
pub mod persist;
pub mod resilience;

pub use config::ServiceConfig;
pub use context::AppContext;
pub use error::ServiceError;
pub use http::HttpServer;
pub use lifecycle::{Bootstrap, ShutdownCoordinator, ShutdownTrigger};
