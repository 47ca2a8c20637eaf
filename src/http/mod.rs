//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → gatekeeper.rs (shared-secret check, request ID)
//!     → routes.rs (version, beta, language, threadpool, up)
//!       or realtime.rs (WebSocket upgrade, event fan-out)
//!     → response.rs (per-request error mapping)
//!     → Send to client
//! ```

pub mod gatekeeper;
pub mod realtime;
pub mod request;
pub mod response;
pub mod routes;
pub mod server;

pub use realtime::{RealtimeEvent, RealtimeHub};
pub use request::{RequestId, RequestIdGenerator, X_REQUEST_ID};
pub use response::ApiError;
pub use server::HttpServer;
