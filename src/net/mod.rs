//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     secret.rs (generate per-run secret)
//!     → listener.rs (resolve host, bind with retries)
//!     → runfile.rs (publish {port, secret} for local clients)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - The secret exists before the socket, so no request is ever served
//!   without a check
//! - Loopback by default; the host is configurable

pub mod listener;
pub mod runfile;
pub mod secret;

pub use listener::{Binder, BoundListener, Endpoint, ListenerBootstrapper, TcpBinder};
pub use runfile::RunFile;
pub use secret::SharedSecret;
