//! Client for a running companion host.
//!
//! ```ignore
//! let client = CompanionClient::discover(&run_file_path)?;
//! let versions = client.version().await?;
//! ```

pub mod client;
pub mod error;
pub mod run_file;

pub use client::CompanionClient;
pub use error::ClientError;
pub use run_file::RunFile;
