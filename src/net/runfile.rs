//! The run file: how local clients discover the port and secret.
//!
//! Written exactly once, after the listener is bound, with owner-only
//! permissions. Removed on clean shutdown.

use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::persist;

/// Contents of `<app-data-dir>/companion.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFile {
    pub port: u16,
    pub secret: String,
}

impl RunFile {
    pub fn new(port: u16, secret: impl Into<String>) -> Self {
        Self {
            port,
            secret: secret.into(),
        }
    }

    /// Atomically replace the file at `path`.
    pub fn write(&self, path: &Path) -> io::Result<()> {
        let body = serde_json::to_vec_pretty(self)?;
        persist::atomic_write(path, &body)
    }

    pub fn read(path: &Path) -> io::Result<Self> {
        let body = std::fs::read(path)?;
        serde_json::from_slice(&body).map_err(io::Error::from)
    }

    pub fn remove(path: &Path) -> io::Result<()> {
        persist::remove_if_exists(path)
    }
}
