use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// `{port, secret}` published by the host once it listens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFile {
    pub port: u16,
    pub secret: String,
}

impl RunFile {
    pub fn read(path: &Path) -> Result<Self, ClientError> {
        let body = std::fs::read(path)?;
        Ok(serde_json::from_slice(&body)?)
    }
}
