//! Persisted user settings.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::persist;

/// Settings document stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub language: String,
}

/// Errors raised by the settings store.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to access settings at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode settings: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("settings have not been loaded")]
    NotLoaded,
}

/// File-backed settings with an in-memory copy.
///
/// Reads are served from memory; writes are serialized and persisted
/// atomically before they become visible.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    default_language: String,
    current: RwLock<Option<Settings>>,
    writes: Mutex<()>,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>, default_language: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            default_language: default_language.into(),
            current: RwLock::new(None),
            writes: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the document from disk.
    ///
    /// A missing file yields defaults. A corrupt file is reported and
    /// replaced by defaults on the next write.
    pub fn load(&self) -> Result<(), SettingsError> {
        let settings = match std::fs::read(&self.path) {
            Ok(bytes) => match serde_json::from_slice::<Settings>(&bytes) {
                Ok(settings) => settings,
                Err(error) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        error = %error,
                        "Settings file is corrupt, falling back to defaults"
                    );
                    self.defaults()
                }
            },
            Err(error) if error.kind() == io::ErrorKind::NotFound => self.defaults(),
            Err(source) => {
                return Err(SettingsError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        tracing::debug!(path = %self.path.display(), language = %settings.language, "Settings loaded");
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(settings);
        Ok(())
    }

    /// Current language.
    pub fn language(&self) -> Result<String, SettingsError> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|s| s.language.clone())
            .ok_or(SettingsError::NotLoaded)
    }

    /// Persist a new language, then publish it in memory.
    pub async fn set_language(&self, language: impl Into<String>) -> Result<(), SettingsError> {
        let _write = self.writes.lock().await;
        let mut next = self.snapshot()?;
        next.language = language.into();
        self.write_to_disk(&next).await?;
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(next);
        Ok(())
    }

    /// Flush the in-memory document to disk.
    pub async fn persist(&self) -> Result<(), SettingsError> {
        let _write = self.writes.lock().await;
        let current = self.snapshot()?;
        self.write_to_disk(&current).await
    }

    fn snapshot(&self) -> Result<Settings, SettingsError> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(SettingsError::NotLoaded)
    }

    async fn write_to_disk(&self, settings: &Settings) -> Result<(), SettingsError> {
        let bytes = serde_json::to_vec_pretty(settings)?;
        let path = self.path.clone();
        let result = tokio::task::spawn_blocking(move || persist::atomic_write(&path, &bytes))
            .await
            .unwrap_or_else(|join| Err(io::Error::other(join)));
        result.map_err(|source| SettingsError::Io {
            path: self.path.clone(),
            source,
        })
    }

    fn defaults(&self) -> Settings {
        Settings {
            language: self.default_language.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_default_language() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json"), "en");

        assert!(matches!(store.language(), Err(SettingsError::NotLoaded)));
        store.load().unwrap();
        assert_eq!(store.language().unwrap(), "en");
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, b"{not json").unwrap();

        let store = SettingsStore::new(&path, "de");
        store.load().unwrap();
        assert_eq!(store.language().unwrap(), "de");
    }

    #[tokio::test]
    async fn set_language_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let store = SettingsStore::new(&path, "en");
        store.load().unwrap();
        store.set_language("fr").await.unwrap();
        assert_eq!(store.language().unwrap(), "fr");

        let reopened = SettingsStore::new(&path, "en");
        reopened.load().unwrap();
        assert_eq!(reopened.language().unwrap(), "fr");
    }

    #[tokio::test]
    async fn writes_require_loaded_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json"), "en");
        assert!(matches!(
            store.set_language("fr").await,
            Err(SettingsError::NotLoaded)
        ));
    }
}
