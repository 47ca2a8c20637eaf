//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the companion host.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the companion host.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (host, port, bind retry policy).
    pub listener: ListenerConfig,

    /// Shared-secret request checks.
    pub security: SecurityConfig,

    /// Locations of the run file and persisted settings.
    pub paths: PathsConfig,

    /// User settings defaults.
    pub settings: SettingsConfig,

    /// Tokio runtime sizing.
    pub runtime: RuntimeConfig,

    /// Feature flags exposed to clients.
    pub features: FeaturesConfig,

    /// Interaction with a parent supervisor process.
    pub supervisor: SupervisorConfig,

    /// Fatal error reporting.
    pub diagnostics: DiagnosticsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// External feature modules, loaded in addition to the built-in ones.
    pub modules: Vec<ExternalModuleConfig>,
}

impl ServiceConfig {
    /// Full path of the run file advertising port and secret.
    pub fn run_file_path(&self) -> PathBuf {
        self.paths.app_data_dir.join(&self.paths.run_file)
    }

    /// Full path of the persisted settings document.
    pub fn settings_file_path(&self) -> PathBuf {
        self.paths.app_data_dir.join(&self.paths.settings_file)
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Host or IP address to bind (e.g., "127.0.0.1").
    pub host: String,

    /// Requested port; 0 lets the operating system pick one.
    pub port: u16,

    /// Number of additional bind attempts after the first one fails.
    pub retries: u32,

    /// Fixed delay between bind attempts in milliseconds.
    pub backoff_ms: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            retries: 5,
            backoff_ms: 1000,
        }
    }
}

/// Shared-secret check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Require the per-run secret on every request and socket handshake.
    pub check_enabled: bool,

    /// Request header carrying the secret.
    pub header_name: String,

    /// Length of the generated secret in characters.
    pub secret_length: usize,

    /// Maximum accepted request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            check_enabled: true,
            header_name: "x-companion-token".to_string(),
            secret_length: 32,
            max_body_bytes: 64 * 1024,
        }
    }
}

/// Filesystem locations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Per-user application data directory.
    pub app_data_dir: PathBuf,

    /// Run file name, relative to `app_data_dir`.
    pub run_file: String,

    /// Settings file name, relative to `app_data_dir`.
    pub settings_file: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            app_data_dir: default_app_data_dir(),
            run_file: "companion.json".to_string(),
            settings_file: "settings.json".to_string(),
        }
    }
}

fn default_app_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("companion-host")
}

/// User settings defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SettingsConfig {
    /// Language reported until the user picks one.
    pub default_language: String,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            default_language: "en".to_string(),
        }
    }
}

/// Runtime sizing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Async worker threads.
    pub worker_threads: usize,

    /// Upper bound of the blocking thread pool (reported by `/threadpool`).
    pub blocking_threads: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_threads: 4,
            blocking_threads: 4,
        }
    }
}

/// Feature flags.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct FeaturesConfig {
    /// Whether this installation runs the beta channel.
    pub beta: bool,
}

/// Parent supervisor integration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Print a `READY <host>:<port>` line on stdout once listening.
    pub notify_stdout: bool,

    /// Shut down when stdin reaches end-of-file (parent went away).
    pub exit_on_stdin_close: bool,
}

/// Fatal error reporting.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Endpoint receiving a JSON crash report.
    pub report_url: Option<String>,

    /// Directory where crash reports are written.
    pub crash_dir: Option<PathBuf>,

    /// Upload timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            report_url: None,
            crash_dir: None,
            timeout_secs: 5,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
    /// Condensed single-line output.
    Compact,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9464".to_string(),
        }
    }
}

/// An external feature module: a companion executable supervised by the host.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExternalModuleConfig {
    /// Unique module name, used for dependencies and `/version`.
    pub name: String,

    /// Path to the executable.
    pub path: PathBuf,

    /// Expected SHA-256 digest of the executable (hex).
    pub sha256: String,

    /// Arguments passed to the executable.
    #[serde(default)]
    pub args: Vec<String>,

    /// Version reported for this module.
    #[serde(default = "default_module_version")]
    pub version: String,

    /// How long the process must stay alive to count as started.
    #[serde(default = "default_startup_grace_ms")]
    pub startup_grace_ms: u64,

    /// Optional modules may fail without aborting startup.
    #[serde(default = "default_optional")]
    pub optional: bool,

    /// Modules that must be loaded before this one.
    #[serde(default)]
    pub depends_on: Vec<String>,
}

fn default_module_version() -> String {
    "0.0.0".to_string()
}

fn default_startup_grace_ms() -> u64 {
    500
}

fn default_optional() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_document_uses_defaults() {
        let config: ServiceConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.host, "127.0.0.1");
        assert_eq!(config.listener.port, 0);
        assert!(config.security.check_enabled);
        assert_eq!(config.paths.run_file, "companion.json");
        assert!(config.modules.is_empty());
    }

    #[test]
    fn external_module_defaults() {
        let config: ServiceConfig = toml::from_str(
            r#"
            [[modules]]
            name = "camera"
            path = "/opt/companion/camera"
            sha256 = "00"
            depends_on = ["settings"]
            "#,
        )
        .unwrap();

        let module = &config.modules[0];
        assert!(module.optional);
        assert_eq!(module.version, "0.0.0");
        assert_eq!(module.startup_grace_ms, 500);
        assert_eq!(module.depends_on, vec!["settings".to_string()]);
    }

    #[test]
    fn paths_join_app_data_dir() {
        let mut config = ServiceConfig::default();
        config.paths.app_data_dir = PathBuf::from("/tmp/companion");
        assert_eq!(config.run_file_path(), PathBuf::from("/tmp/companion/companion.json"));
        assert_eq!(config.settings_file_path(), PathBuf::from("/tmp/companion/settings.json"));
    }

    #[test]
    fn log_format_is_lowercase() {
        let config: ServiceConfig = toml::from_str(
            r#"
            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.observability.log_format, LogFormat::Json);
    }
}
