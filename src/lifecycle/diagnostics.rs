//! Fatal error reporting.
//!
//! # Responsibilities
//! - Describe a fatal error as a JSON crash report
//! - Write it to the crash directory and/or upload it
//! - Log panics with their location before the default hook runs
//!
//! # Design Decisions
//! - Reporting never fails the shutdown path; problems are logged
//! - Uploads are bounded by a timeout so a dead endpoint cannot hang exit

use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::config::DiagnosticsConfig;
use crate::error::ServiceError;
use crate::persist;

/// A single fatal error, as written to disk and uploaded.
#[derive(Debug, Clone, Serialize)]
pub struct CrashReport {
    pub version: &'static str,
    pub error: String,
    pub causes: Vec<String>,
    pub os: &'static str,
    pub arch: &'static str,
    pub timestamp: u64,
}

impl CrashReport {
    pub fn from_error(error: &ServiceError) -> Self {
        let mut causes = Vec::new();
        let mut source = std::error::Error::source(error);
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }

        Self {
            version: env!("CARGO_PKG_VERSION"),
            error: error.to_string(),
            causes,
            os: std::env::consts::OS,
            arch: std::env::consts::ARCH,
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default(),
        }
    }
}

/// Delivers crash reports to the configured sinks.
#[derive(Debug, Clone)]
pub struct DiagnosticsReporter {
    config: DiagnosticsConfig,
    client: reqwest::Client,
}

impl DiagnosticsReporter {
    pub fn new(config: DiagnosticsConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|error| {
                tracing::warn!(error = %error, "Falling back to default HTTP client for diagnostics");
                reqwest::Client::new()
            });
        Self { config, client }
    }

    /// Log `error` and deliver a report to every configured sink.
    pub async fn report(&self, error: &ServiceError) -> CrashReport {
        let report = CrashReport::from_error(error);
        tracing::error!(
            error = %report.error,
            causes = ?report.causes,
            "Fatal error"
        );

        if let Some(dir) = &self.config.crash_dir {
            if let Err(write_error) = write_report(dir, &report) {
                tracing::warn!(dir = %dir.display(), error = %write_error, "Failed to write crash report");
            }
        }

        if let Some(url) = &self.config.report_url {
            match self.client.post(url).json(&report).send().await {
                Ok(response) if response.status().is_success() => {
                    tracing::debug!(url = %url, "Crash report uploaded");
                }
                Ok(response) => {
                    tracing::warn!(url = %url, status = %response.status(), "Crash report rejected");
                }
                Err(upload_error) => {
                    tracing::warn!(url = %url, error = %upload_error, "Failed to upload crash report");
                }
            }
        }

        report
    }
}

fn write_report(dir: &Path, report: &CrashReport) -> std::io::Result<()> {
    let body = serde_json::to_vec_pretty(report)?;
    let path = dir.join(format!("crash-{}.json", report.timestamp));
    persist::atomic_write(&path, &body)
}

/// Log panics through `tracing` before delegating to the previous hook.
pub fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_string());
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_default();
        tracing::error!(panic = %payload, location = %location, "Panic");
        previous(info);
    }));
}
