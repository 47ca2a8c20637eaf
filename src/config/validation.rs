//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential sanity of module entries (unique names, digests)
//! - Validate value ranges (backoff > 0, thread counts > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use axum::http::HeaderName;

use crate::config::schema::ServiceConfig;
use crate::context::HOST_VERSION_KEY;
use crate::modules::builtin::SETTINGS_MODULE;

/// A single semantic problem found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.host.trim().is_empty() {
        errors.push(ValidationError::new("listener.host", "must not be empty"));
    }
    if config.listener.backoff_ms == 0 {
        errors.push(ValidationError::new("listener.backoff_ms", "must be greater than zero"));
    }

    if HeaderName::from_bytes(config.security.header_name.as_bytes()).is_err() {
        errors.push(ValidationError::new(
            "security.header_name",
            format!("`{}` is not a valid header name", config.security.header_name),
        ));
    }
    if config.security.secret_length == 0 {
        errors.push(ValidationError::new("security.secret_length", "must be greater than zero"));
    }

    if config.paths.run_file.trim().is_empty() {
        errors.push(ValidationError::new("paths.run_file", "must not be empty"));
    }
    if config.paths.settings_file.trim().is_empty() {
        errors.push(ValidationError::new("paths.settings_file", "must not be empty"));
    }
    if config.settings.default_language.trim().is_empty() {
        errors.push(ValidationError::new("settings.default_language", "must not be empty"));
    }

    if config.runtime.worker_threads == 0 {
        errors.push(ValidationError::new("runtime.worker_threads", "must be greater than zero"));
    }
    if config.runtime.blocking_threads == 0 {
        errors.push(ValidationError::new("runtime.blocking_threads", "must be greater than zero"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("`{}` is not a socket address", config.observability.metrics_address),
        ));
    }

    let mut names = HashSet::new();
    for (index, module) in config.modules.iter().enumerate() {
        let field = format!("modules[{index}]");
        if module.name.trim().is_empty() {
            errors.push(ValidationError::new(format!("{field}.name"), "must not be empty"));
        } else if module.name == HOST_VERSION_KEY || module.name == SETTINGS_MODULE {
            errors.push(ValidationError::new(
                format!("{field}.name"),
                format!("`{}` is reserved", module.name),
            ));
        } else if !names.insert(module.name.as_str()) {
            errors.push(ValidationError::new(
                format!("{field}.name"),
                format!("duplicate module name `{}`", module.name),
            ));
        }
        if !is_sha256_hex(&module.sha256) {
            errors.push(ValidationError::new(
                format!("{field}.sha256"),
                "must be 64 hexadecimal characters",
            ));
        }
        if module.depends_on.iter().any(|dep| dep == &module.name) {
            errors.push(ValidationError::new(
                format!("{field}.depends_on"),
                "a module cannot depend on itself",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_sha256_hex(value: &str) -> bool {
    value.len() == 64 && value.chars().all(|c| c.is_ascii_hexdigit())
}
