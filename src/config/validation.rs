//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check that header names, base paths and the CORS policy are well formed
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use axum::http::HeaderName;
use std::fmt;
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;
use url::Url;

use crate::config::schema::ServiceConfig;
use crate::routing::router::normalize_base_path;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }
    if config.timeouts.identity_ms == 0 {
        errors.push(ValidationError::new("timeouts.identity_ms", "must be greater than 0"));
    }
    if config.shutdown.drain_timeout_secs == 0 {
        errors.push(ValidationError::new("shutdown.drain_timeout_secs", "must be greater than 0"));
    }
    if config.security.max_body_size == 0 {
        errors.push(ValidationError::new("security.max_body_size", "must be greater than 0"));
    }

    let obs = &config.observability;
    if let Err(e) = EnvFilter::try_new(&obs.log_level) {
        errors.push(ValidationError::new("observability.log_level", e.to_string()));
    }
    if HeaderName::from_bytes(obs.trace_header.as_bytes()).is_err() {
        errors.push(ValidationError::new(
            "observability.trace_header",
            format!("'{}' is not a valid header name", obs.trace_header),
        ));
    }
    for name in &obs.redacted_headers {
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            errors.push(ValidationError::new(
                "observability.redacted_headers",
                format!("'{name}' is not a valid header name"),
            ));
        }
    }
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", obs.metrics_address),
        ));
    }

    for (field, path) in [
        ("api.base_path", &config.api.base_path),
        ("api.version_path", &config.api.version_path),
        ("api.health_path", &config.api.health_path),
    ] {
        if let Err(e) = normalize_base_path(path) {
            errors.push(ValidationError::new(field, e.to_string()));
        }
    }

    if config.cors.enabled {
        if let Err(e) = crate::app::cors_policy(&config.cors) {
            errors.push(ValidationError::new("cors", e.to_string()));
        }
    }

    if let Some(raw) = &config.auth.identity_service_url {
        match Url::parse(raw) {
            Ok(url) if url.scheme() == "http" => {}
            Ok(_) => errors.push(ValidationError::new(
                "auth.identity_service_url",
                "only plain http identity services are supported",
            )),
            Err(e) => errors.push(ValidationError::new("auth.identity_service_url", e.to_string())),
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
