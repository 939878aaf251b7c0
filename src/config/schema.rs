//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files, and
//! every section falls back to its defaults when omitted.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::security::permission::PermissionSet;

/// Root configuration for the service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Graceful shutdown settings.
    pub shutdown: ShutdownConfig,

    /// Request limits.
    pub security: SecurityConfig,

    /// Logging, tracing and metrics.
    pub observability: ObservabilityConfig,

    /// Base path layout.
    pub api: ApiConfig,

    /// CORS policy for the versioned API router.
    pub cors: CorsConfig,

    /// Credentials and grants.
    pub auth: AuthConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Timeout for calls to the external identity service, in milliseconds.
    pub identity_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            identity_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// How long in-flight requests may run after a shutdown signal.
    pub drain_timeout_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout_secs: 30,
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level filter (trace, debug, info, warn, error, or a directive list).
    pub log_level: String,

    /// Output format of the subscriber.
    pub log_format: LogFormat,

    /// Inbound/outbound correlation header.
    pub trace_header: String,

    /// Headers replaced with a placeholder in access logs (case-insensitive).
    pub redacted_headers: Vec<String>,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            trace_header: "x-request-id".to_string(),
            redacted_headers: vec![
                "authorization".to_string(),
                "cookie".to_string(),
                "set-cookie".to_string(),
            ],
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Shared outer base path for every router.
    pub base_path: String,

    /// Versioned API router, relative to `base_path`.
    pub version_path: String,

    /// Health router, relative to `base_path`.
    pub health_path: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_path: "/api".to_string(),
            version_path: "/v1".to_string(),
            health_path: "/health".to_string(),
        }
    }
}

/// CORS configuration, mapped onto `CorsPolicy`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    pub enabled: bool,
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub allow_credentials: bool,
    pub max_age_secs: u64,
    /// Decorate responses even when the request carries no Origin.
    pub always_on: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_origins: vec!["http://localhost:3000".to_string()],
            allowed_methods: ["GET", "POST", "PUT", "DELETE"].map(String::from).to_vec(),
            allowed_headers: vec!["Content-Type".to_string(), "Authorization".to_string()],
            allow_credentials: true,
            max_age_secs: 3600,
            always_on: false,
        }
    }
}

/// Authentication and authorization data.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Static bearer token -> user id table.
    pub tokens: HashMap<String, String>,

    /// External identity service; replaces `tokens` when set.
    pub identity_service_url: Option<String>,

    /// Grants for users without an explicit entry.
    pub default_grants: PermissionSet,

    /// Per-user grants.
    pub grants: HashMap<String, PermissionSet>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            tokens: HashMap::from([("valid-token".to_string(), "user-123".to_string())]),
            identity_service_url: None,
            default_grants: PermissionSet::from_slice(&crate::app::permissions::DEFAULT_GRANTS),
            grants: HashMap::new(),
        }
    }
}
