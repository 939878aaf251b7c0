//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize process-wide observability state (subscriber, redaction,
//!   metrics) exactly once, before any listener binds
//! - Map every startup failure to one fatal error type
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listeners start last (traffic only when ready)

use crate::config::loader::ConfigError;
use crate::config::schema::ServiceConfig;
use crate::observability::{logging, metrics, redaction};
use crate::routing::RoutingError;

/// Fatal error raised before the server starts serving.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("routing setup failed: {0}")]
    Routing(#[from] RoutingError),

    #[error("redaction setup failed: {0}")]
    Redaction(#[from] redaction::RedactionError),

    #[error("logging setup failed: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),

    #[error("metrics setup failed: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("invalid identity service url: {0}")]
    IdentityUrl(#[from] url::ParseError),

    #[error("invalid address '{0}'")]
    Address(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Install the subscriber, the global redaction set and, if enabled, the
/// Prometheus exporter. Must run once, inside the runtime.
pub fn init_observability(config: &ServiceConfig) -> Result<(), StartupError> {
    let obs = &config.observability;
    logging::init_logging(obs)?;

    redaction::init_redaction(redaction::Redactor::new(&obs.redacted_headers)?)?;
    tracing::debug!(headers = ?obs.redacted_headers, "Header redaction configured");

    if obs.metrics_enabled {
        let addr = obs
            .metrics_address
            .parse()
            .map_err(|_| StartupError::Address(obs.metrics_address.clone()))?;
        metrics::init_metrics(addr)?;
    }
    Ok(())
}
