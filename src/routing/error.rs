//! Setup-time routing errors.
//!
//! Every variant here is raised while routers are being built. None of them can
//! occur while a request is being served.

use axum::http::Method;

use crate::security::cors::CorsError;

/// Error raised while registering routes or composing routers.
#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    #[error("invalid route pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("invalid base path '{path}': {reason}")]
    InvalidBasePath { path: String, reason: String },

    #[error("route conflict: {method} {pattern} collides with already registered {method} {existing}")]
    RouteConflict {
        method: Method,
        pattern: String,
        existing: String,
    },

    #[error("base path conflict: {}", format_conflicts(.conflicts))]
    PathConflict { conflicts: Vec<(String, String)> },

    #[error("protected route {method} {pattern} has no {missing} stage on router '{base_path}'")]
    UnguardedRoute {
        method: Method,
        pattern: String,
        base_path: String,
        missing: &'static str,
    },

    #[error(transparent)]
    Cors(#[from] CorsError),
}

fn format_conflicts(conflicts: &[(String, String)]) -> String {
    conflicts
        .iter()
        .map(|(a, b)| {
            if a == b {
                format!("'{a}' is registered twice")
            } else {
                format!("'{a}' overlaps '{b}'")
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
