//! Trace identifier assignment (the outermost middleware stage).
//!
//! # Responsibilities
//! - Reuse the inbound correlation header when it carries a usable value
//! - Otherwise generate a fresh UUID v4
//! - Attach the id to the request before any inner stage runs
//! - Echo the id on the response and record it on the request span
//!
//! # Design Decisions
//! - Trace id added as early as possible so every log line can carry it
//! - Inbound values are only trusted if short and printable ASCII

use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use std::fmt;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

/// Default correlation header.
pub const X_REQUEST_ID: &str = "x-request-id";

const MAX_TRACE_ID_LEN: usize = 128;

/// Opaque correlation token for one request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TraceId(Arc<str>);

impl TraceId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string().into())
    }

    /// Accept an inbound value if it is non-empty, at most 128 bytes and
    /// made only of visible ASCII.
    pub fn from_header(value: &HeaderValue) -> Option<Self> {
        let s = value.to_str().ok()?.trim();
        if s.is_empty() || s.len() > MAX_TRACE_ID_LEN || !s.bytes().all(|b| b.is_ascii_graphic()) {
            return None;
        }
        Some(Self(s.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extension trait for reading the trace id off a request.
pub trait TraceIdExt {
    fn trace_id(&self) -> Option<&TraceId>;
}

impl<B> TraceIdExt for Request<B> {
    fn trace_id(&self) -> Option<&TraceId> {
        self.extensions().get::<TraceId>()
    }
}

/// Tracing stage configuration.
#[derive(Debug, Clone)]
pub struct TraceConfig {
    pub header: HeaderName,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            header: HeaderName::from_static(X_REQUEST_ID),
        }
    }
}

/// Assign or propagate the trace id, then run the rest of the chain inside a
/// `request` span.
pub async fn trace_id_middleware(
    State(config): State<Arc<TraceConfig>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let trace_id = req
        .headers()
        .get(&config.header)
        .and_then(TraceId::from_header)
        .unwrap_or_else(TraceId::generate);

    req.extensions_mut().insert(trace_id.clone());

    let span = tracing::info_span!(
        "request",
        trace_id = %trace_id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    let mut response = next.run(req).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(trace_id.as_str()) {
        response.headers_mut().insert(config.header.clone(), value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(TraceId::generate(), TraceId::generate());
    }

    #[test]
    fn inbound_values_are_validated() {
        let ok = HeaderValue::from_static("abc-123");
        assert_eq!(TraceId::from_header(&ok).unwrap().as_str(), "abc-123");

        let spaced = HeaderValue::from_static("abc 123");
        assert!(TraceId::from_header(&spaced).is_none());

        let empty = HeaderValue::from_static("");
        assert!(TraceId::from_header(&empty).is_none());

        let long = HeaderValue::from_str(&"a".repeat(129)).unwrap();
        assert!(TraceId::from_header(&long).is_none());
    }
}
