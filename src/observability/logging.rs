//! Structured logging and the access log.
//!
//! # Responsibilities
//! - Initialize the `tracing` subscriber (level filter, pretty or JSON output)
//! - Build one [`LogEntry`] per completed request, with sensitive headers
//!   redacted
//! - Hand entries to a pluggable [`LogSink`]
//!
//! # Design Decisions
//! - `RUST_LOG` overrides the configured level
//! - The logging stage never alters the response it observes
//! - Emission is synchronous but cheap; sinks must not block

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Method, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::schema::{LogFormat, ObservabilityConfig};
use crate::http::request::{TraceId, TraceIdExt};
use crate::lifecycle::drain::InFlightRequests;
use crate::observability::metrics;
use crate::observability::redaction::{self, Redactor};

/// Install the global subscriber.
pub fn init_logging(
    config: &ObservabilityConfig,
) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    }
}

/// Summary of one completed request.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub method: Method,
    pub path: String,
    pub status: StatusCode,
    pub trace_id: Option<TraceId>,
    /// Request headers in arrival order, redacted.
    pub headers: Vec<(String, String)>,
    pub duration: Duration,
}

impl LogEntry {
    /// Value of a (lowercase) header as it will be logged.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn headers_json(&self) -> String {
        let map: serde_json::Map<String, serde_json::Value> = self
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();
        serde_json::Value::Object(map).to_string()
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}ms trace_id={}",
            self.method,
            self.path,
            self.status.as_u16(),
            self.duration.as_millis(),
            self.trace_id.as_ref().map(TraceId::as_str).unwrap_or("-"),
        )
    }
}

/// Destination for access log entries.
pub trait LogSink: Send + Sync {
    fn emit(&self, entry: &LogEntry);
}

impl<F> LogSink for F
where
    F: Fn(&LogEntry) + Send + Sync,
{
    fn emit(&self, entry: &LogEntry) {
        self(entry)
    }
}

/// Writes entries as `tracing` events on the `access_log` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, entry: &LogEntry) {
        tracing::info!(
            target: "access_log",
            method = %entry.method,
            path = %entry.path,
            status = entry.status.as_u16(),
            trace_id = %entry.trace_id.as_ref().map(TraceId::as_str).unwrap_or("-"),
            duration_ms = entry.duration.as_millis() as u64,
            headers = %entry.headers_json(),
            "Request completed"
        );
    }
}

/// Access log emitter: redacts, then forwards to a sink.
pub struct AccessLog {
    /// `None` means the process-wide redaction set.
    redactor: Option<Redactor>,
    sink: Arc<dyn LogSink>,
}

impl AccessLog {
    pub fn new() -> Self {
        Self {
            redactor: None,
            sink: Arc::new(TracingSink),
        }
    }

    pub fn with_sink(mut self, sink: impl LogSink + 'static) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    /// Use an explicit redaction set instead of the process-wide one.
    pub fn with_redactor(mut self, redactor: Redactor) -> Self {
        self.redactor = Some(redactor);
        self
    }

    fn redactor(&self) -> &Redactor {
        self.redactor.as_ref().unwrap_or_else(|| redaction::global())
    }

    /// Build the redacted entry for a completed request.
    pub fn record(
        &self,
        method: Method,
        path: String,
        status: StatusCode,
        trace_id: Option<TraceId>,
        headers: &HeaderMap,
        duration: Duration,
    ) -> LogEntry {
        LogEntry {
            method,
            path,
            status,
            trace_id,
            headers: self.redactor().redact(headers),
            duration,
        }
    }

    pub fn emit(&self, entry: &LogEntry) {
        self.sink.emit(entry);
    }
}

impl Default for AccessLog {
    fn default() -> Self {
        Self::new()
    }
}

/// State for [`access_log_middleware`].
#[derive(Clone)]
pub struct LoggingState {
    pub access_log: Arc<AccessLog>,
    pub in_flight: InFlightRequests,
}

/// Status recorded for requests whose client went away before a response was
/// produced (nginx's "client closed request").
const CLIENT_CLOSED_REQUEST: u16 = 499;

/// An access-log entry waiting for its response. If the request future is
/// dropped first, the entry is still emitted on drop, with status 499.
struct PendingEntry {
    access_log: Arc<AccessLog>,
    method: Method,
    path: String,
    headers: HeaderMap,
    trace_id: Option<TraceId>,
    start: Instant,
    emitted: bool,
}

impl PendingEntry {
    fn complete(&mut self, status: StatusCode) {
        if self.emitted {
            return;
        }
        self.emitted = true;

        let duration = self.start.elapsed();
        metrics::record_request(self.method.as_str(), status.as_u16(), duration);

        let entry = self.access_log.record(
            self.method.clone(),
            std::mem::take(&mut self.path),
            status,
            self.trace_id.take(),
            &self.headers,
            duration,
        );
        self.access_log.emit(&entry);
    }
}

impl Drop for PendingEntry {
    fn drop(&mut self) {
        if !self.emitted {
            tracing::debug!(path = %self.path, "Request dropped before a response was produced");
            let status = StatusCode::from_u16(CLIENT_CLOSED_REQUEST)
                .unwrap_or(StatusCode::REQUEST_TIMEOUT);
            self.complete(status);
        }
    }
}

/// Logging stage: wraps the rest of the chain and emits exactly one entry per
/// request, whatever stage produced the response, including requests the
/// client abandoned mid-flight.
pub async fn access_log_middleware(
    State(state): State<LoggingState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let trace_id = req.trace_id().cloned();

    tracing::debug!("Request started");
    let mut pending = PendingEntry {
        access_log: Arc::clone(&state.access_log),
        method: method.clone(),
        path: path.clone(),
        headers: req.headers().clone(),
        trace_id: trace_id.clone(),
        start: Instant::now(),
        emitted: false,
    };
    let guard = state.in_flight.track(trace_id, method, path);

    let response = next.run(req).await;
    drop(guard);

    pending.complete(response.status());
    response
}
