//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Every request:
//!     → http::request (trace id + request span)
//!     → logging.rs (access log entry, redacted via redaction.rs)
//!     → metrics.rs (counters, histograms, in-flight gauge)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Trace id flows through all log lines via the request span
//! - Redaction set is process-wide and read-only once serving starts

pub mod logging;
pub mod metrics;
pub mod redaction;

pub use logging::{AccessLog, LogEntry, LogSink, TracingSink};
pub use redaction::{init_redaction, Redactor, REDACTED};
