//! Sensitive header redaction for access logs.
//!
//! The process-wide redaction set is installed once at startup with
//! [`init_redaction`] and only read afterwards. Until then [`global`] returns
//! an empty set.

use axum::http::{HeaderMap, HeaderName};
use std::sync::OnceLock;

/// Placeholder written in place of a redacted header value.
pub const REDACTED: &str = "[REDACTED]";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RedactionError {
    #[error("redaction is already initialized")]
    AlreadyInitialized,

    #[error("invalid header name '{0}'")]
    InvalidHeader(String),
}

/// Set of header names whose values never reach a log sink.
#[derive(Debug, Clone, Default)]
pub struct Redactor {
    headers: Vec<HeaderName>,
}

static GLOBAL: OnceLock<Redactor> = OnceLock::new();
static EMPTY: Redactor = Redactor { headers: Vec::new() };

impl Redactor {
    /// Header names are matched case-insensitively.
    pub fn new<I, S>(names: I) -> Result<Self, RedactionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let headers = names
            .into_iter()
            .map(|name| {
                let name = name.as_ref();
                HeaderName::from_bytes(name.as_bytes())
                    .map_err(|_| RedactionError::InvalidHeader(name.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { headers })
    }

    pub fn is_redacted(&self, name: &HeaderName) -> bool {
        self.headers.contains(name)
    }

    /// Render headers in request order, with redacted values replaced.
    pub fn redact(&self, headers: &HeaderMap) -> Vec<(String, String)> {
        headers
            .iter()
            .map(|(name, value)| {
                let value = if self.is_redacted(name) {
                    REDACTED.to_string()
                } else {
                    String::from_utf8_lossy(value.as_bytes()).into_owned()
                };
                (name.as_str().to_string(), value)
            })
            .collect()
    }
}

/// Install the process-wide redaction set. Fails if called twice.
pub fn init_redaction(redactor: Redactor) -> Result<(), RedactionError> {
    GLOBAL
        .set(redactor)
        .map_err(|_| RedactionError::AlreadyInitialized)
}

/// The process-wide redaction set.
pub fn global() -> &'static Redactor {
    GLOBAL.get().unwrap_or(&EMPTY)
}
