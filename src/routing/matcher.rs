//! Route pattern parsing and path matching.
//!
//! # Responsibilities
//! - Parse `:name` / `{name}` route patterns into literal and parameter segments
//! - Match a concrete request path segment by segment
//! - Extract parameter values verbatim
//!
//! # Design Decisions
//! - Literal matching is case-sensitive
//! - Parameters match exactly one non-empty segment (no catch-all)
//! - Exactly one trailing slash is ignored, except on the root path
//! - Malformed patterns are rejected at registration, never at request time
//! - No regex, matching is a single linear pass over the segments

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::routing::context::Params;
use crate::routing::error::RoutingError;

/// One segment of a route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Param(Arc<str>),
}

impl Segment {
    pub fn is_param(&self) -> bool {
        matches!(self, Segment::Param(_))
    }
}

/// A parsed route pattern such as `/users/:id/posts`.
#[derive(Debug, Clone)]
pub struct RoutePattern {
    raw: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    /// Parse a pattern string.
    pub fn parse(pattern: &str) -> Result<Self, RoutingError> {
        let invalid = |reason: &str| RoutingError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        if !pattern.starts_with('/') {
            return Err(invalid("pattern must start with '/'"));
        }

        let mut segments = Vec::new();
        for raw in split_path(pattern) {
            let segment = if let Some(name) = raw.strip_prefix(':') {
                Segment::Param(param_name(name).map_err(|r| invalid(&r))?.into())
            } else if let Some(rest) = raw.strip_prefix('{') {
                let name = rest
                    .strip_suffix('}')
                    .ok_or_else(|| invalid("unterminated parameter placeholder"))?;
                Segment::Param(param_name(name).map_err(|r| invalid(&r))?.into())
            } else if raw.is_empty() {
                return Err(invalid("empty path segment"));
            } else if raw.contains(['{', '}']) {
                return Err(invalid("braces are only allowed around a whole segment"));
            } else {
                Segment::Literal(raw.to_string())
            };
            segments.push(segment);
        }

        let mut seen: Vec<&str> = Vec::new();
        for segment in &segments {
            if let Segment::Param(name) = segment {
                if seen.contains(&name.as_ref()) {
                    return Err(invalid(&format!("duplicate parameter name '{name}'")));
                }
                seen.push(name);
            }
        }

        Ok(Self {
            raw: pattern.to_string(),
            segments,
        })
    }

    /// The pattern exactly as registered.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Canonical form: one `/` between segments, parameters written as `:name`.
    pub fn canonical(&self) -> String {
        if self.segments.is_empty() {
            return "/".to_string();
        }
        let mut out = String::new();
        for segment in &self.segments {
            out.push('/');
            match segment {
                Segment::Literal(s) => out.push_str(s),
                Segment::Param(name) => {
                    out.push(':');
                    out.push_str(name);
                }
            }
        }
        out
    }

    /// Match a request path, returning the extracted parameters on success.
    pub fn matches(&self, path: &str) -> Option<Params> {
        let parts = split_path(path);
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = Params::default();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(expected) if expected == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(_) if part.is_empty() => return None,
                Segment::Param(name) => params.push(Arc::clone(name), part),
            }
        }
        Some(params)
    }

    /// Two patterns share a shape when they have the same segment count and the
    /// same literal at every literal position (parameter names are ignored).
    /// Such patterns can never be told apart by a request path.
    pub fn same_shape(&self, other: &RoutePattern) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|(a, b)| match (a, b) {
                    (Segment::Literal(x), Segment::Literal(y)) => x == y,
                    (Segment::Param(_), Segment::Param(_)) => true,
                    _ => false,
                })
    }

    /// Order two patterns that matched the same path; the more specific one is
    /// `Greater`. Left to right, the first literal-vs-parameter difference wins.
    pub fn specificity_cmp(&self, other: &RoutePattern) -> Ordering {
        for (a, b) in self.segments.iter().zip(&other.segments) {
            match (a.is_param(), b.is_param()) {
                (false, true) => return Ordering::Greater,
                (true, false) => return Ordering::Less,
                _ => {}
            }
        }
        Ordering::Equal
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Split a path into segments after trailing-slash normalization.
///
/// `/` and the empty string yield no segments. At most one trailing slash is
/// stripped, and only after the root check, so `//` is one empty segment.
/// Empty segments never match a literal or a parameter.
pub fn split_path(path: &str) -> Vec<&str> {
    let rest = path.strip_prefix('/').unwrap_or(path);
    if rest.is_empty() {
        return Vec::new();
    }
    let rest = rest.strip_suffix('/').unwrap_or(rest);
    rest.split('/').collect()
}

fn param_name(name: &str) -> Result<&str, String> {
    if name.is_empty() {
        return Err("empty parameter name".to_string());
    }
    if let Some(c) = name.chars().find(|c| !(c.is_ascii_alphanumeric() || *c == '_')) {
        return Err(format!("invalid character '{c}' in parameter name '{name}'"));
    }
    Ok(name)
}
