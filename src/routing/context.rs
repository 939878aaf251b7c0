//! Per-request routing state.

use std::str::FromStr;
use std::sync::Arc;

use crate::http::request::TraceId;
use crate::http::response::ApiError;
use crate::security::permission::PermissionSet;

/// Path parameters extracted by the matcher, in pattern order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: Vec<(Arc<str>, String)>,
}

impl Params {
    pub(crate) fn push(&mut self, name: Arc<str>, value: &str) {
        self.entries.push((name, value.to_string()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_ref(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// State carried alongside a request through the router's stages.
///
/// Created fresh for every request. The trace id is fixed at creation; the
/// user id stays empty until an authorization stage sets it.
#[derive(Debug, Clone)]
pub struct RouteContext {
    trace_id: TraceId,
    params: Params,
    user_id: Option<String>,
    required: PermissionSet,
}

impl RouteContext {
    pub fn new(trace_id: TraceId) -> Self {
        Self {
            trace_id,
            params: Params::default(),
            user_id: None,
            required: PermissionSet::empty(),
        }
    }

    pub fn trace_id(&self) -> &TraceId {
        &self.trace_id
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// A path parameter, or `BadRequest` if the route declares no such name.
    pub fn param(&self, name: &str) -> Result<&str, ApiError> {
        self.params
            .get(name)
            .ok_or_else(|| ApiError::BadRequest(format!("missing path parameter '{name}'")))
    }

    /// Parse a path parameter, mapping parse failures to `BadRequest`.
    pub fn parse_param<T: FromStr>(&self, name: &str) -> Result<T, ApiError> {
        let raw = self.param(name)?;
        raw.parse()
            .map_err(|_| ApiError::BadRequest(format!("path parameter '{name}' is invalid: '{raw}'")))
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn set_user_id(&mut self, user_id: impl Into<String>) {
        self.user_id = Some(user_id.into());
    }

    /// Permissions the matched route requires.
    pub fn required_permissions(&self) -> &PermissionSet {
        &self.required
    }

    /// True if `granted` covers everything the matched route requires.
    pub fn has_required_permissions(&self, granted: &PermissionSet) -> bool {
        self.required.is_subset(granted)
    }

    pub(crate) fn bind_route(&mut self, params: Params, required: PermissionSet) {
        self.params = params;
        self.required = required;
    }
}
