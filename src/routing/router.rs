//! Route registration and dispatch for one base path.
//!
//! # Responsibilities
//! - Collect (method, pattern) bindings and reject conflicts at setup time
//! - Resolve method + path to a binding, or produce 404 / 405
//! - Answer CORS preflights before any authorization runs
//! - Run the binding's stage chain (authorization, permission) and handler
//!
//! # Design Decisions
//! - Built once through [`RouterBuilder`], immutable afterwards (no locks)
//! - Each binding's stage list is precomputed at build time
//! - Public routes skip every stage; protected routes must be guardable,
//!   checked at build time, not request time
//! - O(n) scan over bindings (route tables are small); most specific match wins
//!
//! # Data Flow
//! ```text
//! dispatch(request)
//!     → strip base path
//!     → scan bindings (matcher.rs)
//!         ├─ no path match          → 404
//!         ├─ OPTIONS + CORS policy  → 204 preflight
//!         ├─ path match, no method  → 405 + Allow
//!         └─ match                  → RouteContext ← params, required perms
//!                                   → Next::run (auth → permission → handler)
//!     → CORS decoration
//! ```

use axum::{
    body::Body,
    http::{HeaderMap, Method, Request},
    response::{IntoResponse, Response},
};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::http::request::{TraceId, TraceIdExt};
use crate::http::response::ApiError;
use crate::routing::context::{Params, RouteContext};
use crate::routing::error::RoutingError;
use crate::routing::handler::{Handler, Middleware, Next};
use crate::routing::matcher::RoutePattern;
use crate::security::cors::CorsPolicy;
use crate::security::permission::PermissionSet;

struct Binding {
    method: Method,
    pattern: RoutePattern,
    handler: Arc<dyn Handler>,
    required: PermissionSet,
    protected: bool,
    stages: Vec<Arc<dyn Middleware>>,
}

/// One registered route, as reported by `list_routes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteInfo {
    pub method: Method,
    pub path: String,
}

impl fmt::Display for RouteInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// Builder for [`Router`]. All validation happens in `register` and `build`.
pub struct RouterBuilder {
    base_path: String,
    cors: Option<CorsPolicy>,
    authorization: Option<Arc<dyn Middleware>>,
    permissions: Option<Arc<dyn Middleware>>,
    bindings: Vec<Binding>,
}

impl RouterBuilder {
    pub fn new(base_path: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            cors: None,
            authorization: None,
            permissions: None,
            bindings: Vec::new(),
        }
    }

    pub fn cors(mut self, policy: CorsPolicy) -> Self {
        self.cors = Some(policy);
        self
    }

    /// Stage that validates credentials and sets the identity.
    pub fn authorization(mut self, stage: impl Middleware + 'static) -> Self {
        self.authorization = Some(Arc::new(stage));
        self
    }

    /// Stage that checks the route's required permissions.
    pub fn permissions(mut self, stage: impl Middleware + 'static) -> Self {
        self.permissions = Some(Arc::new(stage));
        self
    }

    /// Register a binding. `None` makes the route public; `Some(set)` makes it
    /// protected, requiring `set` (possibly empty) after authorization.
    pub fn register(
        mut self,
        method: Method,
        pattern: &str,
        handler: impl Handler,
        required: Option<PermissionSet>,
    ) -> Result<Self, RoutingError> {
        let pattern = RoutePattern::parse(pattern)?;

        if let Some(existing) = self
            .bindings
            .iter()
            .find(|b| b.method == method && b.pattern.same_shape(&pattern))
        {
            return Err(RoutingError::RouteConflict {
                method,
                pattern: pattern.as_str().to_string(),
                existing: existing.pattern.as_str().to_string(),
            });
        }

        self.bindings.push(Binding {
            method,
            pattern,
            handler: Arc::new(handler),
            required: required.unwrap_or_default(),
            protected: required.is_some(),
            stages: Vec::new(),
        });
        Ok(self)
    }

    pub fn route(self, method: Method, pattern: &str, handler: impl Handler) -> Result<Self, RoutingError> {
        self.register(method, pattern, handler, None)
    }

    pub fn protected_route(
        self,
        method: Method,
        pattern: &str,
        handler: impl Handler,
        required: impl Into<PermissionSet>,
    ) -> Result<Self, RoutingError> {
        self.register(method, pattern, handler, Some(required.into()))
    }

    pub fn build(mut self) -> Result<Router, RoutingError> {
        let base_path = normalize_base_path(&self.base_path)?;

        for binding in &mut self.bindings {
            if !binding.protected {
                continue;
            }
            let missing = match (&self.authorization, &self.permissions) {
                (None, _) => Some("authorization"),
                (Some(_), None) if !binding.required.is_empty() => Some("permission"),
                _ => None,
            };
            if let Some(missing) = missing {
                return Err(RoutingError::UnguardedRoute {
                    method: binding.method.clone(),
                    pattern: binding.pattern.as_str().to_string(),
                    base_path: self.base_path.clone(),
                    missing,
                });
            }
            binding
                .stages
                .extend(self.authorization.iter().chain(self.permissions.iter()).cloned());
        }

        Ok(Router {
            base_path,
            cors: self.cors,
            bindings: self.bindings,
        })
    }
}

impl fmt::Debug for RouterBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterBuilder")
            .field("base_path", &self.base_path)
            .field("routes", &self.bindings.len())
            .finish()
    }
}

/// Immutable set of bindings under one base path.
pub struct Router {
    /// Normalized: empty for the root, otherwise `/seg[/seg..]` without a
    /// trailing slash.
    base_path: String,
    cors: Option<CorsPolicy>,
    bindings: Vec<Binding>,
}

impl Router {
    pub fn builder(base_path: impl Into<String>) -> RouterBuilder {
        RouterBuilder::new(base_path)
    }

    pub fn base_path(&self) -> &str {
        if self.base_path.is_empty() {
            "/"
        } else {
            &self.base_path
        }
    }

    /// Dispatch a request whose path still includes this router's base path.
    pub async fn dispatch(&self, req: Request<Body>) -> Response {
        let path = req.uri().path().to_string();
        let Some(relative) = strip_base(&path, &self.base_path) else {
            return ApiError::NotFound.into_response();
        };
        let trace_id = req.trace_id().cloned().unwrap_or_else(TraceId::generate);
        self.route_request(relative, req, RouteContext::new(trace_id)).await
    }

    /// Dispatch with `path` already relative to this router's base path.
    pub(crate) async fn route_request(
        &self,
        path: &str,
        req: Request<Body>,
        mut ctx: RouteContext,
    ) -> Response {
        let request_headers: Option<HeaderMap> = self.cors.as_ref().map(|_| req.headers().clone());

        let method = req.method().clone();
        let mut allow: Vec<Method> = Vec::new();
        let mut best: Option<(&Binding, Params)> = None;

        for binding in &self.bindings {
            let Some(params) = binding.pattern.matches(path) else {
                continue;
            };
            if !allow.contains(&binding.method) {
                allow.push(binding.method.clone());
            }
            if binding.method != method {
                continue;
            }
            let more_specific = match &best {
                Some((current, _)) => binding.pattern.specificity_cmp(&current.pattern) == Ordering::Greater,
                None => true,
            };
            if more_specific {
                best = Some((binding, params));
            }
        }

        let mut response = match best {
            Some((binding, params)) => {
                ctx.bind_route(params, binding.required);
                Next::new(&binding.stages, binding.handler.as_ref())
                    .run(req, ctx)
                    .await
            }
            None if allow.is_empty() => ApiError::NotFound.into_response(),
            None => match (&self.cors, &request_headers) {
                (Some(cors), Some(headers)) if CorsPolicy::is_preflight(&method, headers) => {
                    tracing::debug!(trace_id = %ctx.trace_id(), path = %path, "Answering CORS preflight");
                    return cors.preflight_response(headers);
                }
                _ => ApiError::MethodNotAllowed { allow }.into_response(),
            },
        };

        if let (Some(cors), Some(headers)) = (&self.cors, &request_headers) {
            cors.apply(headers, &mut response);
        }
        response
    }

    /// Every binding as (method, full path), in registration order.
    pub fn list_routes(&self) -> impl Iterator<Item = RouteInfo> + '_ {
        self.bindings.iter().map(move |b| RouteInfo {
            method: b.method.clone(),
            path: join_paths(&self.base_path, b.pattern.as_str()),
        })
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("base_path", &self.base_path())
            .field("routes", &self.bindings.len())
            .field("cors", &self.cors.is_some())
            .finish()
    }
}

/// Validate a base path and return its normalized form (`""` for root).
pub(crate) fn normalize_base_path(path: &str) -> Result<String, RoutingError> {
    let invalid = |reason: &str| RoutingError::InvalidBasePath {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    if path.is_empty() || path == "/" {
        return Ok(String::new());
    }
    if !path.starts_with('/') {
        return Err(invalid("base path must start with '/'"));
    }
    let trimmed = path.strip_suffix('/').unwrap_or(path);
    for segment in trimmed[1..].split('/') {
        if segment.is_empty() {
            return Err(invalid("empty path segment"));
        }
        if segment.starts_with(':') || segment.contains(['{', '}']) {
            return Err(invalid("base paths cannot contain parameters"));
        }
    }
    Ok(trimmed.to_string())
}

/// Strip a normalized base path from a request path on a segment boundary.
pub(crate) fn strip_base<'a>(path: &'a str, base: &str) -> Option<&'a str> {
    if base.is_empty() {
        return Some(path);
    }
    let rest = path.strip_prefix(base)?;
    if rest.is_empty() {
        Some("/")
    } else if rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}

pub(crate) fn join_paths(base: &str, path: &str) -> String {
    match (base.is_empty(), path == "/") {
        (true, _) => path.to_string(),
        (false, true) => base.to_string(),
        (false, false) => format!("{base}{path}"),
    }
}
