//! Composition of several routers under one shared base path.
//!
//! # Responsibilities
//! - Compute every member's full base path (outer + inner)
//! - Reject equal or nested full base paths, eagerly, at construction
//! - Hand each request to the owning router with its path made relative
//!
//! # Design Decisions
//! - Nested base paths are rejected rather than resolved by precedence, so
//!   every request path has at most one owner
//! - Longest-prefix selection on segment boundaries (`/api` never owns `/apix`)

use axum::{
    body::Body,
    http::Request,
    response::{IntoResponse, Response},
};
use std::fmt;
use std::sync::Arc;

use crate::http::request::{TraceId, TraceIdExt};
use crate::http::response::ApiError;
use crate::routing::context::RouteContext;
use crate::routing::error::RoutingError;
use crate::routing::router::{join_paths, normalize_base_path, strip_base, RouteInfo, Router};

struct Member {
    /// Normalized full base path (`""` for the root).
    full_path: String,
    router: Router,
}

/// Immutable dispatch table over member routers.
pub struct MultiRouter {
    base_path: String,
    members: Vec<Member>,
}

impl MultiRouter {
    pub fn new(base_path: impl Into<String>, routers: Vec<Router>) -> Result<Self, RoutingError> {
        let base_path = normalize_base_path(&base_path.into())?;

        let members: Vec<Member> = routers
            .into_iter()
            .map(|router| Member {
                full_path: join_base(&base_path, &router),
                router,
            })
            .collect();

        let mut conflicts = Vec::new();
        for (i, a) in members.iter().enumerate() {
            for b in &members[i + 1..] {
                if overlaps(&a.full_path, &b.full_path) {
                    conflicts.push((display_path(&a.full_path), display_path(&b.full_path)));
                }
            }
        }
        if !conflicts.is_empty() {
            return Err(RoutingError::PathConflict { conflicts });
        }

        Ok(Self { base_path, members })
    }

    pub fn base_path(&self) -> &str {
        if self.base_path.is_empty() {
            "/"
        } else {
            &self.base_path
        }
    }

    /// Route a request to the member owning the longest matching base path.
    pub async fn dispatch(&self, req: Request<Body>) -> Response {
        let path = req.uri().path().to_string();

        let owner = self
            .members
            .iter()
            .filter_map(|m| strip_base(&path, &m.full_path).map(|rest| (m, rest)))
            .max_by_key(|(m, _)| m.full_path.len());

        let Some((member, relative)) = owner else {
            tracing::debug!(path = %path, "No router owns path");
            return ApiError::NotFound.into_response();
        };

        let trace_id = req.trace_id().cloned().unwrap_or_else(TraceId::generate);
        member
            .router
            .route_request(relative, req, RouteContext::new(trace_id))
            .await
    }

    /// Routes of every member, in member order, with full paths.
    pub fn list_routes(&self) -> impl Iterator<Item = RouteInfo> + '_ {
        self.members.iter().flat_map(move |m| {
            m.router.list_routes().map(move |route| RouteInfo {
                path: join_paths(&self.base_path, &route.path),
                method: route.method,
            })
        })
    }

    /// Wrap in an axum router that sends every request through `dispatch`.
    pub fn into_router(self) -> axum::Router {
        let shared = Arc::new(self);
        axum::Router::new().fallback(move |req: Request<Body>| {
            let shared = Arc::clone(&shared);
            async move { shared.dispatch(req).await }
        })
    }
}

impl fmt::Debug for MultiRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiRouter")
            .field("base_path", &self.base_path())
            .field("members", &self.members.iter().map(|m| display_path(&m.full_path)).collect::<Vec<_>>())
            .finish()
    }
}

fn join_base(outer: &str, router: &Router) -> String {
    match router.base_path() {
        "/" => outer.to_string(),
        inner => format!("{outer}{inner}"),
    }
}

/// Equal, or one is an ancestor of the other on a segment boundary.
fn overlaps(a: &str, b: &str) -> bool {
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    strip_base(long, short).is_some()
}

fn display_path(path: &str) -> String {
    if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    }
}
