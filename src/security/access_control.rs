//! Permission stage.
//! Enforces the permissions a route was registered with.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::Request,
    response::{IntoResponse, Response},
};
use std::collections::HashMap;

use crate::http::response::ApiError;
use crate::routing::context::RouteContext;
use crate::routing::handler::{Middleware, Next};
use crate::security::permission::PermissionSet;

/// Source of the permissions granted to a user.
#[async_trait]
pub trait PermissionLookup: Send + Sync {
    async fn lookup_permissions(&self, user_id: &str) -> PermissionSet;
}

/// In-memory grants: explicit per-user sets, falling back to a default set.
#[derive(Debug, Clone, Default)]
pub struct GrantTable {
    default: PermissionSet,
    per_user: HashMap<String, PermissionSet>,
}

impl GrantTable {
    pub fn new(default: PermissionSet) -> Self {
        Self {
            default,
            per_user: HashMap::new(),
        }
    }

    pub fn grant(mut self, user_id: impl Into<String>, permissions: PermissionSet) -> Self {
        self.per_user.insert(user_id.into(), permissions);
        self
    }

    pub fn permissions_for(&self, user_id: &str) -> PermissionSet {
        self.per_user.get(user_id).copied().unwrap_or(self.default)
    }
}

#[async_trait]
impl PermissionLookup for GrantTable {
    async fn lookup_permissions(&self, user_id: &str) -> PermissionSet {
        self.permissions_for(user_id)
    }
}

/// Rejects with 403 unless the identified user holds every permission the
/// matched route requires. Routes requiring nothing pass straight through.
pub struct PermissionGuard<L> {
    lookup: L,
}

impl<L: PermissionLookup> PermissionGuard<L> {
    pub fn new(lookup: L) -> Self {
        Self { lookup }
    }
}

#[async_trait]
impl<L: PermissionLookup> Middleware for PermissionGuard<L> {
    async fn handle(&self, req: Request<Body>, ctx: RouteContext, next: Next<'_>) -> Response {
        if ctx.required_permissions().is_empty() {
            return next.run(req, ctx).await;
        }

        let Some(user_id) = ctx.user_id() else {
            tracing::debug!(trace_id = %ctx.trace_id(), "No identity at permission stage");
            return ApiError::Forbidden.into_response();
        };

        let granted = self.lookup.lookup_permissions(user_id).await;
        if ctx.has_required_permissions(&granted) {
            return next.run(req, ctx).await;
        }

        tracing::debug!(
            trace_id = %ctx.trace_id(),
            missing = %ctx.required_permissions().missing_from(&granted),
            "Insufficient permissions"
        );
        ApiError::Forbidden.into_response()
    }
}
