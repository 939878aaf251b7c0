//! Liveness surface.
//!
//! A public router exposing `GET /` under its base path. It never touches
//! authorization and depends on nothing but basic dispatch.

use axum::{
    body::Body,
    http::{Method, Request},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::routing::{RouteContext, Router, RoutingError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    /// RFC 3339, UTC.
    pub time: String,
}

pub fn health_router(base_path: &str) -> Result<Router, RoutingError> {
    Router::builder(base_path)
        .route(Method::GET, "/", health)?
        .build()
}

async fn health(_req: Request<Body>, _ctx: RouteContext) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok".to_string(),
        time: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}
