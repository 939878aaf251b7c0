//! User handlers. Mock data standing in for an external user store.

use axum::{body::Body, http::Request, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::http::response::ApiError;
use crate::routing::RouteContext;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
}

fn user(id: i64, name: &str, email: &str) -> User {
    User {
        id,
        name: name.to_string(),
        email: email.to_string(),
    }
}

/// `GET /users/:id` (public).
pub async fn get_user(_req: Request<Body>, ctx: RouteContext) -> Result<Json<User>, ApiError> {
    let id: i64 = ctx
        .parse_param("id")
        .map_err(|_| ApiError::BadRequest("User ID must be an integer".to_string()))?;
    Ok(Json(user(id, "John Doe", "john@example.com")))
}

/// `GET /admin/users` (requires view permission).
pub async fn list_users(_req: Request<Body>, ctx: RouteContext) -> Json<Vec<User>> {
    tracing::debug!(user_id = ?ctx.user_id(), "Listing users");
    Json(vec![
        user(1, "John Doe", "john@example.com"),
        user(2, "Jane Smith", "jane@example.com"),
    ])
}

/// `DELETE /admin/users/:id` (requires delete permission).
pub async fn delete_user(_req: Request<Body>, ctx: RouteContext) -> Result<StatusCode, ApiError> {
    let id: i64 = ctx
        .parse_param("id")
        .map_err(|_| ApiError::BadRequest("User ID must be an integer".to_string()))?;
    tracing::info!(user_id = ?ctx.user_id(), deleted = id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}
