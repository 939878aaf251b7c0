//! Authorization stage: credential validation.
//!
//! # Responsibilities
//! - Extract `Authorization: Bearer <token>` credentials
//! - Resolve the token to a user id through an [`IdentityProvider`]
//! - Set the identity on the route context, or short-circuit with 401
//!
//! # Design Decisions
//! - Providers are pluggable: static token table or an external HTTP service
//! - Provider failures are treated as rejected credentials (fail closed)
//! - The trace id is forwarded to the external service for correlation

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderName, Method, Request, StatusCode},
    response::{IntoResponse, Response},
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

use crate::http::request::{TraceId, X_REQUEST_ID};
use crate::http::response::ApiError;
use crate::routing::context::RouteContext;
use crate::routing::handler::{Middleware, Next};

const MAX_IDENTITY_RESPONSE_BYTES: usize = 64 * 1024;

/// Error talking to an identity provider.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("identity service timed out")]
    Timeout,

    #[error("identity service request failed: {0}")]
    Transport(String),

    #[error("identity service answered {0}")]
    UnexpectedStatus(StatusCode),

    #[error("identity service returned an invalid body: {0}")]
    InvalidResponse(String),
}

/// Resolves bearer tokens to user ids.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// `Ok(None)` means the credentials were checked and rejected.
    async fn verify(&self, token: &str, trace_id: &TraceId) -> Result<Option<String>, IdentityError>;
}

/// Stage that lets every request through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Public;

#[async_trait]
impl Middleware for Public {
    async fn handle(&self, req: Request<Body>, ctx: RouteContext, next: Next<'_>) -> Response {
        next.run(req, ctx).await
    }
}

/// Bearer-token authorization over an identity provider.
pub struct BearerAuth<P> {
    provider: P,
}

impl<P: IdentityProvider> BearerAuth<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<P: IdentityProvider> Middleware for BearerAuth<P> {
    async fn handle(&self, req: Request<Body>, mut ctx: RouteContext, next: Next<'_>) -> Response {
        let token = match extract_bearer(req.headers()) {
            Ok(token) => token.to_string(),
            Err(err) => {
                tracing::debug!(trace_id = %ctx.trace_id(), "Missing bearer credentials");
                return err.into_response();
            }
        };

        match self.provider.verify(&token, ctx.trace_id()).await {
            Ok(Some(user_id)) => {
                tracing::debug!(trace_id = %ctx.trace_id(), user_id = %user_id, "Authenticated");
                ctx.set_user_id(user_id);
                next.run(req, ctx).await
            }
            Ok(None) => {
                tracing::debug!(trace_id = %ctx.trace_id(), "Credentials rejected");
                ApiError::Unauthorized.into_response()
            }
            Err(e) => {
                tracing::warn!(trace_id = %ctx.trace_id(), error = %e, "Identity provider failed");
                ApiError::Unauthorized.into_response()
            }
        }
    }
}

/// Pull the token out of `Authorization: Bearer <token>`.
pub fn extract_bearer(headers: &HeaderMap) -> Result<&str, ApiError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(ApiError::Unauthorized)?
        .to_str()
        .map_err(|_| ApiError::Unauthorized)?;

    let token = value
        .strip_prefix("Bearer ")
        .ok_or(ApiError::Unauthorized)?
        .trim();

    if token.is_empty() {
        return Err(ApiError::Unauthorized);
    }
    Ok(token)
}

/// Fixed token -> user id table.
#[derive(Debug, Clone, Default)]
pub struct StaticTokens {
    tokens: HashMap<String, String>,
}

impl StaticTokens {
    pub fn new(tokens: HashMap<String, String>) -> Self {
        Self { tokens }
    }

    pub fn with_token(mut self, token: impl Into<String>, user_id: impl Into<String>) -> Self {
        self.tokens.insert(token.into(), user_id.into());
        self
    }
}

#[async_trait]
impl IdentityProvider for StaticTokens {
    async fn verify(&self, token: &str, _trace_id: &TraceId) -> Result<Option<String>, IdentityError> {
        Ok(self.tokens.get(token).cloned())
    }
}

#[derive(Deserialize)]
struct IdentityResponse {
    user_id: String,
}

/// Identity provider backed by an external HTTP service.
///
/// Sends `GET <endpoint>` with the caller's bearer token and the trace id.
/// `200 {"user_id": ".."}` accepts, `401`/`403` reject, anything else is an
/// error.
pub struct HttpIdentityProvider {
    endpoint: Url,
    client: Client<HttpConnector, Body>,
    timeout: Duration,
    trace_header: HeaderName,
}

impl HttpIdentityProvider {
    pub fn new(endpoint: Url, timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            endpoint,
            client,
            timeout,
            trace_header: HeaderName::from_static(X_REQUEST_ID),
        }
    }

    pub fn with_trace_header(mut self, header: HeaderName) -> Self {
        self.trace_header = header;
        self
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn verify(&self, token: &str, trace_id: &TraceId) -> Result<Option<String>, IdentityError> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(self.endpoint.as_str())
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(self.trace_header.clone(), trace_id.as_str())
            .body(Body::empty())
            .map_err(|e| IdentityError::Transport(e.to_string()))?;

        let response = tokio::time::timeout(self.timeout, self.client.request(request))
            .await
            .map_err(|_| IdentityError::Timeout)?
            .map_err(|e| IdentityError::Transport(e.to_string()))?;

        match response.status() {
            StatusCode::OK => {
                let body = Body::new(response.into_body());
                let bytes = axum::body::to_bytes(body, MAX_IDENTITY_RESPONSE_BYTES)
                    .await
                    .map_err(|e| IdentityError::InvalidResponse(e.to_string()))?;
                let identity: IdentityResponse = serde_json::from_slice(&bytes)
                    .map_err(|e| IdentityError::InvalidResponse(e.to_string()))?;
                Ok(Some(identity.user_id))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            other => Err(IdentityError::UnexpectedStatus(other)),
        }
    }
}
