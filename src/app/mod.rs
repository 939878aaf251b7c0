//! Example API assembled from configuration.
//!
//! # Layout
//! ```text
//! {api.base_path}                        MultiRouter
//!   {api.version_path}                   CORS, bearer auth, permission guard
//!     GET    /users/:id                  public
//!     GET    /admin/users                VIEW_USERS
//!     DELETE /admin/users/:id            DELETE_USERS
//!   {api.health_path}                    public
//!     GET    /
//! ```

pub mod permissions;
pub mod users;

use axum::http::Method;
use std::time::Duration;
use url::Url;

use crate::config::schema::{AuthConfig, CorsConfig, ServiceConfig};
use crate::health::health_router;
use crate::http::request::X_REQUEST_ID;
use crate::lifecycle::StartupError;
use crate::routing::{MultiRouter, Router, RouterBuilder};
use crate::security::access_control::{GrantTable, PermissionGuard};
use crate::security::auth::{BearerAuth, HttpIdentityProvider, StaticTokens};
use crate::security::cors::{CorsError, CorsPolicy};

use self::permissions::{DELETE_USERS, VIEW_USERS};

/// Map the CORS section onto a validated policy.
pub fn cors_policy(config: &CorsConfig) -> Result<CorsPolicy, CorsError> {
    let methods = config
        .allowed_methods
        .iter()
        .map(|m| Method::from_bytes(m.as_bytes()).map_err(|_| CorsError::InvalidMethod(m.clone())))
        .collect::<Result<Vec<_>, _>>()?;

    let mut builder = CorsPolicy::builder()
        .allowed_origins(config.allowed_origins.iter().cloned())
        .allowed_methods(methods)
        .allowed_headers(config.allowed_headers.iter().cloned())
        .allow_credentials(config.allow_credentials)
        .always_on(config.always_on);
    if config.max_age_secs > 0 {
        builder = builder.max_age(config.max_age_secs);
    }
    builder.build()
}

fn with_auth(
    builder: RouterBuilder,
    auth: &AuthConfig,
    config: &ServiceConfig,
) -> Result<RouterBuilder, StartupError> {
    let grants = auth
        .grants
        .iter()
        .fold(GrantTable::new(auth.default_grants), |table, (user, set)| {
            table.grant(user.clone(), *set)
        });
    let builder = builder.permissions(PermissionGuard::new(grants));

    Ok(match &auth.identity_service_url {
        Some(raw) => {
            let provider = HttpIdentityProvider::new(
                Url::parse(raw)?,
                Duration::from_millis(config.timeouts.identity_ms),
            );
            let provider = match config.observability.trace_header.parse() {
                Ok(header) => provider.with_trace_header(header),
                Err(_) => {
                    tracing::warn!(default = X_REQUEST_ID, "Invalid trace header for identity calls");
                    provider
                }
            };
            tracing::info!(url = %raw, "Using external identity service");
            builder.authorization(BearerAuth::new(provider))
        }
        None => builder.authorization(BearerAuth::new(StaticTokens::new(auth.tokens.clone()))),
    })
}

/// Versioned user API router.
pub fn api_router(config: &ServiceConfig) -> Result<Router, StartupError> {
    let mut builder = Router::builder(config.api.version_path.as_str());
    if config.cors.enabled {
        builder = builder.cors(cors_policy(&config.cors).map_err(crate::routing::RoutingError::from)?);
    }
    let builder = with_auth(builder, &config.auth, config)?;

    Ok(builder
        .route(Method::GET, "/users/:id", users::get_user)?
        .protected_route(Method::GET, "/admin/users", users::list_users, [VIEW_USERS])?
        .protected_route(Method::DELETE, "/admin/users/:id", users::delete_user, [DELETE_USERS])?
        .build()?)
}

/// Every router of the service, composed under the shared base path.
pub fn build_api(config: &ServiceConfig) -> Result<MultiRouter, StartupError> {
    let routers = vec![
        api_router(config)?,
        health_router(&config.api.health_path)?,
    ];
    Ok(MultiRouter::new(config.api.base_path.as_str(), routers)?)
}
