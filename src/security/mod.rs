//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Matched route (per router):
//!     → cors.rs (preflight answered here, before any credential check)
//!     → auth.rs (bearer token → user id, or 401)
//!     → access_control.rs (required ⊆ granted, or 403)
//!     → handler
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any security check failure, including provider errors
//! - Stages are values behind the `Middleware` trait, chosen per router
//! - Permissions are small integer tags held in a fixed-size bitset

pub mod access_control;
pub mod auth;
pub mod cors;
pub mod permission;

pub use access_control::{GrantTable, PermissionGuard, PermissionLookup};
pub use auth::{BearerAuth, HttpIdentityProvider, IdentityProvider, Public, StaticTokens};
pub use cors::{CorsError, CorsPolicy};
pub use permission::{Permission, PermissionSet};
