//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path, method)
//!     → multi_router.rs (longest base-path prefix → owning Router)
//!     → router.rs (method + pattern lookup, CORS preflight)
//!     → matcher.rs (segment match, parameter extraction)
//!     → handler.rs (authorization → permission → handler)
//!
//! Route Compilation (at startup):
//!     RouterBuilder::register(..) × n   (pattern parse, conflict check)
//!     → RouterBuilder::build()          (base path, guard checks)
//!     → MultiRouter::new(..)            (base path collisions)
//!     → Freeze as immutable dispatch tree
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (segment comparison only)
//! - Deterministic: same input always matches same route
//! - Every setup error surfaces before the listener binds

pub mod context;
pub mod error;
pub mod handler;
pub mod matcher;
pub mod multi_router;
pub mod router;

pub use context::{Params, RouteContext};
pub use error::RoutingError;
pub use handler::{Handler, Middleware, Next};
pub use matcher::RoutePattern;
pub use multi_router::MultiRouter;
pub use router::{RouteInfo, Router, RouterBuilder};
