//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Initialize observability → Build routers
//!     → Start listener
//!
//! Shutdown (shutdown.rs, drain.rs):
//!     Signal received → Stop accepting → Drain in-flight requests → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then observability, then listeners
//! - Ordered shutdown: stop accept, drain, close
//! - Shutdown has timeout: requests past the deadline are logged and abandoned

pub mod drain;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use drain::InFlightRequests;
pub use shutdown::Shutdown;
pub use startup::StartupError;
