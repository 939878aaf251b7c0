//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, outer middleware, drain)
//!     → request.rs (trace id assignment, request span)
//!     → [routing layer resolves router and route]
//!     → response.rs (uniform error responses)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{TraceId, TraceIdExt, X_REQUEST_ID};
pub use response::ApiError;
pub use server::HttpServer;
