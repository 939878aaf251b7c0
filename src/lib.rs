//! REST routing and middleware-composition engine.
//!
//! Routers bind (method, pattern) pairs to handlers under a base path, a
//! multi-router composes them under one shared prefix, and the outer stack
//! adds trace ids, access logging, timeouts and body limits.

pub mod app;
pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod security;

pub use config::schema::ServiceConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use routing::{MultiRouter, Router};
