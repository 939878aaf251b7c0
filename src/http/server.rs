//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Wrap the composed routers with the outer middleware stack
//! - Bind to a listener and serve HTTP/1.1
//! - Stop accepting on shutdown and drain in-flight requests, bounded by the
//!   drain timeout
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → trace_id_middleware (outermost)
//!     → access_log_middleware
//!     → CatchPanicLayer (handler panic → 500, still logged)
//!     → TimeoutLayer → RequestBodyLimitLayer
//!     → MultiRouter::dispatch (fallback)
//! ```

use axum::{
    http::HeaderName,
    middleware,
    response::{IntoResponse, Response},
    Router,
};
use std::any::Any;
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Notify};
use tower_http::{
    catch_panic::CatchPanicLayer, limit::RequestBodyLimitLayer, timeout::TimeoutLayer,
};

use crate::config::schema::ServiceConfig;
use crate::http::request::{trace_id_middleware, TraceConfig};
use crate::http::response::ApiError;
use crate::lifecycle::drain::InFlightRequests;
use crate::lifecycle::shutdown;
use crate::observability::logging::{access_log_middleware, AccessLog, LoggingState};
use crate::routing::MultiRouter;

/// HTTP server for the composed API.
pub struct HttpServer {
    app: Router,
    trace: Arc<TraceConfig>,
    access_log: Arc<AccessLog>,
    in_flight: InFlightRequests,
    request_timeout: Duration,
    max_body_size: usize,
    drain_timeout: Duration,
}

impl HttpServer {
    pub fn new(config: &ServiceConfig, api: MultiRouter) -> Self {
        let trace = match HeaderName::from_bytes(config.observability.trace_header.as_bytes()) {
            Ok(header) => TraceConfig { header },
            Err(_) => {
                tracing::warn!(
                    header = %config.observability.trace_header,
                    "Invalid trace header, using default"
                );
                TraceConfig::default()
            }
        };

        Self {
            app: api.into_router(),
            trace: Arc::new(trace),
            access_log: Arc::new(AccessLog::new()),
            in_flight: InFlightRequests::new(),
            request_timeout: Duration::from_secs(config.timeouts.request_secs),
            max_body_size: config.security.max_body_size,
            drain_timeout: Duration::from_secs(config.shutdown.drain_timeout_secs),
        }
    }

    /// Replace the default access log (tracing sink, global redaction).
    pub fn with_access_log(mut self, access_log: AccessLog) -> Self {
        self.access_log = Arc::new(access_log);
        self
    }

    pub fn in_flight(&self) -> &InFlightRequests {
        &self.in_flight
    }

    /// The fully layered router, usable directly with `tower::ServiceExt`.
    #[allow(deprecated)]
    pub fn router(&self) -> Router {
        let logging = LoggingState {
            access_log: Arc::clone(&self.access_log),
            in_flight: self.in_flight.clone(),
        };

        self.app
            .clone()
            .layer(RequestBodyLimitLayer::new(self.max_body_size))
            .layer(TimeoutLayer::new(self.request_timeout))
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(middleware::from_fn_with_state(logging, access_log_middleware))
            .layer(middleware::from_fn_with_state(
                Arc::clone(&self.trace),
                trace_id_middleware,
            ))
    }

    /// Serve until `shutdown` fires, then drain.
    ///
    /// Returns once every in-flight request has finished, or when the drain
    /// timeout elapses; in the latter case the unfinished requests are logged
    /// as incomplete.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let draining = Arc::new(Notify::new());
        let drain_started = Arc::clone(&draining);

        let serve = axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                shutdown::wait(shutdown_rx).await;
                tracing::info!("Stopped accepting connections, draining");
                drain_started.notify_one();
            })
            .into_future();

        let deadline = async {
            draining.notified().await;
            tokio::time::sleep(self.drain_timeout).await;
        };

        tokio::select! {
            result = serve => {
                result?;
                tracing::info!("HTTP server stopped");
            }
            _ = deadline => {
                let incomplete = self.in_flight.log_incomplete();
                tracing::warn!(
                    incomplete,
                    drain_timeout_secs = self.drain_timeout.as_secs(),
                    "Drain timeout elapsed, abandoning remaining requests"
                );
            }
        }
        Ok(())
    }
}

/// Turn a handler panic into a JSON 500 so the logging stage records it.
fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    tracing::error!(panic = %message, "Request handler panicked");
    ApiError::Internal.into_response()
}
