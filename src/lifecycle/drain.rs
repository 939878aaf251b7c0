//! In-flight request tracking for graceful drain.
//!
//! # Responsibilities
//! - Register every request for the duration of its processing
//! - Report what is still running when the drain deadline passes
//!
//! # Design Decisions
//! - Lock-free registry (`DashMap`) keyed by a monotonically increasing id
//! - RAII guard: a request is removed from the registry when its guard drops,
//!   whether it completed normally or its task was cancelled

use axum::http::Method;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::http::request::TraceId;
use crate::observability::metrics;

#[derive(Debug, Clone)]
pub struct InFlightRequest {
    pub trace_id: Option<TraceId>,
    pub method: Method,
    pub path: String,
    pub started: Instant,
}

/// Registry of requests currently being served.
#[derive(Debug, Clone, Default)]
pub struct InFlightRequests {
    next_id: Arc<AtomicU64>,
    requests: Arc<DashMap<u64, InFlightRequest>>,
}

impl InFlightRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new request. It stays registered until the guard drops.
    pub fn track(&self, trace_id: Option<TraceId>, method: Method, path: String) -> InFlightGuard {
        // Relaxed is enough: the counter only has to hand out unique ids.
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.requests.insert(
            id,
            InFlightRequest {
                trace_id,
                method,
                path,
                started: Instant::now(),
            },
        );
        metrics::record_in_flight(self.requests.len());
        InFlightGuard {
            id,
            requests: Arc::clone(&self.requests),
        }
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn snapshot(&self) -> Vec<InFlightRequest> {
        self.requests.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Log every request still running; returns how many there were.
    pub fn log_incomplete(&self) -> usize {
        let pending = self.snapshot();
        for request in &pending {
            tracing::warn!(
                trace_id = %request.trace_id.as_ref().map(TraceId::as_str).unwrap_or("-"),
                method = %request.method,
                path = %request.path,
                elapsed_ms = request.started.elapsed().as_millis() as u64,
                "Request incomplete at drain deadline"
            );
        }
        pending.len()
    }
}

/// Removes its request from the registry when dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    id: u64,
    requests: Arc<DashMap<u64, InFlightRequest>>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.requests.remove(&self.id);
        metrics::record_in_flight(self.requests.len());
    }
}
