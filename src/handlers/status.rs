//! Status and health check handlers.
//!
//! - `/health` - liveness, always 200 while the process serves HTTP
//! - `/ready` - 200 once the browser subsystem is initialized and the service
//!   is not shutting down, 503 otherwise
//! - `/status` - uptime, capture counters and latency percentiles
//!
//! # Example Response
//!
//! ```json
//! {
//!   "version": "0.1.0",
//!   "name": "rendershot",
//!   "uptime_seconds": 3600,
//!   "captures_succeeded": 1024,
//!   "captures_failed": 3,
//!   "ready": true,
//!   "shutting_down": false,
//!   "latency": {
//!     "p50_ms": 4210.0,
//!     "p95_ms": 12850.0,
//!     "p99_ms": 15010.0,
//!     "total_requests": 1027,
//!     "mean_ms": 5120.4,
//!     "max_ms": 30500.0
//!   },
//!   "status": "running",
//!   "timestamp": "2026-01-01T12:00:00+00:00"
//! }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use hdrhistogram::Histogram;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::AppState;

/// Server version from Cargo.toml
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Server name from Cargo.toml
pub const SERVER_NAME: &str = env!("CARGO_PKG_NAME");

/// Health or readiness probe body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `healthy`, `ready` or `not_ready`
    pub status: String,
}

impl HealthResponse {
    fn new(status: &str) -> Self {
        Self {
            status: status.to_string(),
        }
    }
}

/// Detailed server status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Server version (from Cargo.toml)
    pub version: String,
    /// Server name
    pub name: String,
    /// Server uptime in seconds
    pub uptime_seconds: u64,
    /// Captures that returned an image
    pub captures_succeeded: u64,
    /// Captures that returned an error
    pub captures_failed: u64,
    /// Whether new captures can be served
    pub ready: bool,
    /// Whether graceful shutdown has begun
    pub shutting_down: bool,
    /// Capture latency statistics
    pub latency: LatencyMetrics,
    /// Always "running" if responding
    pub status: String,
    /// RFC 3339 timestamp of when status was generated
    pub timestamp: String,
}

/// Capture latency percentiles
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyMetrics {
    /// 50th percentile (median) latency in milliseconds
    pub p50_ms: f64,
    /// 95th percentile latency in milliseconds
    pub p95_ms: f64,
    /// 99th percentile latency in milliseconds
    pub p99_ms: f64,
    /// Total number of captures recorded
    pub total_requests: u64,
    /// Mean latency in milliseconds
    pub mean_ms: f64,
    /// Maximum latency recorded in milliseconds
    pub max_ms: f64,
}

/// Thread-safe latency histogram in milliseconds.
///
/// Auto-resizing, so the 600s capture ceiling and anything a slow page
/// overshoots it by are all recorded.
#[derive(Debug)]
pub struct LatencyHistogram {
    inner: RwLock<Histogram<u64>>,
}

impl LatencyHistogram {
    /// Create an empty histogram with 3 significant figures
    pub fn new() -> Self {
        let histogram =
            Histogram::new(3).expect("3 significant figures is a valid histogram precision");
        Self {
            inner: RwLock::new(histogram),
        }
    }

    /// Record a duration
    pub fn record(&self, duration: Duration) {
        let ms = (duration.as_millis() as u64).max(1);
        let _ = self.inner.write().record(ms);
    }

    /// Number of recorded values
    pub fn count(&self) -> u64 {
        self.inner.read().len()
    }

    /// Percentile summary
    pub fn metrics(&self) -> LatencyMetrics {
        let hist = self.inner.read();
        LatencyMetrics {
            p50_ms: hist.value_at_percentile(50.0) as f64,
            p95_ms: hist.value_at_percentile(95.0) as f64,
            p99_ms: hist.value_at_percentile(99.0) as f64,
            total_requests: hist.len(),
            mean_ms: hist.mean(),
            max_ms: hist.max() as f64,
        }
    }
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

/// Capture counters shared by the handlers
#[derive(Debug)]
pub struct ServiceStats {
    start_time: Instant,
    captures_succeeded: AtomicU64,
    captures_failed: AtomicU64,
    latency: LatencyHistogram,
}

impl ServiceStats {
    /// Fresh counters starting now
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            captures_succeeded: AtomicU64::new(0),
            captures_failed: AtomicU64::new(0),
            latency: LatencyHistogram::new(),
        }
    }

    /// Seconds since start
    #[inline]
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Record one finished capture
    pub fn record_capture(&self, elapsed: Duration, succeeded: bool) {
        self.latency.record(elapsed);
        let counter = if succeeded {
            &self.captures_succeeded
        } else {
            &self.captures_failed
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Captures that returned an image
    #[inline]
    pub fn captures_succeeded(&self) -> u64 {
        self.captures_succeeded.load(Ordering::Relaxed)
    }

    /// Captures that returned an error
    #[inline]
    pub fn captures_failed(&self) -> u64 {
        self.captures_failed.load(Ordering::Relaxed)
    }

    /// Latency summary
    pub fn latency_metrics(&self) -> LatencyMetrics {
        self.latency.metrics()
    }
}

impl Default for ServiceStats {
    fn default() -> Self {
        Self::new()
    }
}

/// `GET /health`
#[instrument(skip_all)]
pub async fn health_handler() -> impl IntoResponse {
    debug!("Health check requested");
    (StatusCode::OK, Json(HealthResponse::new("healthy")))
}

/// `GET /ready`
#[instrument(skip_all)]
pub async fn readiness_handler(State(state): State<AppState>) -> impl IntoResponse {
    debug!("Readiness check requested");
    if state.service.is_ready() {
        (StatusCode::OK, Json(HealthResponse::new("ready")))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse::new("not_ready")),
        )
    }
}

/// `GET /status`
#[instrument(skip_all)]
pub async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    debug!("Status check requested");

    let response = StatusResponse {
        version: SERVER_VERSION.to_string(),
        name: SERVER_NAME.to_string(),
        uptime_seconds: state.stats.uptime_seconds(),
        captures_succeeded: state.stats.captures_succeeded(),
        captures_failed: state.stats.captures_failed(),
        ready: state.service.is_ready(),
        shutting_down: state.service.is_shutting_down(),
        latency: state.stats.latency_metrics(),
        status: "running".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    };

    (StatusCode::OK, Json(response))
}
