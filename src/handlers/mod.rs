//! HTTP adapter
//!
//! ```text
//! HTTP Request ──> Axum Router ──> screenshot handlers ──> CaptureService
//!                       │                    │
//!                       ▼                    ▼
//!               health / ready /       ServiceStats
//!                    status
//! ```

pub mod screenshot;
pub mod status;

use std::sync::Arc;

use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::error::Error;
use crate::service::CaptureService;

pub use screenshot::{screenshot_get, screenshot_post};
pub use status::{health_handler, readiness_handler, status_handler, ServiceStats};

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    /// Capture pipeline
    pub service: Arc<CaptureService>,
    /// Capture counters
    pub stats: Arc<ServiceStats>,
}

impl AppState {
    /// State with fresh counters
    pub fn new(service: Arc<CaptureService>) -> Self {
        Self {
            service,
            stats: Arc::new(ServiceStats::new()),
        }
    }
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/screenshot", get(screenshot_get).post(screenshot_post))
        .route("/health", get(health_handler))
        .route("/ready", get(readiness_handler))
        .route("/status", get(status_handler))
        .with_state(state)
}

/// JSON error body
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Human-readable cause
    pub error: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}
