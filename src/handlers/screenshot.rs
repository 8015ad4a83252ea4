//! Screenshot endpoints
//!
//! `GET /screenshot?url=...` and `POST /screenshot` accept the same
//! [`CaptureParams`]; a successful capture is returned as raw image bytes.

use std::time::Instant;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{debug, instrument};

use super::AppState;
use crate::error::{Error, Result};
use crate::request::CaptureParams;

/// `GET /screenshot`
#[instrument(skip_all)]
pub async fn screenshot_get(
    State(state): State<AppState>,
    params: std::result::Result<Query<CaptureParams>, QueryRejection>,
) -> Result<Response> {
    let Query(params) = params.map_err(|e| Error::invalid(e.body_text()))?;
    serve(&state, params).await
}

/// `POST /screenshot`
#[instrument(skip_all)]
pub async fn screenshot_post(
    State(state): State<AppState>,
    params: std::result::Result<Json<CaptureParams>, JsonRejection>,
) -> Result<Response> {
    let Json(params) = params.map_err(|e| Error::invalid(e.body_text()))?;
    serve(&state, params).await
}

async fn serve(state: &AppState, params: CaptureParams) -> Result<Response> {
    let request = params.resolve()?;
    debug!(url = %request.url, "Screenshot requested");

    let started = Instant::now();
    let outcome = state.service.capture(&request).await;
    state
        .stats
        .record_capture(started.elapsed(), outcome.is_ok());

    let capture = outcome?;
    Ok(([(header::CONTENT_TYPE, capture.mime_type())], capture.data).into_response())
}
