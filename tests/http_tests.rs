//! Router tests driven through `tower::ServiceExt::oneshot`.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use pretty_assertions::assert_eq;
use serde_json::Value;
use tower::ServiceExt;

use common::{FakeSource, PageScript, FAKE_IMAGE};
use rendershot::handlers::{router, AppState};
use rendershot::{CaptureService, ServiceSettings};

fn app_with(source: FakeSource) -> (Router, AppState) {
    let service = Arc::new(CaptureService::new(
        Arc::new(source),
        ServiceSettings::default(),
    ));
    let state = AppState::new(service);
    (router(state.clone()), state)
}

fn app() -> Router {
    app_with(FakeSource::new(PageScript::default())).0
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_is_always_ok() {
    let response = app()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "healthy");
}

#[tokio::test(start_paused = true)]
async fn get_screenshot_returns_png_bytes() {
    let response = app()
        .oneshot(
            Request::get("/screenshot?url=https%3A%2F%2Fexample.com%2F&width=1280&height=720&waitForThreeJs=false")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], FAKE_IMAGE);
}

#[tokio::test(start_paused = true)]
async fn post_screenshot_honours_jpeg_format() {
    let body = serde_json::json!({
        "url": "https://example.com/",
        "format": "jpeg",
        "quality": 75,
        "waitForThreeJs": false
    });
    let response = app()
        .oneshot(
            Request::post("/screenshot")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");
}

#[tokio::test]
async fn missing_url_is_bad_request() {
    let response = app()
        .oneshot(Request::get("/screenshot").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap().contains("url is required"));
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let response = app()
        .oneshot(
            Request::post("/screenshot")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{\"url\": "))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(response).await["error"].is_string());
}

#[tokio::test]
async fn unknown_format_is_bad_request() {
    let response = app()
        .oneshot(
            Request::get("/screenshot?url=https%3A%2F%2Fexample.com&format=gif")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test(start_paused = true)]
async fn navigation_failure_is_server_error_with_cause() {
    let (app, state) = app_with(FakeSource::new(PageScript {
        goto_error: Some("net::ERR_CONNECTION_REFUSED".to_string()),
        ..Default::default()
    }));

    let response = app
        .oneshot(
            Request::get("/screenshot?url=http%3A%2F%2F127.0.0.1%3A9%2F")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let error = json_body(response).await["error"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(error.starts_with("navigation stage failed for http://127.0.0.1:9/"));
    assert!(error.contains("net::ERR_CONNECTION_REFUSED"));
    assert_eq!(state.stats.captures_failed(), 1);
}

#[tokio::test]
async fn shutdown_turns_requests_away() {
    let (app, state) = app_with(FakeSource::new(PageScript::default()));
    state.service.begin_shutdown();

    let response = app
        .clone()
        .oneshot(
            Request::get("/screenshot?url=https%3A%2F%2Fexample.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let ready = app
        .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(ready.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn readiness_follows_browser_subsystem() {
    let source = FakeSource::new(PageScript::default());
    source.ready.store(false, Ordering::SeqCst);
    let (app, _) = app_with(source);

    let response = app
        .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(response).await["status"], "not_ready");
}

#[tokio::test(start_paused = true)]
async fn status_reports_capture_counters() {
    let (app, _) = app_with(FakeSource::new(PageScript::default()));

    let shot = app
        .clone()
        .oneshot(
            Request::get("/screenshot?url=https%3A%2F%2Fexample.com&waitForThreeJs=false")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(shot.status(), StatusCode::OK);

    let response = app
        .oneshot(Request::get("/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let status = json_body(response).await;
    assert_eq!(status["name"], "rendershot");
    assert_eq!(status["captures_succeeded"], 1);
    assert_eq!(status["captures_failed"], 0);
    assert_eq!(status["ready"], true);
    assert_eq!(status["latency"]["total_requests"], 1);
}
