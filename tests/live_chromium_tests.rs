//! Tests against a real Chrome/Chromium. They drive `ChromePage` through the
//! CDP lifecycle waits and run the readiness heuristic inside a live page.
//! Ignored by default because they need a browser on the host; run them
//! with `RENDERSHOT_LIVE_CHROME=1 cargo test -- --ignored`.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use rendershot::browser::readiness::heuristic_script;
use rendershot::browser::{
    BrowserManager, LaunchConfig, LoadState, NavigationOptions, PageDriver, PageNavigator,
    PageSource,
};
use rendershot::error::{Error, NavigationError};
use rendershot::{CaptureRequest, CaptureService, ServiceSettings};

const PAINTED_SCENE: &str = "<html><body><canvas width=64 height=64></canvas><script>\
    const gl = document.querySelector('canvas').getContext('webgl', { preserveDrawingBuffer: true });\
    gl.clearColor(0.9, 0.2, 0.1, 1.0);\
    gl.clear(gl.COLOR_BUFFER_BIT);\
    </script></body></html>";

const UNDRAWN_SCENE: &str = "<html><body><canvas width=64 height=64></canvas><script>\
    document.querySelector('canvas').getContext('webgl', { preserveDrawingBuffer: true });\
    </script></body></html>";

fn live_enabled() -> bool {
    env::var("RENDERSHOT_LIVE_CHROME")
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

fn manager() -> Arc<BrowserManager> {
    let mut builder = LaunchConfig::builder();
    if let Ok(path) = env::var("CHROME_BIN") {
        builder = builder.chrome_path(path);
    }
    Arc::new(BrowserManager::new(builder.build()))
}

fn data_url(html: &str) -> String {
    let escaped = html
        .replace('%', "%25")
        .replace('#', "%23")
        .replace(' ', "%20");
    format!("data:text/html,{escaped}")
}

async fn open_scene(manager: &BrowserManager, html: &str) -> Box<dyn PageDriver> {
    let page = manager.open_page().await.expect("open page");
    page.goto(&data_url(html)).await.expect("navigate");
    page.wait_for_load_state(LoadState::Load)
        .await
        .expect("load event");
    page
}

#[tokio::test]
#[ignore = "requires Chrome/Chromium; set RENDERSHOT_LIVE_CHROME=1"]
async fn live_heuristic_is_stable_on_a_painted_scene() {
    if !live_enabled() {
        eprintln!("skipping live test (RENDERSHOT_LIVE_CHROME not enabled)");
        return;
    }

    let manager = manager();
    let page = open_scene(&manager, PAINTED_SCENE).await;

    for attempt in 0..5 {
        let ready = page
            .evaluate_bool(heuristic_script())
            .await
            .expect("heuristic evaluates");
        assert!(ready, "painted scene not ready on attempt {attempt}");
    }

    page.close().await.expect("close page");
    manager.shutdown().await;
}

#[tokio::test]
#[ignore = "requires Chrome/Chromium; set RENDERSHOT_LIVE_CHROME=1"]
async fn live_heuristic_rejects_an_undrawn_canvas() {
    if !live_enabled() {
        eprintln!("skipping live test (RENDERSHOT_LIVE_CHROME not enabled)");
        return;
    }

    let manager = manager();
    let page = open_scene(&manager, UNDRAWN_SCENE).await;

    let ready = page
        .evaluate_bool(heuristic_script())
        .await
        .expect("heuristic evaluates");
    assert!(!ready, "blank canvas passed the readiness check");

    page.close().await.expect("close page");
    manager.shutdown().await;
}

#[tokio::test]
#[ignore = "requires Chrome/Chromium; set RENDERSHOT_LIVE_CHROME=1"]
async fn live_connection_refused_maps_to_load_failure() {
    if !live_enabled() {
        eprintln!("skipping live test (RENDERSHOT_LIVE_CHROME not enabled)");
        return;
    }

    let manager = manager();
    let page = manager.open_page().await.expect("open page");

    let err = PageNavigator::load(
        page.as_ref(),
        "http://127.0.0.1:9/",
        &NavigationOptions::default(),
        Duration::from_secs(30),
    )
    .await
    .unwrap_err();

    match err {
        Error::Navigation(NavigationError::LoadFailed { url, cause }) => {
            assert_eq!(url, "http://127.0.0.1:9/");
            assert!(cause.contains("ERR_CONNECTION_REFUSED"), "cause: {cause}");
        }
        other => panic!("unexpected error: {other}"),
    }

    page.close().await.expect("close page");
    manager.shutdown().await;
}

#[tokio::test]
#[ignore = "requires Chrome/Chromium; set RENDERSHOT_LIVE_CHROME=1"]
async fn live_capture_returns_png() {
    if !live_enabled() {
        eprintln!("skipping live test (RENDERSHOT_LIVE_CHROME not enabled)");
        return;
    }

    let manager = manager();
    let service = Arc::new(CaptureService::new(
        manager.clone(),
        ServiceSettings::default(),
    ));

    let request = CaptureRequest {
        width: 320,
        height: 240,
        ..CaptureRequest::new(data_url(PAINTED_SCENE))
    };
    let shot = service.capture(&request).await.expect("capture succeeds");

    assert_eq!(shot.mime_type(), "image/png");
    assert!(shot.data.starts_with(b"\x89PNG"));

    manager.shutdown().await;
}
