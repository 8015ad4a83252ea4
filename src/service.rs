//! Page session orchestration
//!
//! [`CaptureService`] owns one page per request and runs it through the
//! capture pipeline:
//!
//! ```text
//! open page ─▶ setup ─▶ navigate ─▶ settle frames ─▶ readiness poll ─▶ settle delay ─▶ capture
//!                                                     (waitForThreeJs)
//! ```
//!
//! Setup, navigation and capture failures are fatal and tagged with their
//! stage. Frame settling and readiness polling only ever log. The page is
//! closed whatever the outcome.
//!
//! Each capture runs on its own task, so a caller that stops waiting (a
//! client disconnect, an outer timeout) does not cut the session short and
//! the page still gets released.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, instrument, warn, Instrument, Span};
use uuid::Uuid;

use crate::browser::{
    CaptureResult, FrameWaitOptions, FrameWaiter, NavigationOptions, PageCapture, PageDriver,
    PageNavigator, PageSource, PollerConfig, ReadinessPoller, ScreenshotSpec,
};
use crate::error::{Error, Result, Stage};
use crate::request::CaptureRequest;

/// `Accept-Language` sent with every page request unless configured otherwise
pub const DEFAULT_ACCEPT_LANGUAGE: &str = "zh-CN,zh;q=0.9,en;q=0.8";

/// Tunables of the capture pipeline
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// `Accept-Language` header value
    pub accept_language: String,
    /// Navigation step caps
    pub navigation: NavigationOptions,
    /// Frame settling caps
    pub frames: FrameWaitOptions,
    /// Readiness poller cadence and bounds
    pub poller: PollerConfig,
    /// Fixed pause before capture (default: 2s)
    pub settle_delay: Duration,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            accept_language: DEFAULT_ACCEPT_LANGUAGE.to_string(),
            navigation: NavigationOptions::default(),
            frames: FrameWaitOptions::default(),
            poller: PollerConfig::default(),
            settle_delay: Duration::from_secs(2),
        }
    }
}

/// Runs capture requests against pages from a [`PageSource`]
pub struct CaptureService {
    pages: Arc<dyn PageSource>,
    settings: ServiceSettings,
    poller: ReadinessPoller,
    shutting_down: AtomicBool,
}

impl CaptureService {
    /// Create a service drawing pages from `pages`
    pub fn new(pages: Arc<dyn PageSource>, settings: ServiceSettings) -> Self {
        let poller = ReadinessPoller::new(settings.poller.clone());
        Self {
            pages,
            settings,
            poller,
            shutting_down: AtomicBool::new(false),
        }
    }

    /// Pipeline settings
    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    /// Stop accepting new captures; in-flight ones run to completion
    pub fn begin_shutdown(&self) {
        if !self.shutting_down.swap(true, Ordering::SeqCst) {
            info!("Capture service shutting down, rejecting new requests");
        }
    }

    /// Whether graceful shutdown has begun
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Whether new captures can be served
    pub fn is_ready(&self) -> bool {
        !self.is_shutting_down() && self.pages.is_ready()
    }

    /// Capture `request.url` as an image
    ///
    /// The session runs detached; dropping the returned future leaves it
    /// running until its page is closed.
    pub async fn capture(self: &Arc<Self>, request: &CaptureRequest) -> Result<CaptureResult> {
        let service = Arc::clone(self);
        let request = request.clone();
        tokio::spawn(async move { service.session(&request).await }.instrument(Span::current()))
            .await
            .map_err(|e| Error::cdp(format!("capture task failed: {e}")))?
    }

    #[instrument(
        skip(self, request),
        fields(request_id = %Uuid::new_v4(), url = %request.url)
    )]
    async fn session(&self, request: &CaptureRequest) -> Result<CaptureResult> {
        if self.is_shutting_down() {
            warn!("Rejecting capture during shutdown");
            return Err(Error::ShuttingDown);
        }

        let start = Instant::now();
        info!(
            width = request.width,
            height = request.height,
            full_page = request.full_page,
            wait_for_three_js = request.wait_for_three_js,
            "Starting capture"
        );

        let page = self
            .pages
            .open_page()
            .await
            .map_err(|e| e.in_stage(Stage::Launch, &request.url))?;

        let outcome = self.run(page.as_ref(), request).await;

        if let Err(e) = page.close().await {
            warn!("Failed to close page: {}", e);
        }
        let diagnostics = page.diagnostics();
        debug!(
            requests = diagnostics.requests,
            responses = diagnostics.responses,
            console_errors = diagnostics.console_errors,
            page_errors = diagnostics.page_errors,
            "Page session closed"
        );

        let elapsed_ms = start.elapsed().as_millis() as u64;
        match &outcome {
            Ok(result) => info!("Captured {} bytes in {}ms", result.len(), elapsed_ms),
            Err(e) => error!("Capture failed after {}ms: {}", elapsed_ms, e),
        }
        outcome
    }

    async fn run(&self, page: &dyn PageDriver, request: &CaptureRequest) -> Result<CaptureResult> {
        let url = request.url.as_str();

        self.prepare(page, request)
            .await
            .map_err(|e| e.in_stage(Stage::PageSetup, url))?;

        let navigation =
            PageNavigator::load(page, url, &self.settings.navigation, request.timeout())
                .await
                .map_err(|e| e.in_stage(Stage::Navigation, url))?;
        if navigation.is_degraded() {
            warn!("Continuing with degraded navigation");
        }

        FrameWaiter::settle(page, &self.settings.frames).await;

        if request.wait_for_three_js {
            let outcome = self.poller.wait(page).await;
            debug!(?outcome, "Readiness wait finished");
        }

        debug!(
            "Settling for {}ms before capture",
            self.settings.settle_delay.as_millis()
        );
        tokio::time::sleep(self.settings.settle_delay).await;

        PageCapture::screenshot(page, &ScreenshotSpec::for_request(request), request.timeout())
            .await
            .map_err(|e| e.in_stage(Stage::Capture, url))
    }

    async fn prepare(&self, page: &dyn PageDriver, request: &CaptureRequest) -> Result<()> {
        page.set_default_timeout(request.timeout());
        page.set_viewport(request.width, request.height).await?;
        page.set_extra_headers(&[(
            "Accept-Language".to_string(),
            self.settings.accept_language.clone(),
        )])
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_default() {
        let settings = ServiceSettings::default();
        assert_eq!(settings.accept_language, "zh-CN,zh;q=0.9,en;q=0.8");
        assert_eq!(settings.settle_delay, Duration::from_secs(2));
        assert_eq!(settings.poller.max_attempts, 200);
    }
}
