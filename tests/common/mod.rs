//! In-memory page fakes shared by the integration tests.
//!
//! Every wait is scripted as `Some(delay)` (completes after `delay`) or
//! `None` (never completes), so tests run under paused tokio time and let the
//! pipeline's own timeouts decide the outcome.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use rendershot::browser::readiness::FREEZE_ANIMATIONS_SCRIPT;
use rendershot::browser::{
    DiagnosticsSnapshot, FrameNode, LoadState, PageDriver, PageSource, ScreenshotSpec,
};
use rendershot::error::{BrowserError, Error, NavigationError, Result};

/// Bytes returned by a successful fake screenshot
pub const FAKE_IMAGE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

/// How a fake page behaves
#[derive(Debug, Clone)]
pub struct PageScript {
    pub goto_error: Option<String>,
    pub dom_content_loaded: Option<Duration>,
    pub network_idle: Option<Duration>,
    pub load: Option<Duration>,
    pub frame_tree: Option<FrameNode>,
    /// Per-frame DOMContentLoaded delay; frames not listed load immediately
    pub frame_delays: HashMap<String, Option<Duration>>,
    /// Heuristic turns true from this attempt on; `None` never
    pub ready_after: Option<u32>,
    pub evaluation_error: bool,
    pub screenshot_error: Option<String>,
}

impl Default for PageScript {
    fn default() -> Self {
        Self {
            goto_error: None,
            dom_content_loaded: Some(Duration::ZERO),
            network_idle: Some(Duration::ZERO),
            load: Some(Duration::ZERO),
            frame_tree: Some(FrameNode::leaf("main", "https://example.com/")),
            frame_delays: HashMap::new(),
            ready_after: Some(1),
            evaluation_error: false,
            screenshot_error: None,
        }
    }
}

/// Everything the fakes observed
#[derive(Debug, Default)]
pub struct Recorder {
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    pub evaluations: AtomicUsize,
    pub freezes: AtomicUsize,
    pub visited: Mutex<Vec<String>>,
    pub viewports: Mutex<Vec<(u32, u32)>>,
    pub headers: Mutex<Vec<(String, String)>>,
    pub default_timeouts: Mutex<Vec<Duration>>,
    pub frame_waits: Mutex<Vec<String>>,
    pub screenshots: Mutex<Vec<ScreenshotSpec>>,
}

impl Recorder {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn evaluations(&self) -> usize {
        self.evaluations.load(Ordering::SeqCst)
    }

    pub fn freezes(&self) -> usize {
        self.freezes.load(Ordering::SeqCst)
    }
}

async fn after(delay: Option<Duration>) {
    match delay {
        Some(delay) => tokio::time::sleep(delay).await,
        None => std::future::pending::<()>().await,
    }
}

/// A scripted page
pub struct FakePage {
    script: PageScript,
    recorder: Arc<Recorder>,
}

impl FakePage {
    pub fn new(script: PageScript, recorder: Arc<Recorder>) -> Self {
        Self { script, recorder }
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn set_viewport(&self, width: u32, height: u32) -> Result<()> {
        self.recorder.viewports.lock().push((width, height));
        Ok(())
    }

    async fn set_extra_headers(&self, headers: &[(String, String)]) -> Result<()> {
        self.recorder.headers.lock().extend(headers.iter().cloned());
        Ok(())
    }

    fn set_default_timeout(&self, timeout: Duration) {
        self.recorder.default_timeouts.lock().push(timeout);
    }

    async fn goto(&self, url: &str) -> Result<()> {
        self.recorder.visited.lock().push(url.to_string());
        match &self.script.goto_error {
            Some(text) => Err(NavigationError::NetworkError(text.clone()).into()),
            None => Ok(()),
        }
    }

    async fn wait_for_load_state(&self, state: LoadState) -> Result<()> {
        let delay = match state {
            LoadState::DomContentLoaded => self.script.dom_content_loaded,
            LoadState::Load => self.script.load,
            LoadState::NetworkIdle => self.script.network_idle,
        };
        after(delay).await;
        Ok(())
    }

    async fn frame_tree(&self) -> Result<FrameNode> {
        self.script
            .frame_tree
            .clone()
            .ok_or_else(|| Error::cdp("frame tree unavailable"))
    }

    async fn wait_for_frame_state(&self, frame_id: &str, _state: LoadState) -> Result<()> {
        self.recorder.frame_waits.lock().push(frame_id.to_string());
        let delay = self
            .script
            .frame_delays
            .get(frame_id)
            .copied()
            .unwrap_or(Some(Duration::ZERO));
        after(delay).await;
        Ok(())
    }

    async fn evaluate_bool(&self, script: &str) -> Result<bool> {
        if script == FREEZE_ANIMATIONS_SCRIPT {
            self.recorder.freezes.fetch_add(1, Ordering::SeqCst);
            return Ok(true);
        }
        let attempt = self.recorder.evaluations.fetch_add(1, Ordering::SeqCst) + 1;
        if self.script.evaluation_error {
            return Err(Error::cdp("Execution context was destroyed"));
        }
        Ok(self
            .script
            .ready_after
            .is_some_and(|from| attempt as u32 >= from))
    }

    async fn screenshot(&self, spec: &ScreenshotSpec) -> Result<Vec<u8>> {
        self.recorder.screenshots.lock().push(*spec);
        match &self.script.screenshot_error {
            Some(msg) => Err(Error::cdp(msg.clone())),
            None => Ok(FAKE_IMAGE.to_vec()),
        }
    }

    fn diagnostics(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot::default()
    }

    async fn close(&self) -> Result<()> {
        self.recorder.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out [`FakePage`]s following one script
pub struct FakeSource {
    pub script: PageScript,
    pub recorder: Arc<Recorder>,
    pub launch_error: Option<String>,
    pub ready: AtomicBool,
}

impl FakeSource {
    pub fn new(script: PageScript) -> Self {
        Self {
            script,
            recorder: Arc::new(Recorder::default()),
            launch_error: None,
            ready: AtomicBool::new(true),
        }
    }

    pub fn failing_launch(message: &str) -> Self {
        Self {
            launch_error: Some(message.to_string()),
            ..Self::new(PageScript::default())
        }
    }
}

#[async_trait]
impl PageSource for FakeSource {
    async fn open_page(&self) -> Result<Box<dyn PageDriver>> {
        self.recorder.opened.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.launch_error {
            return Err(BrowserError::LaunchFailed(message.clone()).into());
        }
        Ok(Box::new(FakePage::new(
            self.script.clone(),
            Arc::clone(&self.recorder),
        )))
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}
