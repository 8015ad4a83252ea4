//! Chromium page sessions
//!
//! [`ChromePage`] adapts a chromiumoxide [`Page`] to [`PageDriver`]. Load
//! states are tracked from `Page.lifecycleEvent` per frame and per loader, so
//! waiting for DOMContentLoaded, load or network idle works for the main
//! frame and for same-process iframes alike.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::{
    EventRequestWillBeSent, EventResponseReceived, Headers, SetExtraHttpHeadersParams,
};
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, EventLifecycleEvent, FrameTree, GetFrameTreeParams, NavigateParams,
    SetLifecycleEventsEnabledParams,
};
use chromiumoxide::cdp::js_protocol::runtime::{
    ConsoleApiCalledType, EventConsoleApiCalled, EventExceptionThrown, RemoteObject,
};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::debug;

use super::capture::{CaptureFormat, ScreenshotSpec};
use super::driver::{FrameNode, LoadState, PageDriver};
use super::observer::{DiagnosticsSnapshot, PageObserver, SessionDiagnostics};
use crate::error::{Error, NavigationError, Result};

/// Lifecycle milestones reached by one frame's current document
#[derive(Debug, Default)]
struct FrameLifecycle {
    loader_id: String,
    reached: HashSet<String>,
}

/// Lifecycle events of every frame in a page
#[derive(Debug, Default)]
struct LifecycleTracker {
    frames: Mutex<HashMap<String, FrameLifecycle>>,
    changed: Notify,
}

impl LifecycleTracker {
    fn record(&self, frame_id: &str, loader_id: &str, name: &str) {
        {
            let mut frames = self.frames.lock();
            let entry = frames.entry(frame_id.to_string()).or_default();
            if name == "init" {
                entry.loader_id = loader_id.to_string();
                entry.reached.clear();
            } else if entry.loader_id.is_empty() {
                entry.loader_id = loader_id.to_string();
            } else if entry.loader_id != loader_id {
                // Event for a document that has since been replaced.
                return;
            }
            entry.reached.insert(name.to_string());
        }
        self.changed.notify_waiters();
    }

    /// Forget milestones unless they already belong to `loader_id`
    fn expect_loader(&self, frame_id: &str, loader_id: &str) {
        let mut frames = self.frames.lock();
        let entry = frames.entry(frame_id.to_string()).or_default();
        if entry.loader_id != loader_id {
            entry.loader_id = loader_id.to_string();
            entry.reached.clear();
        }
    }

    fn has_reached(&self, frame_id: &str, name: &str) -> bool {
        self.frames
            .lock()
            .get(frame_id)
            .is_some_and(|frame| frame.reached.contains(name))
    }

    async fn wait_for(&self, frame_id: &str, name: &str) {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.has_reached(frame_id, name) {
                return;
            }
            notified.await;
        }
    }
}

/// A chromiumoxide page owned by one capture request
pub struct ChromePage {
    page: Page,
    lifecycle: Arc<LifecycleTracker>,
    diagnostics: Arc<SessionDiagnostics>,
    main_frame: Mutex<Option<String>>,
    default_timeout_ms: AtomicU64,
    listeners: Mutex<Vec<JoinHandle<()>>>,
}

impl ChromePage {
    /// Wrap `page`, subscribing the lifecycle tracker and diagnostic observers
    pub async fn attach(page: Page, diagnostics: Arc<SessionDiagnostics>) -> Result<Self> {
        page.execute(SetLifecycleEventsEnabledParams::new(true))
            .await?;

        let lifecycle = Arc::new(LifecycleTracker::default());
        let mut listeners = Vec::with_capacity(5);

        let mut lifecycle_events = page.event_listener::<EventLifecycleEvent>().await?;
        let tracker = Arc::clone(&lifecycle);
        listeners.push(tokio::spawn(async move {
            while let Some(event) = lifecycle_events.next().await {
                tracker.record(event.frame_id.inner(), event.loader_id.inner(), &event.name);
            }
        }));

        let observer: Arc<dyn PageObserver> = diagnostics.clone();

        let mut requests = page.event_listener::<EventRequestWillBeSent>().await?;
        let sink = Arc::clone(&observer);
        listeners.push(tokio::spawn(async move {
            while let Some(event) = requests.next().await {
                sink.on_request(&event.request.url);
            }
        }));

        let mut responses = page.event_listener::<EventResponseReceived>().await?;
        let sink = Arc::clone(&observer);
        listeners.push(tokio::spawn(async move {
            while let Some(event) = responses.next().await {
                sink.on_response(&event.response.url, event.response.status);
            }
        }));

        let mut console = page.event_listener::<EventConsoleApiCalled>().await?;
        let sink = Arc::clone(&observer);
        listeners.push(tokio::spawn(async move {
            while let Some(event) = console.next().await {
                if event.r#type == ConsoleApiCalledType::Error {
                    let text = event
                        .args
                        .iter()
                        .map(describe)
                        .collect::<Vec<_>>()
                        .join(" ");
                    sink.on_console_error(&text);
                }
            }
        }));

        let mut exceptions = page.event_listener::<EventExceptionThrown>().await?;
        let sink = observer;
        listeners.push(tokio::spawn(async move {
            while let Some(event) = exceptions.next().await {
                let details = &event.exception_details;
                let message = details
                    .exception
                    .as_ref()
                    .and_then(|e| e.description.clone())
                    .unwrap_or_else(|| details.text.clone());
                sink.on_page_error(&message);
            }
        }));

        Ok(Self {
            page,
            lifecycle,
            diagnostics,
            main_frame: Mutex::new(None),
            default_timeout_ms: AtomicU64::new(crate::request::DEFAULT_TIMEOUT_MS),
            listeners: Mutex::new(listeners),
        })
    }

    fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms.load(Ordering::Relaxed))
    }

    async fn within<T, F>(&self, action: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let limit = self.default_timeout();
        tokio::time::timeout(limit, fut).await.map_err(|_| {
            Error::cdp(format!("{action} timed out after {}ms", limit.as_millis()))
        })?
    }

    async fn main_frame_id(&self) -> Result<String> {
        if let Some(id) = self.main_frame.lock().clone() {
            return Ok(id);
        }
        let id = self
            .page
            .mainframe()
            .await?
            .map(|f| f.inner().clone())
            .ok_or_else(|| Error::cdp("page has no main frame"))?;
        *self.main_frame.lock() = Some(id.clone());
        Ok(id)
    }
}

fn describe(arg: &RemoteObject) -> String {
    match (&arg.value, &arg.description) {
        (Some(serde_json::Value::String(s)), _) => s.clone(),
        (Some(value), _) => value.to_string(),
        (None, Some(description)) => description.clone(),
        (None, None) => String::new(),
    }
}

fn to_frame_node(tree: &FrameTree) -> FrameNode {
    FrameNode {
        id: tree.frame.id.inner().clone(),
        url: tree.frame.url.clone(),
        children: tree
            .child_frames
            .as_ref()
            .map(|children| children.iter().map(to_frame_node).collect())
            .unwrap_or_default(),
    }
}

#[async_trait]
impl PageDriver for ChromePage {
    async fn set_viewport(&self, width: u32, height: u32) -> Result<()> {
        let params = SetDeviceMetricsOverrideParams::builder()
            .width(width as i64)
            .height(height as i64)
            .device_scale_factor(1.0)
            .mobile(false)
            .build()
            .map_err(Error::cdp)?;
        self.within("set viewport", async {
            self.page.execute(params).await?;
            Ok(())
        })
        .await
    }

    async fn set_extra_headers(&self, headers: &[(String, String)]) -> Result<()> {
        let map = headers
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect::<serde_json::Map<_, _>>();
        let params = SetExtraHttpHeadersParams::new(Headers::new(serde_json::Value::Object(map)));
        self.within("set extra headers", async {
            self.page.execute(params).await?;
            Ok(())
        })
        .await
    }

    fn set_default_timeout(&self, timeout: Duration) {
        self.default_timeout_ms
            .store(timeout.as_millis() as u64, Ordering::Relaxed);
    }

    async fn goto(&self, url: &str) -> Result<()> {
        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(Error::cdp)?;
        let response = self.page.execute(params).await?;

        if let Some(text) = response.result.error_text.clone().filter(|t| !t.is_empty()) {
            return Err(NavigationError::NetworkError(text).into());
        }

        let frame_id = response.result.frame_id.inner().clone();
        if let Some(loader) = &response.result.loader_id {
            self.lifecycle.expect_loader(&frame_id, loader.inner());
        }
        debug!("Navigation to {} committed in frame {}", url, frame_id);
        *self.main_frame.lock() = Some(frame_id);
        Ok(())
    }

    async fn wait_for_load_state(&self, state: LoadState) -> Result<()> {
        let frame_id = self.main_frame_id().await?;
        self.lifecycle
            .wait_for(&frame_id, state.lifecycle_event())
            .await;
        Ok(())
    }

    async fn frame_tree(&self) -> Result<FrameNode> {
        let response = self
            .within("read frame tree", async {
                Ok(self.page.execute(GetFrameTreeParams::default()).await?)
            })
            .await?;
        Ok(to_frame_node(&response.result.frame_tree))
    }

    async fn wait_for_frame_state(&self, frame_id: &str, state: LoadState) -> Result<()> {
        self.lifecycle
            .wait_for(frame_id, state.lifecycle_event())
            .await;
        Ok(())
    }

    async fn evaluate_bool(&self, script: &str) -> Result<bool> {
        self.within("evaluate", async {
            let value = self.page.evaluate(script).await?.into_value::<bool>()?;
            Ok(value)
        })
        .await
    }

    async fn screenshot(&self, spec: &ScreenshotSpec) -> Result<Vec<u8>> {
        let format = match spec.format {
            CaptureFormat::Png => CaptureScreenshotFormat::Png,
            CaptureFormat::Jpeg => CaptureScreenshotFormat::Jpeg,
        };

        let mut params_builder = ScreenshotParams::builder()
            .format(format)
            .full_page(spec.full_page)
            .capture_beyond_viewport(spec.full_page);

        if let Some(quality) = spec.quality {
            params_builder = params_builder.quality(quality as i64);
        }

        let data = self.page.screenshot(params_builder.build()).await?;
        Ok(data)
    }

    fn diagnostics(&self) -> DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    async fn close(&self) -> Result<()> {
        for listener in self.listeners.lock().drain(..) {
            listener.abort();
        }
        self.page.clone().close().await?;
        Ok(())
    }
}

impl Drop for ChromePage {
    fn drop(&mut self) {
        for listener in self.listeners.get_mut().drain(..) {
            listener.abort();
        }
    }
}
