//! Page capabilities used by the capture pipeline
//!
//! The pipeline stages only talk to a page through [`PageDriver`] and obtain
//! pages through [`PageSource`]. The Chromium implementation lives in
//! [`super::page`]; tests substitute in-memory fakes.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use super::capture::ScreenshotSpec;
use super::observer::DiagnosticsSnapshot;
use crate::error::Result;

/// Document load milestones a page or frame can reach
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadState {
    /// DOMContentLoaded fired
    DomContentLoaded,
    /// The load event fired
    Load,
    /// No network connections for a short trailing window
    NetworkIdle,
}

impl LoadState {
    /// Name of the matching `Page.lifecycleEvent`
    pub fn lifecycle_event(&self) -> &'static str {
        match self {
            LoadState::DomContentLoaded => "DOMContentLoaded",
            LoadState::Load => "load",
            LoadState::NetworkIdle => "networkIdle",
        }
    }
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoadState::DomContentLoaded => "domcontentloaded",
            LoadState::Load => "load",
            LoadState::NetworkIdle => "networkidle",
        };
        f.write_str(name)
    }
}

/// One node of a page's frame tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameNode {
    /// CDP frame id
    pub id: String,
    /// Document URL of the frame
    pub url: String,
    /// Nested frames
    pub children: Vec<FrameNode>,
}

impl FrameNode {
    /// A frame with no children
    pub fn leaf<S: Into<String>>(id: S, url: S) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            children: Vec::new(),
        }
    }

    /// Builder-style child attachment
    pub fn with_child(mut self, child: FrameNode) -> Self {
        self.children.push(child);
        self
    }

    /// Number of frames below this one
    pub fn descendant_count(&self) -> usize {
        self.children
            .iter()
            .map(|c| 1 + c.descendant_count())
            .sum()
    }
}

/// A single browser page exclusively owned by one capture request.
///
/// Waiting methods are unbounded; the stage that calls them applies its own
/// timeout.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Emulate a viewport of the given size
    async fn set_viewport(&self, width: u32, height: u32) -> Result<()>;

    /// Send these headers with every request the page makes
    async fn set_extra_headers(&self, headers: &[(String, String)]) -> Result<()>;

    /// Bound for actions that have no stage-specific timeout
    fn set_default_timeout(&self, timeout: Duration);

    /// Start navigating the main frame; returns once the navigation is issued.
    ///
    /// A network-level failure reported by the browser is returned as
    /// `NavigationError::NetworkError`.
    async fn goto(&self, url: &str) -> Result<()>;

    /// Wait until the main frame's current document reaches `state`
    async fn wait_for_load_state(&self, state: LoadState) -> Result<()>;

    /// Snapshot of the frame tree rooted at the main frame
    async fn frame_tree(&self) -> Result<FrameNode>;

    /// Wait until the frame `frame_id` reaches `state`
    async fn wait_for_frame_state(&self, frame_id: &str, state: LoadState) -> Result<()>;

    /// Evaluate a script in the main frame that yields a boolean
    async fn evaluate_bool(&self, script: &str) -> Result<bool>;

    /// Encode the page as an image
    async fn screenshot(&self, spec: &ScreenshotSpec) -> Result<Vec<u8>>;

    /// Counters collected by the diagnostic observers
    fn diagnostics(&self) -> DiagnosticsSnapshot;

    /// Release the page
    async fn close(&self) -> Result<()>;
}

/// Something that hands out fresh, isolated pages
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Open a new page
    async fn open_page(&self) -> Result<Box<dyn PageDriver>>;

    /// Whether the underlying browser subsystem is initialized
    fn is_ready(&self) -> bool {
        true
    }
}
