//! Diagnostic observers for page sessions
//!
//! Network, console and exception events are counted and logged here. Nothing
//! in this module feeds back into the pipeline's control flow.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tracing::{debug, warn};

/// Receives page events for logging
pub trait PageObserver: Send + Sync {
    /// A request was issued by the page
    fn on_request(&self, url: &str);
    /// A response was received
    fn on_response(&self, url: &str, status: i64);
    /// The page logged an error to its console
    fn on_console_error(&self, text: &str);
    /// An exception escaped the page's scripts
    fn on_page_error(&self, message: &str);
}

/// Per-session counters plus tracing output
#[derive(Debug, Default)]
pub struct SessionDiagnostics {
    requests: AtomicU64,
    responses: AtomicU64,
    console_errors: AtomicU64,
    page_errors: AtomicU64,
}

/// Point-in-time copy of [`SessionDiagnostics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiagnosticsSnapshot {
    /// Requests issued
    pub requests: u64,
    /// Responses received
    pub responses: u64,
    /// Console errors logged by the page
    pub console_errors: u64,
    /// Uncaught exceptions
    pub page_errors: u64,
}

impl SessionDiagnostics {
    /// Fresh counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Current counter values
    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            responses: self.responses.load(Ordering::Relaxed),
            console_errors: self.console_errors.load(Ordering::Relaxed),
            page_errors: self.page_errors.load(Ordering::Relaxed),
        }
    }
}

impl PageObserver for SessionDiagnostics {
    fn on_request(&self, url: &str) {
        let n = self.requests.fetch_add(1, Ordering::Relaxed) + 1;
        debug!("Request #{}: {}", n, url);
    }

    fn on_response(&self, url: &str, status: i64) {
        let n = self.responses.fetch_add(1, Ordering::Relaxed) + 1;
        debug!("Response #{}: {} - {}", n, url, status);
    }

    fn on_console_error(&self, text: &str) {
        self.console_errors.fetch_add(1, Ordering::Relaxed);
        warn!("Browser console error: {}", text);
    }

    fn on_page_error(&self, message: &str) {
        self.page_errors.fetch_add(1, Ordering::Relaxed);
        warn!("Page error: {}", message);
    }
}
