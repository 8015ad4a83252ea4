//! Error types for rendershot
//!
//! Fatal failures of the capture pipeline are modelled with `thiserror`
//! enums. Soft conditions (slow iframes, network never idling, the readiness
//! poller giving up) never surface here; the stages log them and carry on.

use std::fmt;

use http::StatusCode;
use thiserror::Error;

use crate::browser::LoadState;

/// The main error type for rendershot operations
#[derive(Error, Debug)]
pub enum Error {
    /// Browser lifecycle errors
    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),

    /// Navigation errors
    #[error("Navigation error: {0}")]
    Navigation(#[from] NavigationError),

    /// Capture errors
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    /// The process has begun graceful shutdown
    #[error("Service is shutting down and no longer accepts capture requests")]
    ShuttingDown,

    /// The capture parameters could not be resolved
    #[error("Invalid capture request: {0}")]
    InvalidRequest(String),

    /// A fatal failure annotated with the pipeline stage it happened in
    #[error("{stage} stage failed for {url}: {source}")]
    Stage {
        /// Stage that failed
        stage: Stage,
        /// URL of the capture request
        url: String,
        /// Underlying cause
        source: Box<Error>,
    },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// ChromiumOxide errors
    #[error("CDP error: {0}")]
    Cdp(String),
}

/// Browser lifecycle and control errors
#[derive(Error, Debug)]
pub enum BrowserError {
    /// The automation subsystem never became ready
    #[error("Browser subsystem not initialized: {0}")]
    NotInitialized(String),

    /// Every launch strategy failed
    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    /// Browser configuration error
    #[error("Invalid browser configuration: {0}")]
    ConfigError(String),

    /// Failed to create new page/tab
    #[error("Failed to create page: {0}")]
    PageCreationFailed(String),
}

/// Navigation errors
#[derive(Error, Debug)]
pub enum NavigationError {
    /// The browser reported a network-level failure for the navigation
    #[error("{0}")]
    NetworkError(String),

    /// A load state was not reached in time
    #[error("Timed out after {after_ms}ms waiting for {state}")]
    Timeout {
        /// Load state being awaited
        state: LoadState,
        /// Bound that elapsed
        after_ms: u64,
    },

    /// The page could not be loaded under either wait strategy
    #[error("Unable to load page {url}: {cause}")]
    LoadFailed {
        /// URL being loaded
        url: String,
        /// Last failure observed
        cause: String,
    },
}

/// Capture errors
#[derive(Error, Debug)]
pub enum CaptureError {
    /// Screenshot failed
    #[error("Screenshot capture failed: {0}")]
    ScreenshotFailed(String),

    /// Capture timeout
    #[error("Capture timed out after {0}ms")]
    Timeout(u64),
}

/// Pipeline stage a fatal error is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Acquiring the browser and opening a page
    Launch,
    /// Applying viewport, headers and timeouts
    PageSetup,
    /// Loading the URL
    Navigation,
    /// Producing the image
    Capture,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Launch => "launch",
            Stage::PageSetup => "page-setup",
            Stage::Navigation => "navigation",
            Stage::Capture => "capture",
        };
        f.write_str(name)
    }
}

/// Result type alias for rendershot operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a CDP error from a string
    pub fn cdp<S: Into<String>>(msg: S) -> Self {
        Error::Cdp(msg.into())
    }

    /// Create an invalid-request error from a string
    pub fn invalid<S: Into<String>>(msg: S) -> Self {
        Error::InvalidRequest(msg.into())
    }

    /// Attach the stage and URL to this error
    pub fn in_stage(self, stage: Stage, url: &str) -> Self {
        Error::Stage {
            stage,
            url: url.to_string(),
            source: Box::new(self),
        }
    }

    /// The stage this error was attributed to, if any
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// The innermost error beneath any stage annotations
    pub fn root(&self) -> &Error {
        match self {
            Error::Stage { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether the root cause is a navigation failure
    pub fn is_navigation(&self) -> bool {
        matches!(self.root(), Error::Navigation(_))
    }

    /// HTTP status code reported to callers
    pub fn status_code(&self) -> StatusCode {
        match self.root() {
            Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Error::ShuttingDown | Error::Browser(BrowserError::NotInitialized(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convert chromiumoxide errors
impl From<chromiumoxide::error::CdpError> for Error {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        Error::Cdp(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Browser(BrowserError::LaunchFailed("no chrome".to_string()));
        assert!(err.to_string().contains("Failed to launch browser"));
        assert!(err.to_string().contains("no chrome"));
    }

    #[test]
    fn test_stage_wrapping_keeps_cause() {
        let err = Error::from(NavigationError::LoadFailed {
            url: "http://127.0.0.1:9".to_string(),
            cause: "net::ERR_CONNECTION_REFUSED".to_string(),
        })
        .in_stage(Stage::Navigation, "http://127.0.0.1:9");

        let message = err.to_string();
        assert!(message.starts_with("navigation stage failed for http://127.0.0.1:9"));
        assert!(message.contains("net::ERR_CONNECTION_REFUSED"));
        assert_eq!(err.stage(), Some(Stage::Navigation));
        assert!(err.is_navigation());
    }

    #[test]
    fn test_timeout_display() {
        let err = NavigationError::Timeout {
            state: LoadState::NetworkIdle,
            after_ms: 120_000,
        };
        assert_eq!(err.to_string(), "Timed out after 120000ms waiting for networkidle");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            Error::invalid("missing url").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::ShuttingDown.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            Error::from(BrowserError::NotInitialized("probe failed".into()))
                .in_stage(Stage::Launch, "https://example.com")
                .status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            Error::from(CaptureError::ScreenshotFailed("boom".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
