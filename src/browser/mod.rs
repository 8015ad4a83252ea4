//! Browser automation module
//!
//! This module drives Chromium through ChromiumOxide: browser lifecycle,
//! page sessions, navigation, frame settling, render-readiness polling and
//! capture.

pub mod capture;
pub mod driver;
pub mod frames;
pub mod launch;
pub mod manager;
pub mod navigation;
pub mod observer;
pub mod page;
pub mod readiness;

pub use capture::{CaptureFormat, CaptureResult, PageCapture, ScreenshotSpec};
pub use driver::{FrameNode, LoadState, PageDriver, PageSource};
pub use frames::{FrameWaitOptions, FrameWaitReport, FrameWaiter};
pub use launch::{DeploymentMode, LaunchConfig, LaunchStrategy};
pub use manager::{BrowserHandle, BrowserManager, InitState};
pub use navigation::{NavigationOptions, NavigationResult, PageNavigator};
pub use observer::{DiagnosticsSnapshot, PageObserver, SessionDiagnostics};
pub use page::ChromePage;
pub use readiness::{HeuristicConfig, PollerConfig, ReadinessOutcome, ReadinessPoller};
