//! rendershot - screenshots of pages that finish rendering late
//!
//! Renders a page in headless Chromium over the DevTools Protocol and returns
//! a PNG or JPEG once the page has actually finished drawing. It is tuned for
//! WebGL / three.js pages whose visible content depends on meshes and
//! textures streamed in after the document itself has loaded.
//!
//! # Architecture
//!
//! ```text
//! HTTP ──▶ handlers ──▶ CaptureService ──▶ BrowserManager (one shared Chromium)
//!                            │
//!                            ▼
//!        PageNavigator ─▶ FrameWaiter ─▶ ReadinessPoller ─▶ PageCapture
//!        (DCL + idle,     (iframes,      (in-page WebGL      (png / jpeg)
//!         load fallback)   best-effort)   heuristic)
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rendershot::browser::{BrowserManager, LaunchConfig};
//! use rendershot::{CaptureRequest, CaptureService, ServiceSettings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = Arc::new(BrowserManager::new(LaunchConfig::default()));
//!     let service = Arc::new(CaptureService::new(manager.clone(), ServiceSettings::default()));
//!
//!     let shot = service.capture(&CaptureRequest::new("https://threejs.org/examples/")).await?;
//!     std::fs::write("scene.png", &shot.data)?;
//!
//!     manager.shutdown().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod browser;
pub mod config;
pub mod error;
pub mod handlers;
pub mod request;
pub mod service;
pub mod shutdown;

// Re-exports for convenience
pub use browser::{BrowserManager, CaptureFormat, CaptureResult};
pub use config::{Args, ServiceConfig};
pub use error::{Error, Result};
pub use request::{CaptureParams, CaptureRequest};
pub use service::{CaptureService, ServiceSettings};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
