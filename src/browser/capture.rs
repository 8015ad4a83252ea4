//! Page capture functionality
//!
//! This module turns a settled page into encoded image bytes.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::driver::PageDriver;
use crate::error::{CaptureError, Error, Result};
use crate::request::CaptureRequest;

/// Image encoding of a capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CaptureFormat {
    /// PNG screenshot
    #[default]
    Png,
    /// JPEG screenshot
    Jpeg,
}

impl CaptureFormat {
    /// MIME type of images in this format
    pub fn mime_type(&self) -> &'static str {
        match self {
            CaptureFormat::Png => "image/png",
            CaptureFormat::Jpeg => "image/jpeg",
        }
    }
}

/// Parameters handed to the page's screenshot call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenshotSpec {
    /// Image encoding
    pub format: CaptureFormat,
    /// Capture beyond the viewport
    pub full_page: bool,
    /// Encoder quality, only ever set for JPEG
    pub quality: Option<u8>,
}

impl ScreenshotSpec {
    /// Derive the screenshot parameters from a resolved request
    pub fn for_request(request: &CaptureRequest) -> Self {
        Self {
            format: request.format,
            full_page: request.full_page,
            quality: request.effective_quality(),
        }
    }
}

/// Result of a capture operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureResult {
    /// The encoded image
    pub data: Vec<u8>,
    /// The format of the capture
    pub format: CaptureFormat,
}

impl CaptureResult {
    /// Get appropriate MIME type
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    /// Size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the capture holds no bytes
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Page capture functionality
pub struct PageCapture;

impl PageCapture {
    /// Take a screenshot, bounded by `timeout`
    #[instrument(skip(page))]
    pub async fn screenshot(
        page: &dyn PageDriver,
        spec: &ScreenshotSpec,
        timeout: Duration,
    ) -> Result<CaptureResult> {
        info!("Capturing screenshot");

        let data = tokio::time::timeout(timeout, page.screenshot(spec))
            .await
            .map_err(|_| CaptureError::Timeout(timeout.as_millis() as u64))?
            .map_err(|e| match e {
                Error::Capture(inner) => inner,
                other => CaptureError::ScreenshotFailed(other.to_string()),
            })?;

        if data.is_empty() {
            return Err(CaptureError::ScreenshotFailed("browser returned no image data".into()).into());
        }

        debug!("Screenshot captured: {} bytes", data.len());

        Ok(CaptureResult {
            data,
            format: spec.format,
        })
    }
}
