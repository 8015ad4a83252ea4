//! Capture request parameters
//!
//! `CaptureParams` is the wire shape accepted by the HTTP adapter, either as a
//! JSON body or as query parameters. Every field is optional there;
//! [`CaptureParams::resolve`] fills in defaults and validates the result into
//! a [`CaptureRequest`] before any pipeline stage runs.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::browser::CaptureFormat;
use crate::error::{Error, Result};

/// Default viewport width in pixels
pub const DEFAULT_WIDTH: u32 = 1920;
/// Default viewport height in pixels
pub const DEFAULT_HEIGHT: u32 = 1080;
/// Default ceiling for the whole operation in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 600_000;
/// Default JPEG quality
pub const DEFAULT_QUALITY: u8 = 90;

/// Capture parameters as received from a client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureParams {
    /// Absolute URL of the page to capture
    pub url: Option<String>,
    /// Viewport width
    pub width: Option<u32>,
    /// Viewport height
    pub height: Option<u32>,
    /// Capture the full scrollable page
    pub full_page: Option<bool>,
    /// Ceiling for the whole operation, in milliseconds
    pub timeout: Option<u64>,
    /// Poll for 3D-scene readiness before capturing
    pub wait_for_three_js: Option<bool>,
    /// Image encoding
    pub format: Option<CaptureFormat>,
    /// JPEG quality (0-100)
    pub quality: Option<u8>,
}

/// A fully resolved capture request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureRequest {
    /// Absolute URL of the page to capture
    pub url: String,
    /// Viewport width
    pub width: u32,
    /// Viewport height
    pub height: u32,
    /// Capture the full scrollable page
    pub full_page: bool,
    /// Ceiling for the whole operation, in milliseconds
    pub timeout: u64,
    /// Poll for 3D-scene readiness before capturing
    pub wait_for_three_js: bool,
    /// Image encoding
    pub format: CaptureFormat,
    /// JPEG quality; ignored for PNG
    pub quality: u8,
}

impl CaptureRequest {
    /// Request for `url` with every other field at its default
    pub fn new<S: Into<String>>(url: S) -> Self {
        Self {
            url: url.into(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            full_page: true,
            timeout: DEFAULT_TIMEOUT_MS,
            wait_for_three_js: true,
            format: CaptureFormat::Png,
            quality: DEFAULT_QUALITY,
        }
    }

    /// The operation ceiling as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }

    /// Quality to hand to the encoder, present only for JPEG
    pub fn effective_quality(&self) -> Option<u8> {
        match self.format {
            CaptureFormat::Jpeg => Some(self.quality),
            CaptureFormat::Png => None,
        }
    }
}

impl CaptureParams {
    /// Params carrying only a URL
    pub fn for_url<S: Into<String>>(url: S) -> Self {
        Self {
            url: Some(url.into()),
            ..Default::default()
        }
    }

    /// Apply defaults and validate
    pub fn resolve(self) -> Result<CaptureRequest> {
        let url = self
            .url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .ok_or_else(|| Error::invalid("url is required"))?;
        validate_url(&url)?;

        let defaults = CaptureRequest::new(url);
        let request = CaptureRequest {
            width: self.width.unwrap_or(defaults.width),
            height: self.height.unwrap_or(defaults.height),
            full_page: self.full_page.unwrap_or(defaults.full_page),
            timeout: self.timeout.unwrap_or(defaults.timeout),
            wait_for_three_js: self.wait_for_three_js.unwrap_or(defaults.wait_for_three_js),
            format: self.format.unwrap_or(defaults.format),
            quality: self.quality.unwrap_or(defaults.quality),
            ..defaults
        };

        if request.width == 0 || request.height == 0 {
            return Err(Error::invalid(format!(
                "viewport must be non-empty, got {}x{}",
                request.width, request.height
            )));
        }
        if request.timeout == 0 {
            return Err(Error::invalid("timeout must be greater than zero"));
        }
        if request.quality > 100 {
            return Err(Error::invalid(format!(
                "quality must be between 0 and 100, got {}",
                request.quality
            )));
        }

        Ok(request)
    }
}

fn validate_url(raw: &str) -> Result<()> {
    let parsed = Url::parse(raw).map_err(|e| Error::invalid(format!("invalid url {raw}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(Error::invalid(format!(
            "url must use http or https, got {other}://"
        ))),
    }
}
