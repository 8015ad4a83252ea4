//! Browser launch configuration
//!
//! Launch arguments depend on the deployment mode, and launching is an ordered
//! list of strategies tried in turn until one produces a browser.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chromiumoxide::browser::BrowserConfig as CdpBrowserConfig;

use crate::error::{BrowserError, Result};

/// Executable used in container mode when none is configured
pub const CONTAINER_CHROME_PATH: &str = "/usr/bin/chromium-browser";

/// Arguments passed to every launch
pub const BASE_ARGS: &[&str] = &[
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--disable-dev-shm-usage",
    "--disable-accelerated-2d-canvas",
    "--no-first-run",
    "--no-zygote",
    "--disable-gpu",
    "--disable-web-security",
    "--disable-features=TranslateUI",
    "--disable-ipc-flooding-protection",
    "--ignore-certificate-errors",
    "--ignore-ssl-errors",
    "--ignore-certificate-errors-spki-list",
];

/// Extra hardening arguments for container deployments
pub const CONTAINER_ARGS: &[&str] = &[
    "--disable-background-timer-throttling",
    "--disable-backgrounding-occluded-windows",
    "--disable-renderer-backgrounding",
    "--disable-software-rasterizer",
    "--single-process",
];

/// Well-known install locations of Google Chrome
const SYSTEM_CHROME_PATHS: &[&str] = &[
    "/usr/bin/google-chrome-stable",
    "/usr/bin/google-chrome",
    "/opt/google/chrome/chrome",
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
];

/// Where the service runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeploymentMode {
    /// Developer machine
    #[default]
    Local,
    /// Managed host; the browser install is probed at startup
    Production,
    /// Container image; hardened arguments and no launch fallback
    Container,
}

impl DeploymentMode {
    /// Whether browser availability is probed at startup
    pub fn is_managed(&self) -> bool {
        !matches!(self, DeploymentMode::Local)
    }

    /// Whether container hardening applies
    pub fn is_container(&self) -> bool {
        matches!(self, DeploymentMode::Container)
    }
}

/// Configuration for browser launch
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    /// Deployment mode
    pub mode: DeploymentMode,
    /// Run in headless mode (default: true)
    pub headless: bool,
    /// Path to Chrome/Chromium executable (None = auto-detect)
    pub chrome_path: Option<PathBuf>,
    /// Timeout for individual CDP commands (default: 600s)
    pub request_timeout: Duration,
    /// Timeout for the startup probe (default: 10s)
    pub probe_timeout: Duration,
    /// Additional Chrome arguments
    pub extra_args: Vec<String>,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            mode: DeploymentMode::Local,
            headless: true,
            chrome_path: None,
            request_timeout: Duration::from_secs(600),
            probe_timeout: Duration::from_secs(10),
            extra_args: Vec::new(),
        }
    }
}

impl LaunchConfig {
    /// Create a new config builder
    pub fn builder() -> LaunchConfigBuilder {
        LaunchConfigBuilder::default()
    }

    /// Full argument list for this deployment
    pub fn args(&self) -> Vec<String> {
        let mut args: Vec<String> = BASE_ARGS.iter().map(|a| a.to_string()).collect();
        if self.mode.is_container() {
            args.extend(CONTAINER_ARGS.iter().map(|a| a.to_string()));
        }
        args.extend(self.extra_args.iter().cloned());
        args
    }

    /// Strategies to attempt, in order
    pub fn strategies(&self) -> Vec<LaunchStrategy> {
        if self.mode.is_container() {
            let path = self
                .chrome_path
                .clone()
                .unwrap_or_else(|| PathBuf::from(CONTAINER_CHROME_PATH));
            return vec![LaunchStrategy::Configured(Some(path))];
        }
        vec![
            LaunchStrategy::Configured(self.chrome_path.clone()),
            LaunchStrategy::SystemChrome,
        ]
    }

    /// chromiumoxide configuration for one strategy
    pub(crate) fn cdp_config(&self, strategy: &LaunchStrategy) -> Result<CdpBrowserConfig> {
        let mut builder = CdpBrowserConfig::builder()
            .request_timeout(self.request_timeout)
            .viewport(None)
            .args(self.args());

        if !self.headless {
            builder = builder.with_head();
        }

        if let Some(path) = strategy.executable()? {
            builder = builder.chrome_executable(path);
        }

        builder
            .build()
            .map_err(|e| BrowserError::ConfigError(e).into())
    }
}

/// Builder for LaunchConfig
#[derive(Default)]
pub struct LaunchConfigBuilder {
    config: LaunchConfig,
}

impl LaunchConfigBuilder {
    /// Set deployment mode
    pub fn mode(mut self, mode: DeploymentMode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Set headless mode
    pub fn headless(mut self, headless: bool) -> Self {
        self.config.headless = headless;
        self
    }

    /// Set Chrome path
    pub fn chrome_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config.chrome_path = Some(path.into());
        self
    }

    /// Set CDP command timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Set startup probe timeout
    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.config.probe_timeout = timeout;
        self
    }

    /// Add extra Chrome argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.config.extra_args.push(arg.into());
        self
    }

    /// Build the config
    pub fn build(self) -> LaunchConfig {
        self.config
    }
}

/// One way of starting a browser
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchStrategy {
    /// The configured executable, or chromiumoxide's auto-detection
    Configured(Option<PathBuf>),
    /// The host's system-installed Google Chrome
    SystemChrome,
}

impl LaunchStrategy {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            LaunchStrategy::Configured(_) => "configured",
            LaunchStrategy::SystemChrome => "system-chrome",
        }
    }

    /// Executable to launch; `None` lets chromiumoxide detect one
    pub fn executable(&self) -> Result<Option<PathBuf>> {
        match self {
            LaunchStrategy::Configured(path) => Ok(path.clone()),
            LaunchStrategy::SystemChrome => system_chrome_path()
                .map(Some)
                .ok_or_else(|| {
                    BrowserError::LaunchFailed("no system Chrome installation found".into())
                        .into()
                }),
        }
    }
}

/// First existing well-known Chrome install location
pub fn system_chrome_path() -> Option<PathBuf> {
    SYSTEM_CHROME_PATHS
        .iter()
        .map(Path::new)
        .find(|p| p.is_file())
        .map(Path::to_path_buf)
}
