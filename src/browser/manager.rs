//! Browser lifecycle management
//!
//! One browser process is shared by every capture. It is launched lazily,
//! replaced after the CDP connection drops, and closed on process shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::Browser;
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use super::driver::{PageDriver, PageSource};
use super::launch::{LaunchConfig, LaunchStrategy};
use super::observer::SessionDiagnostics;
use super::page::ChromePage;
use crate::error::{BrowserError, Error, Result};

/// Whether the automation subsystem is usable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitState {
    /// The startup probe is still running
    Pending,
    /// Browsers can be launched
    Ready,
    /// The startup probe failed
    Failed(String),
}

/// A launched browser and the task driving its CDP connection
pub struct BrowserHandle {
    browser: RwLock<Browser>,
    handler: parking_lot::Mutex<Option<JoinHandle<()>>>,
    connected: Arc<AtomicBool>,
    strategy: &'static str,
}

impl BrowserHandle {
    /// Try each launch strategy in order; the last failure is reported
    #[instrument(skip(config), fields(mode = ?config.mode))]
    pub async fn launch(config: &LaunchConfig) -> Result<Self> {
        let mut last_failure = None;
        for strategy in config.strategies() {
            match Self::launch_with(config, &strategy).await {
                Ok(handle) => return Ok(handle),
                Err(e) => {
                    warn!(strategy = strategy.name(), "Browser launch attempt failed: {}", e);
                    last_failure = Some(e);
                }
            }
        }

        let cause = match last_failure {
            Some(Error::Browser(BrowserError::LaunchFailed(msg))) => msg,
            Some(other) => other.to_string(),
            None => "no launch strategy available".to_string(),
        };
        Err(BrowserError::LaunchFailed(cause).into())
    }

    async fn launch_with(config: &LaunchConfig, strategy: &LaunchStrategy) -> Result<Self> {
        let cdp_config = config.cdp_config(strategy)?;
        info!(
            strategy = strategy.name(),
            "Launching browser: headless={}", config.headless
        );

        let (browser, mut handler) = Browser::launch(cdp_config)
            .await
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        let connected = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&connected);
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                match event {
                    Ok(()) => {}
                    Err(CdpError::Ws(e)) => {
                        warn!("Browser connection lost: {}", e);
                        break;
                    }
                    Err(e) => debug!("Browser handler event error: {}", e),
                }
            }
            flag.store(false, Ordering::SeqCst);
            debug!("Browser handler finished");
        });

        info!(strategy = strategy.name(), "Browser launched successfully");

        Ok(Self {
            browser: RwLock::new(browser),
            handler: parking_lot::Mutex::new(Some(handler_task)),
            connected,
            strategy: strategy.name(),
        })
    }

    /// Whether the CDP connection is still alive
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Name of the strategy that produced this browser
    pub fn strategy(&self) -> &'static str {
        self.strategy
    }

    /// Open a blank tab
    pub async fn new_page(&self) -> Result<Page> {
        self.browser
            .read()
            .await
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::PageCreationFailed(e.to_string()).into())
    }

    /// Close the browser and wait briefly for its handler to finish
    pub async fn close(&self) -> Result<()> {
        let closed = self.browser.write().await.close().await;
        let task = self.handler.lock().take();
        if let Some(task) = task {
            let _ = tokio::time::timeout(Duration::from_secs(5), task).await;
        }
        self.connected.store(false, Ordering::SeqCst);
        closed.map(|_| ()).map_err(|e| Error::cdp(e.to_string()))
    }
}

/// Owner of the process-wide browser
pub struct BrowserManager {
    config: LaunchConfig,
    slot: Mutex<Option<Arc<BrowserHandle>>>,
    init: watch::Sender<InitState>,
}

impl BrowserManager {
    /// Create a manager. Managed deployments stay `Pending` until [`start`](Self::start)
    /// finishes its probe.
    pub fn new(config: LaunchConfig) -> Self {
        let initial = if config.mode.is_managed() {
            InitState::Pending
        } else {
            InitState::Ready
        };
        let (init, _) = watch::channel(initial);
        Self {
            config,
            slot: Mutex::new(None),
            init,
        }
    }

    /// Launch configuration in use
    pub fn config(&self) -> &LaunchConfig {
        &self.config
    }

    /// Current initialization state
    pub fn init_state(&self) -> InitState {
        self.init.borrow().clone()
    }

    /// Whether a connected browser is currently held
    pub async fn is_connected(&self) -> bool {
        self.slot
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| handle.is_connected())
    }

    /// Run the startup probe in the background when the deployment needs one
    pub fn start(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if !self.config.mode.is_managed() {
            return None;
        }
        let manager = Arc::clone(self);
        Some(tokio::spawn(async move {
            let verdict = manager.probe().await;
            manager.init.send_replace(verdict);
        }))
    }

    #[instrument(skip(self))]
    async fn probe(&self) -> InitState {
        info!(
            "Probing browser availability (timeout {}s)",
            self.config.probe_timeout.as_secs()
        );
        let attempt = async {
            let handle = BrowserHandle::launch(&self.config).await?;
            if let Err(e) = handle.close().await {
                debug!("Closing probe browser failed: {}", e);
            }
            Ok::<_, Error>(())
        };

        match tokio::time::timeout(self.config.probe_timeout, attempt).await {
            Ok(Ok(())) => {
                info!("Browser subsystem initialized");
                InitState::Ready
            }
            Ok(Err(e)) => {
                error!("Browser subsystem failed to initialize: {}", e);
                InitState::Failed(e.to_string())
            }
            Err(_) => {
                let reason = format!(
                    "browser probe timed out after {}s",
                    self.config.probe_timeout.as_secs()
                );
                error!("Browser subsystem failed to initialize: {}", reason);
                InitState::Failed(reason)
            }
        }
    }

    async fn initialized(&self) -> Result<()> {
        let mut verdict = self.init.subscribe();
        let state = verdict
            .wait_for(|state| *state != InitState::Pending)
            .await
            .map_err(|e| BrowserError::NotInitialized(e.to_string()))?
            .clone();
        match state {
            InitState::Failed(reason) => Err(BrowserError::NotInitialized(reason).into()),
            _ => Ok(()),
        }
    }

    /// The shared browser, launching a fresh one if none is connected
    pub async fn acquire(&self) -> Result<Arc<BrowserHandle>> {
        self.initialized().await?;

        let mut slot = self.slot.lock().await;
        if let Some(handle) = slot.as_ref() {
            if handle.is_connected() {
                return Ok(Arc::clone(handle));
            }
            warn!("Browser disconnected, launching a replacement");
        }

        let handle = Arc::new(BrowserHandle::launch(&self.config).await?);
        info!(strategy = handle.strategy(), "Browser ready");
        *slot = Some(Arc::clone(&handle));
        Ok(handle)
    }

    /// Close the live browser, if any
    #[instrument(skip(self))]
    pub async fn shutdown(&self) {
        let handle = self.slot.lock().await.take();
        if let Some(handle) = handle {
            info!("Closing browser");
            match handle.close().await {
                Ok(()) => info!("Browser closed"),
                Err(e) => warn!("Browser close failed: {}", e),
            }
        }
    }
}

#[async_trait]
impl PageSource for BrowserManager {
    async fn open_page(&self) -> Result<Box<dyn PageDriver>> {
        let handle = self.acquire().await?;
        let page = handle.new_page().await?;

        let diagnostics = Arc::new(SessionDiagnostics::new());
        match ChromePage::attach(page.clone(), diagnostics).await {
            Ok(session) => Ok(Box::new(session)),
            Err(e) => {
                if let Err(close) = page.close().await {
                    debug!("Closing half-initialized page failed: {}", close);
                }
                Err(BrowserError::PageCreationFailed(e.to_string()).into())
            }
        }
    }

    fn is_ready(&self) -> bool {
        *self.init.borrow() == InitState::Ready
    }
}
