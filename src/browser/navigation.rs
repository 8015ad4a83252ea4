//! Page navigation functionality
//!
//! Navigation first waits for `DOMContentLoaded` and then for network idle, so
//! scripts get to build the DOM before idleness is judged. If either step
//! fails the page gets one more chance to reach the plain `load` state.

use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, instrument, warn};

use super::driver::{LoadState, PageDriver};
use crate::error::{Error, NavigationError, Result};

/// Bounds for each navigation step
#[derive(Debug, Clone)]
pub struct NavigationOptions {
    /// Cap for reaching DOMContentLoaded (default: 60s)
    pub dom_content_loaded_timeout: Duration,
    /// Cap for network idle after DOMContentLoaded (default: 120s)
    pub network_idle_timeout: Duration,
    /// Cap for the `load` fallback (default: 30s)
    pub fallback_load_timeout: Duration,
}

impl Default for NavigationOptions {
    fn default() -> Self {
        Self {
            dom_content_loaded_timeout: Duration::from_secs(60),
            network_idle_timeout: Duration::from_secs(120),
            fallback_load_timeout: Duration::from_secs(30),
        }
    }
}

/// How navigation settled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationResult {
    /// DOMContentLoaded and network idle were both reached
    Settled {
        /// Navigation duration in milliseconds
        duration_ms: u64,
    },
    /// Only the `load` fallback was reached
    Degraded {
        /// Why the primary path failed
        cause: String,
        /// Navigation duration in milliseconds
        duration_ms: u64,
    },
}

impl NavigationResult {
    /// Whether the fallback path was taken
    pub fn is_degraded(&self) -> bool {
        matches!(self, NavigationResult::Degraded { .. })
    }
}

/// Page navigator
pub struct PageNavigator;

impl PageNavigator {
    /// Load `url` into the page.
    ///
    /// `ceiling` is the request's own timeout; every step is bounded by the
    /// smaller of its own cap and the ceiling.
    #[instrument(skip(page, options))]
    pub async fn load(
        page: &dyn PageDriver,
        url: &str,
        options: &NavigationOptions,
        ceiling: Duration,
    ) -> Result<NavigationResult> {
        let start = Instant::now();
        info!("Loading page: {}", url);

        let primary = Self::primary(page, url, options, ceiling).await;
        let cause = match primary {
            Ok(()) => {
                let duration_ms = start.elapsed().as_millis() as u64;
                info!("Page reached network idle in {}ms", duration_ms);
                return Ok(NavigationResult::Settled { duration_ms });
            }
            // Only Chrome's error document can reach `load` after this.
            Err(Error::Navigation(NavigationError::NetworkError(text))) => {
                error!("Navigation to {} failed: {}", url, text);
                return Err(NavigationError::LoadFailed {
                    url: url.to_string(),
                    cause: text,
                }
                .into());
            }
            Err(e) => e.to_string(),
        };

        warn!("Page load problem, falling back to load state: {}", cause);

        let fallback = options.fallback_load_timeout.min(ceiling);
        match bounded(fallback, LoadState::Load, page.wait_for_load_state(LoadState::Load)).await
        {
            Ok(()) => {
                let duration_ms = start.elapsed().as_millis() as u64;
                info!("Page reached load state (degraded) in {}ms", duration_ms);
                Ok(NavigationResult::Degraded { cause, duration_ms })
            }
            Err(e) => {
                error!("Page load failed completely: {}", e);
                Err(NavigationError::LoadFailed {
                    url: url.to_string(),
                    cause: e.to_string(),
                }
                .into())
            }
        }
    }

    async fn primary(
        page: &dyn PageDriver,
        url: &str,
        options: &NavigationOptions,
        ceiling: Duration,
    ) -> Result<()> {
        let dcl = options.dom_content_loaded_timeout.min(ceiling);
        bounded(dcl, LoadState::DomContentLoaded, async {
            page.goto(url).await?;
            page.wait_for_load_state(LoadState::DomContentLoaded).await
        })
        .await?;
        debug!("DOMContentLoaded reached, waiting for network idle");

        let idle = options.network_idle_timeout.min(ceiling);
        bounded(
            idle,
            LoadState::NetworkIdle,
            page.wait_for_load_state(LoadState::NetworkIdle),
        )
        .await
    }
}

/// Run `fut` under `limit`, reporting an elapsed limit as a navigation timeout
pub(crate) async fn bounded<F>(limit: Duration, state: LoadState, fut: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| NavigationError::Timeout {
            state,
            after_ms: limit.as_millis() as u64,
        })?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigation_options_default() {
        let opts = NavigationOptions::default();
        assert_eq!(opts.dom_content_loaded_timeout, Duration::from_secs(60));
        assert_eq!(opts.network_idle_timeout, Duration::from_secs(120));
        assert_eq!(opts.fallback_load_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_navigation_result_degraded() {
        let settled = NavigationResult::Settled { duration_ms: 10 };
        let degraded = NavigationResult::Degraded {
            cause: "Timed out".to_string(),
            duration_ms: 10,
        };
        assert!(!settled.is_degraded());
        assert!(degraded.is_degraded());
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_reports_timeout() {
        let err = bounded(
            Duration::from_millis(250),
            LoadState::Load,
            futures::future::pending(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "Navigation error: Timed out after 250ms waiting for load");
    }

    #[tokio::test]
    async fn test_bounded_passes_through() {
        assert!(bounded(Duration::from_secs(1), LoadState::Load, async { Ok(()) })
            .await
            .is_ok());
    }
}
