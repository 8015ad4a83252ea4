//! Render-readiness detection for WebGL / three.js pages
//!
//! A page counts as ready when a WebGL canvas exists, no 3D assets are still
//! streaming, no loading indicator is showing and the primary canvas holds
//! something other than blank pixels. The check runs inside the page through
//! [`PageDriver::evaluate_bool`] on a fixed cadence with an attempt ceiling;
//! running out of attempts is a degraded continuation, not a failure.

use std::sync::OnceLock;
use std::time::Duration;

use serde::Serialize;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use super::driver::PageDriver;

/// Transparent 1x1 PNG as produced by `canvas.toDataURL()`
pub const BLANK_PIXEL_DATA_URL: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

/// Stops the page's animation loop so the captured frame is stable.
///
/// Pending animation-frame callbacks are cancelled and later registrations
/// are queued without ever being scheduled.
pub const FREEZE_ANIMATIONS_SCRIPT: &str = r#"
(() => {
    try {
        if (window.__rendershotFrozen || typeof window.requestAnimationFrame !== 'function') {
            return true;
        }
        const schedule = window.requestAnimationFrame.bind(window);
        const cancel = window.cancelAnimationFrame.bind(window);
        const latest = schedule(() => {});
        for (let id = latest; id > 0; id--) {
            try { cancel(id); } catch (_) {}
        }
        const held = [];
        window.requestAnimationFrame = (callback) => {
            held.push(callback);
            return latest + held.length;
        };
        window.cancelAnimationFrame = () => {};
        window.__rendershotFrozen = true;
        return true;
    } catch (_) {
        return false;
    }
})()
"#;

const HEURISTIC_TEMPLATE: &str = r#"
(() => {
    const config = __RENDERSHOT_CONFIG__;
    const safely = (check, fallback) => {
        try { return check(); } catch (_) { return fallback; }
    };

    try {
        const hasWebGlCanvas = safely(() =>
            Array.from(document.querySelectorAll('canvas')).some((canvas) =>
                ['webgl', 'webgl2', 'experimental-webgl'].some((kind) => canvas.getContext(kind) !== null)),
            false);

        const assetsInFlight = safely(() => {
            const now = performance.now();
            return performance.getEntriesByType('resource').some((entry) =>
                now - entry.startTime < config.recentWindowMs &&
                config.assetPatterns.some((pattern) => entry.name.includes(pattern)) &&
                (entry.responseEnd === 0 || entry.duration === 0));
        }, false);

        const loadingIndicated = safely(() => {
            const visible = Array.from(document.querySelectorAll(config.loadingSelectors.join(','))).some((el) => {
                const style = window.getComputedStyle(el);
                return style.display !== 'none' && style.visibility !== 'hidden';
            });
            return visible || config.loadingFlags.some((name) => window[name] === true);
        }, false);

        const canvasPainted = safely(() => {
            const canvas = document.querySelector('canvas');
            if (!canvas) {
                return true;
            }
            const pixels = canvas.toDataURL();
            if (pixels === config.blankPixel) {
                return false;
            }
            const gl = ['webgl2', 'webgl', 'experimental-webgl']
                .map((kind) => safely(() => canvas.getContext(kind), null))
                .find((context) => context !== null);
            const readable = gl
                ? safely(() => gl.getContextAttributes().preserveDrawingBuffer === true, false)
                : safely(() => canvas.getContext('2d') !== null, false);
            if (!readable) {
                return true;
            }
            const blank = document.createElement('canvas');
            blank.width = canvas.width;
            blank.height = canvas.height;
            return pixels !== blank.toDataURL();
        }, true);

        return hasWebGlCanvas && !assetsInFlight && !loadingIndicated && canvasPainted;
    } catch (_) {
        return false;
    }
})()
"#;

/// Inputs of the in-page readiness heuristic
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeuristicConfig {
    /// Resource-name fragments that identify mesh, texture and binary assets
    pub asset_patterns: Vec<String>,
    /// How far back a resource request still counts, in milliseconds
    pub recent_window_ms: u64,
    /// Selectors of loading indicators
    pub loading_selectors: Vec<String>,
    /// Global variables that signal loading when `true`
    pub loading_flags: Vec<String>,
    /// Data URL of a blank 1x1 canvas
    pub blank_pixel: String,
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        let owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            asset_patterns: owned(&[".glb", ".gltf", ".bin", "texture", "model"]),
            recent_window_ms: 30_000,
            loading_selectors: owned(&[
                "[data-loading=\"true\"]",
                ".loading",
                ".loader",
                ".progress",
                ".spinner",
            ]),
            loading_flags: owned(&["isLoading", "modelLoading", "assetsLoading", "sceneLoading"]),
            blank_pixel: BLANK_PIXEL_DATA_URL.to_string(),
        }
    }
}

impl HeuristicConfig {
    /// Render the heuristic as a self-contained expression yielding a boolean
    pub fn script(&self) -> String {
        // Serializing plain strings and integers cannot fail.
        let config = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        HEURISTIC_TEMPLATE.replace("__RENDERSHOT_CONFIG__", &config)
    }
}

/// The default heuristic script, rendered once
pub fn heuristic_script() -> &'static str {
    static SCRIPT: OnceLock<String> = OnceLock::new();
    SCRIPT.get_or_init(|| HeuristicConfig::default().script())
}

/// Poller cadence and bounds
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Delay between attempts (default: 50ms)
    pub interval: Duration,
    /// Attempt ceiling (default: 200)
    pub max_attempts: u32,
    /// Pause after a successful check (default: 500ms)
    pub grace: Duration,
    /// Hard bound on the whole wait (default: 600s)
    pub backstop: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(50),
            max_attempts: 200,
            grace: Duration::from_millis(500),
            backstop: Duration::from_secs(600),
        }
    }
}

impl PollerConfig {
    /// Total polling time when every attempt fails
    pub fn polling_budget(&self) -> Duration {
        self.interval * self.max_attempts
    }
}

/// How the readiness wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessOutcome {
    /// The heuristic passed
    Ready {
        /// Attempt that succeeded
        attempts: u32,
    },
    /// The attempt ceiling was reached
    Exhausted {
        /// Attempts made
        attempts: u32,
    },
    /// The outer backstop elapsed
    BackstopElapsed,
}

impl ReadinessOutcome {
    /// Whether the scene was positively detected as ready
    pub fn is_ready(&self) -> bool {
        matches!(self, ReadinessOutcome::Ready { .. })
    }
}

/// Polls the readiness heuristic
pub struct ReadinessPoller {
    config: PollerConfig,
    script: String,
}

impl ReadinessPoller {
    /// Poller using the default heuristic
    pub fn new(config: PollerConfig) -> Self {
        Self {
            config,
            script: heuristic_script().to_string(),
        }
    }

    /// Poller evaluating a custom heuristic
    pub fn with_heuristic(config: PollerConfig, heuristic: &HeuristicConfig) -> Self {
        Self {
            config,
            script: heuristic.script(),
        }
    }

    /// The poller configuration
    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Wait for the scene. Never fails; every ending lets capture proceed.
    #[instrument(skip(self, page))]
    pub async fn wait(&self, page: &dyn PageDriver) -> ReadinessOutcome {
        info!("Waiting for 3D scene to finish rendering");
        match tokio::time::timeout(self.config.backstop, self.poll(page)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(
                    "Readiness wait exceeded {}s backstop, capturing anyway",
                    self.config.backstop.as_secs()
                );
                ReadinessOutcome::BackstopElapsed
            }
        }
    }

    async fn poll(&self, page: &dyn PageDriver) -> ReadinessOutcome {
        let interval = self.config.interval;
        let mut ticker = interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        for attempt in 1..=self.config.max_attempts {
            ticker.tick().await;

            match page.evaluate_bool(&self.script).await {
                Ok(true) => {
                    info!(
                        "Scene ready after {} attempts (~{}ms)",
                        attempt,
                        (interval * attempt).as_millis()
                    );
                    self.freeze(page).await;
                    tokio::time::sleep(self.config.grace).await;
                    return ReadinessOutcome::Ready { attempts: attempt };
                }
                Ok(false) => {}
                Err(e) => debug!("Readiness check {} failed: {}", attempt, e),
            }

            if attempt % 40 == 0 {
                debug!("Still waiting for scene... ({}ms)", (interval * attempt).as_millis());
            }
        }

        info!(
            "Scene not ready after {} attempts, capturing anyway",
            self.config.max_attempts
        );
        ReadinessOutcome::Exhausted {
            attempts: self.config.max_attempts,
        }
    }

    async fn freeze(&self, page: &dyn PageDriver) {
        match page.evaluate_bool(FREEZE_ANIMATIONS_SCRIPT).await {
            Ok(true) => debug!("Animation frames frozen"),
            Ok(false) => warn!("Could not freeze animation frames"),
            Err(e) => warn!("Freezing animation frames failed: {}", e),
        }
    }
}

impl Default for ReadinessPoller {
    fn default() -> Self {
        Self::new(PollerConfig::default())
    }
}
