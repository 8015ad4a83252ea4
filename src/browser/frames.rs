//! Frame tree settling
//!
//! Best-effort: a slow or broken iframe is logged and skipped, never allowed
//! to abort the capture of the rest of the page.

use std::time::Duration;

use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use tracing::{debug, info, instrument, warn};

use super::driver::{FrameNode, LoadState, PageDriver};

/// Bounds for frame settling
#[derive(Debug, Clone)]
pub struct FrameWaitOptions {
    /// Per-frame cap for DOMContentLoaded (default: 10s)
    pub frame_timeout: Duration,
    /// Cap for the trailing network-idle wait (default: 15s)
    pub network_idle_timeout: Duration,
}

impl Default for FrameWaitOptions {
    fn default() -> Self {
        Self {
            frame_timeout: Duration::from_secs(10),
            network_idle_timeout: Duration::from_secs(15),
        }
    }
}

/// Aggregated outcome of a frame walk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameWaitReport {
    /// Frames that reached DOMContentLoaded
    pub settled: usize,
    /// Frames that hit the per-frame timeout
    pub timed_out: usize,
    /// Frames whose wait failed outright
    pub failed: usize,
    /// Whether the trailing network-idle wait succeeded
    pub network_idle: bool,
}

impl FrameWaitReport {
    fn merge(mut self, other: FrameWaitReport) -> Self {
        self.settled += other.settled;
        self.timed_out += other.timed_out;
        self.failed += other.failed;
        self
    }
}

/// Waits for nested frames
pub struct FrameWaiter;

impl FrameWaiter {
    /// Walk the page's frame tree, then wait for network idle
    #[instrument(skip(page, options))]
    pub async fn settle(page: &dyn PageDriver, options: &FrameWaitOptions) -> FrameWaitReport {
        let mut report = match page.frame_tree().await {
            Ok(tree) => {
                debug!("Frame tree has {} nested frames", tree.descendant_count());
                Self::settle_children(page, &tree, options).await
            }
            Err(e) => {
                warn!("Could not read frame tree: {}", e);
                FrameWaitReport::default()
            }
        };

        report.network_idle = match tokio::time::timeout(
            options.network_idle_timeout,
            page.wait_for_load_state(LoadState::NetworkIdle),
        )
        .await
        {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!("Network idle wait after frames failed: {}", e);
                false
            }
            Err(_) => {
                warn!(
                    "Network did not idle within {}ms after frames settled",
                    options.network_idle_timeout.as_millis()
                );
                false
            }
        };

        info!(
            settled = report.settled,
            timed_out = report.timed_out,
            failed = report.failed,
            network_idle = report.network_idle,
            "Frames settled"
        );
        report
    }

    fn settle_children<'a>(
        page: &'a dyn PageDriver,
        node: &'a FrameNode,
        options: &'a FrameWaitOptions,
    ) -> BoxFuture<'a, FrameWaitReport> {
        async move {
            let waits = node
                .children
                .iter()
                .map(|child| Self::settle_frame(page, child, options));
            join_all(waits)
                .await
                .into_iter()
                .fold(FrameWaitReport::default(), FrameWaitReport::merge)
        }
        .boxed()
    }

    async fn settle_frame(
        page: &dyn PageDriver,
        frame: &FrameNode,
        options: &FrameWaitOptions,
    ) -> FrameWaitReport {
        let wait = page.wait_for_frame_state(&frame.id, LoadState::DomContentLoaded);
        match tokio::time::timeout(options.frame_timeout, wait).await {
            Ok(Ok(())) => {
                debug!("Frame {} ({}) loaded", frame.id, frame.url);
                let own = FrameWaitReport {
                    settled: 1,
                    ..Default::default()
                };
                own.merge(Self::settle_children(page, frame, options).await)
            }
            Ok(Err(e)) => {
                warn!("Frame {} ({}) failed to load: {}", frame.id, frame.url, e);
                FrameWaitReport {
                    failed: 1,
                    ..Default::default()
                }
            }
            Err(_) => {
                warn!(
                    "Frame {} ({}) load timed out after {}ms",
                    frame.id,
                    frame.url,
                    options.frame_timeout.as_millis()
                );
                FrameWaitReport {
                    timed_out: 1,
                    ..Default::default()
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_wait_options_default() {
        let opts = FrameWaitOptions::default();
        assert_eq!(opts.frame_timeout, Duration::from_secs(10));
        assert_eq!(opts.network_idle_timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_report_merge() {
        let a = FrameWaitReport {
            settled: 2,
            timed_out: 1,
            failed: 0,
            network_idle: false,
        };
        let b = FrameWaitReport {
            settled: 1,
            timed_out: 0,
            failed: 1,
            network_idle: true,
        };
        let merged = a.merge(b);
        assert_eq!(merged.settled, 3);
        assert_eq!(merged.timed_out, 1);
        assert_eq!(merged.failed, 1);
    }
}
