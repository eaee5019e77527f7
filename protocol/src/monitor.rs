//! Swap status monitor
//!
//! Polls the relayer until a swap reaches a terminal status. Poll failures
//! are never a swap outcome: they only stretch the delay before the next
//! poll (doubling, capped at `max_backoff`), and the first successful poll
//! brings it back to `poll_interval`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::relayer::{RelayerClient, SwapStatusReport};
use crate::swap::SwapStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    pub poll_interval: Duration,
    pub max_backoff: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            max_backoff: Duration::from_secs(60),
        }
    }
}

impl MonitorConfig {
    /// Delay after `failures` consecutive failed polls
    pub fn backoff(&self, failures: u32) -> Duration {
        if failures == 0 {
            return self.poll_interval;
        }
        let factor = 1u32.checked_shl(failures.min(31)).unwrap_or(u32::MAX);
        self.poll_interval.saturating_mul(factor).min(self.max_backoff.max(self.poll_interval))
    }
}

/// Poll `swap_id` until it is terminal and return the terminal status.
///
/// `on_update` sees every report, in order. A report that would move the
/// swap backwards is logged and dropped. Nothing is polled after the
/// terminal report.
pub async fn monitor_swap<L, F>(relayer: &L, swap_id: &str, config: &MonitorConfig, mut on_update: F) -> SwapStatus
where
    L: RelayerClient,
    F: FnMut(&SwapStatusReport),
{
    let mut last: Option<SwapStatus> = None;
    let mut failures = 0u32;

    loop {
        match relayer.get_swap_status(swap_id).await {
            Ok(report) => {
                failures = 0;
                let status = report.status;
                match last {
                    Some(prev) if prev != status && !prev.can_transition_to(status) => {
                        warn!(%swap_id, from = %prev, to = %status, "ignoring backwards status report");
                    }
                    _ => {
                        if last != Some(status) {
                            info!(%swap_id, %status, "swap status changed");
                        }
                        last = Some(status);
                        on_update(&report);
                        if status.is_terminal() {
                            return status;
                        }
                    }
                }
            }
            Err(e) => {
                failures = failures.saturating_add(1);
                warn!(
                    %swap_id,
                    error = %e,
                    failures,
                    "status poll failed, retrying in {:?}",
                    config.backoff(failures)
                );
            }
        }

        let delay = config.backoff(failures);
        debug!(%swap_id, ?delay, "next status poll");
        tokio::time::sleep(delay).await;
    }
}

/// Background monitor for one swap.
///
/// Dropping the handle stops polling. Polling is read-only, so stopping it
/// has no effect on either chain.
#[derive(Debug)]
pub struct MonitorHandle {
    updates: mpsc::UnboundedReceiver<SwapStatusReport>,
    task: Option<JoinHandle<SwapStatus>>,
}

impl MonitorHandle {
    /// Next report, or `None` once the monitor has stopped and every report was read
    pub async fn next_update(&mut self) -> Option<SwapStatusReport> {
        self.updates.recv().await
    }

    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Terminal status, or `None` if the monitor was cancelled
    pub async fn finished(mut self) -> Option<SwapStatus> {
        let task = self.task.take()?;
        task.await.ok()
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

pub fn spawn_monitor<L>(relayer: Arc<L>, swap_id: String, config: MonitorConfig) -> MonitorHandle
where
    L: RelayerClient + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(async move {
        monitor_swap(&relayer, &swap_id, &config, |report| {
            // receiver gone means nobody is listening; keep polling to the end anyway
            let _ = tx.send(report.clone());
        })
        .await
    });
    MonitorHandle {
        updates: rx,
        task: Some(task),
    }
}
