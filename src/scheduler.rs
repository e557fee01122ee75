//! Wall-clock driver for the inbox poller.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::poller::InboxPoller;

/// Spawn a background task that runs a poll cycle every `interval`.
///
/// The first cycle fires one interval after start. Cycles never overlap: the
/// interval restarts when a cycle finishes, so the next cycle begins a full
/// interval later even if this one overran. Each cycle runs on the blocking
/// pool so the HTTP server keeps serving.
///
/// Returns a `JoinHandle` and a shutdown flag. Set the flag to stop polling.
pub fn spawn_poll_scheduler(
    poller: Arc<InboxPoller>,
    interval: Duration,
) -> (JoinHandle<()>, Arc<AtomicBool>) {
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = Arc::clone(&shutdown);

    let handle = tokio::spawn(async move {
        info!("Inbox poller started, polling every {}s", interval.as_secs());

        let mut tick = tokio::time::interval(interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // Skip immediate first tick
        tick.tick().await;

        loop {
            tick.tick().await;

            if shutdown.load(Ordering::Relaxed) {
                info!("Inbox poller shutting down");
                return;
            }

            let poller = Arc::clone(&poller);
            match tokio::task::spawn_blocking(move || poller.run_cycle()).await {
                Ok(Ok(report)) if report.found > 0 => {
                    info!(
                        found = report.found,
                        replied = report.replied,
                        skipped = report.skipped,
                        failed = report.failed,
                        "Poll cycle finished"
                    );
                }
                Ok(Ok(_)) => debug!("Poll cycle finished, inbox empty"),
                Ok(Err(e)) => error!("Poll cycle aborted: {e}"),
                Err(e) => error!("Poll cycle task panicked: {e}"),
            }

            tick.reset();
        }
    });

    (handle, shutdown_flag)
}
