//! Periodic stats polling for the landing view.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::models::Stats;
use crate::store::EnrollmentStore;

/// How often the landing view refreshes its counts.
pub const DEFAULT_STATS_INTERVAL: Duration = Duration::from_secs(30);

/// Background task fetching [`Stats`] now and then every interval.
///
/// A failed fetch keeps the last known value. Dropping the poller stops the task.
pub struct StatsPoller {
    rx: watch::Receiver<Stats>,
    handle: JoinHandle<()>,
}

impl StatsPoller {
    pub fn spawn(store: Arc<dyn EnrollmentStore>) -> Self {
        Self::spawn_with_interval(store, DEFAULT_STATS_INTERVAL)
    }

    pub fn spawn_with_interval(store: Arc<dyn EnrollmentStore>, period: Duration) -> Self {
        let (tx, rx) = watch::channel(Stats::default());

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                match store.stats().await {
                    Ok(stats) => {
                        if tx.send(stats).is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::warn!("Failed to fetch stats: {}", e),
                }
            }
        });

        Self { rx, handle }
    }

    /// Last successfully fetched counts (all zero before the first success).
    pub fn latest(&self) -> Stats {
        *self.rx.borrow()
    }

    /// Wait for the next successful fetch. `None` once the task has stopped.
    pub async fn next(&mut self) -> Option<Stats> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }
}

impl Drop for StatsPoller {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
