//! Per-second recomputation of the window status for countdown displays.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::EnrollmentWindow;
use crate::models::WindowStatus;

/// Background task publishing the window status once per period.
///
/// The task is aborted when the ticker is dropped, so a view that owns a ticker cannot
/// leak periodic work.
pub struct WindowTicker {
    rx: watch::Receiver<WindowStatus>,
    handle: JoinHandle<()>,
}

impl WindowTicker {
    pub fn spawn(window: EnrollmentWindow) -> Self {
        Self::spawn_with_period(window, Duration::from_secs(1))
    }

    pub fn spawn_with_period(window: EnrollmentWindow, period: Duration) -> Self {
        let (tx, rx) = watch::channel(window.status(Utc::now()));

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if tx.send(window.status(Utc::now())).is_err() {
                    break;
                }
            }
        });

        Self { rx, handle }
    }

    /// Latest published status.
    pub fn current(&self) -> WindowStatus {
        self.rx.borrow().clone()
    }

    /// Wait for the next tick. Returns `None` once the ticker task has stopped.
    pub async fn next(&mut self) -> Option<WindowStatus> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// An independent receiver of the same status stream.
    pub fn subscribe(&self) -> watch::Receiver<WindowStatus> {
        self.rx.clone()
    }
}

impl Drop for WindowTicker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn open_window() -> EnrollmentWindow {
        let now = Utc::now();
        EnrollmentWindow::new(now - ChronoDuration::hours(1), now + ChronoDuration::hours(1))
            .unwrap()
    }

    #[tokio::test]
    async fn test_ticker_publishes_status() {
        let mut ticker = WindowTicker::spawn_with_period(open_window(), Duration::from_millis(10));
        assert!(ticker.current().open);

        let status = tokio::time::timeout(Duration::from_secs(2), ticker.next())
            .await
            .expect("tick timed out")
            .expect("ticker stopped");
        assert!(status.open);
    }

    #[tokio::test]
    async fn test_dropping_ticker_stops_task() {
        let ticker = WindowTicker::spawn_with_period(open_window(), Duration::from_millis(10));
        let mut rx = ticker.subscribe();
        drop(ticker);

        let stopped = tokio::time::timeout(Duration::from_secs(2), async {
            while rx.changed().await.is_ok() {}
        })
        .await;
        assert!(stopped.is_ok(), "ticker task kept running after drop");
    }
}
