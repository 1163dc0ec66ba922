//! Enrollment window status as served to portal clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where the current instant falls relative to the enrollment window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WindowPhase {
    NotYetOpen,
    Open,
    Closed,
}

/// Wall-clock style countdown: hours wrap at 24, minutes and seconds at 60.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Countdown {
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

impl std::fmt::Display for Countdown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:02}h {:02}m {:02}s",
            self.hours, self.minutes, self.seconds
        )
    }
}

/// Snapshot of the window gate at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowStatus {
    pub phase: WindowPhase,
    pub open: bool,
    pub countdown: Countdown,
    pub time_left_percentage: f64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}
