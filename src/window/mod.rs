//! Enrollment window gate.
//!
//! The window is a half-open interval `[start, end)` fixed at configuration load. Every
//! function takes `now` explicitly so the gate and the countdown always agree.

mod ticker;

pub use ticker::WindowTicker;

use chrono::{DateTime, Utc};

use crate::errors::AppError;
use crate::models::{Countdown, WindowPhase, WindowStatus};

/// The configured enrollment window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrollmentWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl EnrollmentWindow {
    /// Build a window; `start` must be strictly before `end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, AppError> {
        if start >= end {
            return Err(AppError::Config(format!(
                "Enrollment window start ({}) must be before end ({})",
                start.to_rfc3339(),
                end.to_rfc3339()
            )));
        }
        Ok(Self { start, end })
    }

    /// Parse a window from two RFC 3339 timestamps.
    pub fn parse(start: &str, end: &str) -> Result<Self, AppError> {
        Self::new(parse_instant(start)?, parse_instant(end)?)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Claiming is permitted iff `start <= now < end`.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.start <= now && now < self.end
    }

    pub fn phase(&self, now: DateTime<Utc>) -> WindowPhase {
        if now < self.start {
            WindowPhase::NotYetOpen
        } else if now < self.end {
            WindowPhase::Open
        } else {
            WindowPhase::Closed
        }
    }

    /// Time until the window opens, or until it closes while open; zero afterwards.
    pub fn countdown(&self, now: DateTime<Utc>) -> Countdown {
        let target = match self.phase(now) {
            WindowPhase::NotYetOpen => self.start,
            WindowPhase::Open => self.end,
            WindowPhase::Closed => return Countdown::default(),
        };

        let remaining = (target - now).num_seconds();
        Countdown {
            hours: (remaining / 3600) % 24,
            minutes: (remaining / 60) % 60,
            seconds: remaining % 60,
        }
    }

    /// Share of the window still left, in percent.
    pub fn time_left_percentage(&self, now: DateTime<Utc>) -> f64 {
        match self.phase(now) {
            WindowPhase::NotYetOpen => 100.0,
            WindowPhase::Closed => 0.0,
            WindowPhase::Open => {
                let total = (self.end - self.start).num_milliseconds() as f64;
                let left = (self.end - now).num_milliseconds() as f64;
                (left / total * 100.0).clamp(0.0, 100.0)
            }
        }
    }

    pub fn status(&self, now: DateTime<Utc>) -> WindowStatus {
        WindowStatus {
            phase: self.phase(now),
            open: self.is_open(now),
            countdown: self.countdown(now),
            time_left_percentage: self.time_left_percentage(now),
            start: self.start,
            end: self.end,
        }
    }
}

fn parse_instant(value: &str) -> Result<DateTime<Utc>, AppError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::Config(format!("Invalid timestamp {:?}: {}", value, e)))
}
