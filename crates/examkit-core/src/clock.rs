//! Session countdown clock.
//!
//! The clock is passive: something outside calls [`SessionClock::tick`] once
//! per second (the engine's ticker task, or a test). It reports expiry
//! exactly once and ignores every tick after that.

use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Remaining time at or below which the display turns critical.
pub const CRITICAL_THRESHOLD_SECS: u32 = 60;
/// Remaining time at or below which the display turns to a warning.
pub const WARNING_THRESHOLD_SECS: u32 = 300;

/// Presentation urgency for the remaining time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Normal,
    Warning,
    Critical,
}

impl Urgency {
    pub fn from_remaining(remaining_secs: u32) -> Self {
        if remaining_secs <= CRITICAL_THRESHOLD_SECS {
            Urgency::Critical
        } else if remaining_secs <= WARNING_THRESHOLD_SECS {
            Urgency::Warning
        } else {
            Urgency::Normal
        }
    }
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockTick {
    /// Clock not started, stopped, or already expired.
    Idle,
    /// Counted down; time remains.
    Running { remaining_secs: u32 },
    /// Remaining time just reached zero. Reported once.
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClock {
    duration_secs: Option<u32>,
    remaining_secs: u32,
    running: bool,
    expired: bool,
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionClock {
    /// An unstarted clock.
    pub fn new() -> Self {
        Self {
            duration_secs: None,
            remaining_secs: 0,
            running: false,
            expired: false,
        }
    }

    /// Begin counting down from `duration_secs`.
    pub fn start(&mut self, duration_secs: u32) -> Result<(), SessionError> {
        if self.duration_secs.is_some() {
            return Err(SessionError::AlreadyStarted);
        }
        self.duration_secs = Some(duration_secs);
        self.remaining_secs = duration_secs;
        self.running = true;
        Ok(())
    }

    /// Advance by one second.
    pub fn tick(&mut self) -> ClockTick {
        if !self.running || self.expired {
            return ClockTick::Idle;
        }
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.remaining_secs == 0 {
            self.expired = true;
            self.running = false;
            return ClockTick::Expired;
        }
        ClockTick::Running {
            remaining_secs: self.remaining_secs,
        }
    }

    /// Stop counting; later ticks are no-ops.
    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    /// Configured duration, or 0 if never started.
    pub fn duration_secs(&self) -> u32 {
        self.duration_secs.unwrap_or(0)
    }

    pub fn elapsed_secs(&self) -> u32 {
        self.duration_secs().saturating_sub(self.remaining_secs)
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn has_expired(&self) -> bool {
        self.expired
    }

    pub fn urgency(&self) -> Urgency {
        Urgency::from_remaining(self.remaining_secs)
    }
}

/// Format seconds as `mm:ss`, or `h:mm:ss` from one hour up.
pub fn format_remaining(secs: u32) -> String {
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}
