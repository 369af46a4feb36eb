//! Timer records and the input shapes used to create and patch them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TimerError};

/// Unique timer identifier, assigned monotonically and never reused
pub type TimerId = u64;

/// Lifecycle status of an active timer
///
/// Completed timers leave the active set, so there is no `Completed` variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    #[default]
    Idle,
    Running,
    Paused,
}

/// A single countdown unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timer {
    pub id: TimerId,
    pub name: String,
    pub category: String,
    /// Total seconds, fixed at creation
    pub duration: u64,
    pub remaining_time: u64,
    #[serde(default)]
    pub status: TimerStatus,
    #[serde(default)]
    pub halfway_alert: bool,
    #[serde(default)]
    pub halfway_alert_triggered: bool,
}

impl Timer {
    /// Build an idle timer with a full countdown from validated fields
    pub fn new(id: TimerId, fields: NewTimer) -> Self {
        Self {
            id,
            name: fields.name.trim().to_string(),
            category: fields.category.trim().to_string(),
            duration: fields.duration,
            remaining_time: fields.duration,
            status: TimerStatus::Idle,
            halfway_alert: fields.halfway_alert,
            halfway_alert_triggered: false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == TimerStatus::Running
    }

    /// Put the timer back to a full, idle countdown with the halfway latch cleared
    pub fn reset(&mut self) {
        self.remaining_time = self.duration;
        self.status = TimerStatus::Idle;
        self.halfway_alert_triggered = false;
    }

    /// Whether the one-shot halfway alert should fire now.
    ///
    /// `remaining_time * 2 <= duration` is the exact integer form of
    /// `remaining_time <= duration / 2.0`, so odd durations round toward
    /// firing one second later rather than earlier.
    pub fn is_halfway_due(&self) -> bool {
        self.halfway_alert
            && !self.halfway_alert_triggered
            && self.remaining_time > 0
            && self.remaining_time.saturating_mul(2) <= self.duration
    }

    /// Percentage of the countdown still left, for progress bars
    pub fn remaining_percent(&self) -> f64 {
        if self.duration == 0 {
            return 0.0;
        }
        self.remaining_time as f64 / self.duration as f64 * 100.0
    }
}

/// Immutable history record of a timer at the moment it completed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedTimer {
    #[serde(flatten)]
    pub timer: Timer,
    pub completed_at: DateTime<Utc>,
}

impl CompletedTimer {
    pub fn id(&self) -> TimerId {
        self.timer.id
    }
}

/// Fields supplied by the UI when creating a timer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTimer {
    pub name: String,
    pub category: String,
    pub duration: u64,
    #[serde(default)]
    pub halfway_alert: bool,
}

impl NewTimer {
    pub fn new(name: impl Into<String>, category: impl Into<String>, duration: u64) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            duration,
            halfway_alert: false,
        }
    }

    pub fn with_halfway_alert(mut self) -> Self {
        self.halfway_alert = true;
        self
    }

    /// Reject input the form layer should already have caught
    pub fn validate(&self) -> Result<()> {
        if self.duration == 0 {
            return Err(TimerError::Validation(
                "duration must be a positive number of seconds".to_string(),
            ));
        }
        require_text("name", &self.name)?;
        require_text("category", &self.category)
    }
}

/// Partial update merged into an existing timer.
///
/// `duration` is immutable and `status` belongs to the tick scheduler, so
/// neither can be patched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerPatch {
    pub name: Option<String>,
    pub category: Option<String>,
    pub halfway_alert: Option<bool>,
    pub remaining_time: Option<u64>,
}

impl TimerPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.category.is_none()
            && self.halfway_alert.is_none()
            && self.remaining_time.is_none()
    }

    /// Merge into `timer`, validating against it first so a bad patch
    /// leaves the timer untouched
    pub fn apply_to(&self, timer: &mut Timer) -> Result<()> {
        if let Some(name) = &self.name {
            require_text("name", name)?;
        }
        if let Some(category) = &self.category {
            require_text("category", category)?;
        }
        if let Some(remaining) = self.remaining_time {
            if remaining > timer.duration {
                return Err(TimerError::Validation(format!(
                    "remainingTime {} exceeds duration {}",
                    remaining, timer.duration
                )));
            }
        }

        if let Some(name) = &self.name {
            timer.name = name.trim().to_string();
        }
        if let Some(category) = &self.category {
            timer.category = category.trim().to_string();
        }
        if let Some(halfway_alert) = self.halfway_alert {
            timer.halfway_alert = halfway_alert;
        }
        if let Some(remaining) = self.remaining_time {
            timer.remaining_time = remaining;
        }
        Ok(())
    }
}

fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(TimerError::Validation(format!("{} must not be empty", field)));
    }
    Ok(())
}
