//! Engine state and the pure reducer that transitions it
//!
//! Every change to the timer collection is expressed as an [`Action`] and
//! applied by [`EngineState::reduce`], which returns the next state instead
//! of mutating in place. A failed action returns an error and no state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use super::timer::{CompletedTimer, NewTimer, Timer, TimerId, TimerPatch, TimerStatus};

/// Canonical collection of active and completed timers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineState {
    /// Active timers in creation order
    #[serde(default)]
    pub timers: Vec<Timer>,
    /// Append-only history in completion order
    #[serde(default)]
    pub completed_timers: Vec<CompletedTimer>,
    /// Next id to hand out; persisted so ids survive restarts unreused
    #[serde(default)]
    pub next_id: TimerId,
}

/// A requested state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Add(NewTimer),
    Update { id: TimerId, patch: TimerPatch },
    Delete(TimerId),
    Complete { id: TimerId, at: DateTime<Utc> },
    Load(EngineState),
    /// Mark running; ignored when already running
    Start(TimerId),
    Pause(TimerId),
    Reset(TimerId),
    /// One-second countdown step, read against the live state
    Tick { id: TimerId, at: DateTime<Utc> },
    /// Flip the halfway latch; ignored when already set
    LatchHalfway(TimerId),
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Add(_) => "add",
            Action::Update { .. } => "update",
            Action::Delete(_) => "delete",
            Action::Complete { .. } => "complete",
            Action::Load(_) => "load",
            Action::Start(_) => "start",
            Action::Pause(_) => "pause",
            Action::Reset(_) => "reset",
            Action::Tick { .. } => "tick",
            Action::LatchHalfway(_) => "latch-halfway",
        }
    }
}

/// What a transition did
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Added(Timer),
    Updated(Timer),
    Removed(Timer),
    Completed(CompletedTimer),
    Loaded,
    /// Nothing applied: unknown id, or the timer was already in the requested state
    Unchanged,
}

impl Outcome {
    pub fn is_changed(&self) -> bool {
        !matches!(self, Outcome::Unchanged)
    }
}

impl EngineState {
    pub fn new() -> Self {
        Self {
            timers: Vec::new(),
            completed_timers: Vec::new(),
            next_id: 1,
        }
    }

    pub fn timer(&self, id: TimerId) -> Option<&Timer> {
        self.timers.iter().find(|t| t.id == id)
    }

    /// Distinct categories in order of first appearance
    pub fn categories(&self) -> Vec<String> {
        let mut categories: Vec<String> = Vec::new();
        for timer in &self.timers {
            if !categories.contains(&timer.category) {
                categories.push(timer.category.clone());
            }
        }
        categories
    }

    /// Ids of active timers in a category, in creation order
    pub fn ids_in_category(&self, category: &str) -> Vec<TimerId> {
        self.timers
            .iter()
            .filter(|t| t.category == category)
            .map(|t| t.id)
            .collect()
    }

    pub fn running_ids(&self) -> Vec<TimerId> {
        self.timers.iter().filter(|t| t.is_running()).map(|t| t.id).collect()
    }

    /// Apply `action` and return the next state with what happened.
    pub fn reduce(&self, action: Action) -> Result<(EngineState, Outcome)> {
        let mut next = self.clone();

        let outcome = match action {
            Action::Add(fields) => {
                fields.validate()?;
                let timer = Timer::new(next.allocate_id(), fields);
                next.timers.push(timer.clone());
                Outcome::Added(timer)
            }
            Action::Update { id, patch } => match next.timer_mut(id) {
                Some(timer) => {
                    patch.apply_to(timer)?;
                    Outcome::Updated(timer.clone())
                }
                None => Outcome::Unchanged,
            },
            Action::Delete(id) => match next.take(id) {
                Some(timer) => Outcome::Removed(timer),
                None => Outcome::Unchanged,
            },
            Action::Complete { id, at } => next.complete(id, at),
            Action::Load(snapshot) => {
                next = snapshot.normalized();
                Outcome::Loaded
            }
            Action::Start(id) => match next.timer_mut(id) {
                Some(timer) if !timer.is_running() => {
                    timer.status = TimerStatus::Running;
                    Outcome::Updated(timer.clone())
                }
                _ => Outcome::Unchanged,
            },
            Action::Pause(id) => match next.timer_mut(id) {
                Some(timer) => {
                    timer.status = TimerStatus::Paused;
                    Outcome::Updated(timer.clone())
                }
                None => Outcome::Unchanged,
            },
            Action::Reset(id) => match next.timer_mut(id) {
                Some(timer) => {
                    timer.reset();
                    Outcome::Updated(timer.clone())
                }
                None => Outcome::Unchanged,
            },
            Action::Tick { id, at } => match next.timer_mut(id) {
                Some(timer) if timer.is_running() => {
                    if timer.remaining_time <= 1 {
                        next.complete(id, at)
                    } else {
                        timer.remaining_time -= 1;
                        timer.status = TimerStatus::Running;
                        Outcome::Updated(timer.clone())
                    }
                }
                _ => Outcome::Unchanged,
            },
            // Re-checked against the live timer: the observer may be looking
            // at a state that a reset has since replaced
            Action::LatchHalfway(id) => match next.timer_mut(id) {
                Some(timer) if timer.is_halfway_due() => {
                    timer.halfway_alert_triggered = true;
                    Outcome::Updated(timer.clone())
                }
                _ => Outcome::Unchanged,
            },
        };

        Ok((next, outcome))
    }

    fn timer_mut(&mut self, id: TimerId) -> Option<&mut Timer> {
        self.timers.iter_mut().find(|t| t.id == id)
    }

    fn take(&mut self, id: TimerId) -> Option<Timer> {
        let index = self.timers.iter().position(|t| t.id == id)?;
        Some(self.timers.remove(index))
    }

    fn complete(&mut self, id: TimerId, at: DateTime<Utc>) -> Outcome {
        match self.take(id) {
            Some(timer) => {
                let record = CompletedTimer { timer, completed_at: at };
                self.completed_timers.push(record.clone());
                Outcome::Completed(record)
            }
            None => Outcome::Unchanged,
        }
    }

    fn allocate_id(&mut self) -> TimerId {
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        id
    }

    /// Repair a loaded snapshot: clamp remaining time into range and make
    /// sure the id counter is past every id already in use
    pub fn normalized(mut self) -> Self {
        for timer in &mut self.timers {
            timer.remaining_time = timer.remaining_time.min(timer.duration);
        }
        let highest = self
            .timers
            .iter()
            .map(|t| t.id)
            .chain(self.completed_timers.iter().map(|c| c.id()))
            .max()
            .unwrap_or(0);
        self.next_id = self.next_id.max(highest.saturating_add(1));
        self
    }
}
