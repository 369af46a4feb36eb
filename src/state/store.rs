//! The single authoritative owner of the engine state

use std::sync::Mutex;

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::{Result, TimerError};
use super::{Action, EngineState, Outcome, Timer, TimerId};

/// Mutex-guarded engine state with change notification.
///
/// Only [`TimerStore::dispatch`] mutates the state. Every committed
/// transition is published on a watch channel so observers (persistence,
/// alert detection) always see the latest state without holding the lock.
#[derive(Debug)]
pub struct TimerStore {
    state: Mutex<EngineState>,
    changes: watch::Sender<EngineState>,
}

impl TimerStore {
    /// Take ownership of a starting state, repaired the same way a load is
    pub fn new(initial: EngineState) -> Self {
        let initial = initial.normalized();
        let (changes, _) = watch::channel(initial.clone());
        Self {
            state: Mutex::new(initial),
            changes,
        }
    }

    /// Apply an action atomically and notify watchers if anything changed
    pub fn dispatch(&self, action: Action) -> Result<Outcome> {
        let name = action.name();
        let mut state = self.state.lock()
            .map_err(|e| TimerError::Lock(format!("engine state: {}", e)))?;

        let (next, outcome) = state.reduce(action)?;
        if !outcome.is_changed() {
            debug!("Action {} left state unchanged", name);
            return Ok(outcome);
        }

        *state = next;
        // Published while still locked so watchers never see transitions out of order
        self.changes.send_replace(state.clone());
        drop(state);

        Ok(outcome)
    }

    /// Clone of the current state
    pub fn snapshot(&self) -> Result<EngineState> {
        self.state.lock()
            .map(|state| state.clone())
            .map_err(|e| TimerError::Lock(format!("engine state: {}", e)))
    }

    pub fn timer(&self, id: TimerId) -> Result<Option<Timer>> {
        self.state.lock()
            .map(|state| state.timer(id).cloned())
            .map_err(|e| TimerError::Lock(format!("engine state: {}", e)))
    }

    /// Subscribe to committed state changes
    pub fn subscribe(&self) -> watch::Receiver<EngineState> {
        self.changes.subscribe()
    }

    /// Replace the whole state with a loaded snapshot
    pub fn load(&self, snapshot: EngineState) -> Result<()> {
        match self.dispatch(Action::Load(snapshot))? {
            Outcome::Loaded => Ok(()),
            other => {
                warn!("Unexpected outcome from load: {:?}", other);
                Ok(())
            }
        }
    }
}

impl Default for TimerStore {
    fn default() -> Self {
        Self::new(EngineState::new())
    }
}
