//! Engine state snapshot persistence

use tracing::{info, warn};

use crate::{error::Result, state::EngineState};
use super::LocalStorage;

pub const TIMER_STATE_KEY: &str = "timerState";

/// Read the saved engine state; `None` when nothing has been saved yet
pub fn load_timer_state(storage: &LocalStorage) -> Result<Option<EngineState>> {
    match storage.get_item(TIMER_STATE_KEY)? {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

pub fn save_timer_state(storage: &LocalStorage, state: &EngineState) -> Result<()> {
    let json = serde_json::to_string(state)?;
    storage.set_item(TIMER_STATE_KEY, &json)
}

/// Startup load: an unreadable or unparsable snapshot falls back to an
/// empty state instead of failing
pub fn load_or_default(storage: &LocalStorage) -> EngineState {
    match load_timer_state(storage) {
        Ok(Some(state)) => {
            info!(
                "Loaded {} timer(s) and {} completed timer(s) from {}",
                state.timers.len(),
                state.completed_timers.len(),
                storage.path().display()
            );
            state
        }
        Ok(None) => {
            info!("No saved timer state in {}, starting empty", storage.path().display());
            EngineState::new()
        }
        Err(e) => {
            warn!("Ignoring unreadable timer state: {}", e);
            EngineState::new()
        }
    }
}
