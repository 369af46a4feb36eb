//! Application state and the engine operations exposed to the UI

use std::{
    sync::{Arc, Mutex},
    time::Instant,
};
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::{
    error::Result,
    storage::{load_theme, save_theme, save_timer_state, LocalStorage, ThemeMode},
    tasks::{Alert, TickScheduler},
};
use super::{Action, CompletedTimer, EngineState, NewTimer, Outcome, Timer, TimerId, TimerPatch, TimerStore};

/// Everything the UI shell needs: the store, its countdown loops, storage
/// and the alert channel
#[derive(Debug)]
pub struct AppState {
    /// Single owner of the engine state
    pub store: Arc<TimerStore>,
    pub scheduler: TickScheduler,
    pub storage: LocalStorage,
    /// Channel for halfway/completion notifications
    pub alerts_tx: broadcast::Sender<Alert>,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
    /// Last action tracking
    pub last_action: Arc<Mutex<Option<String>>>,
    pub last_action_time: Arc<Mutex<Option<DateTime<Utc>>>>,
}

impl AppState {
    /// Create the application state around an already loaded snapshot
    pub fn new(port: u16, host: String, storage: LocalStorage, initial: EngineState) -> Self {
        let store = Arc::new(TimerStore::new(initial));
        let (alerts_tx, _) = broadcast::channel(100);

        Self {
            scheduler: TickScheduler::new(Arc::clone(&store)),
            store,
            storage,
            alerts_tx,
            start_time: Instant::now(),
            port,
            host,
            last_action: Arc::new(Mutex::new(None)),
            last_action_time: Arc::new(Mutex::new(None)),
        }
    }

    pub fn add_timer(&self, fields: NewTimer) -> Result<Timer> {
        match self.store.dispatch(Action::Add(fields))? {
            Outcome::Added(timer) => {
                info!("Added timer {} \"{}\" in {} ({}s)", timer.id, timer.name, timer.category, timer.duration);
                self.record_action("add");
                Ok(timer)
            }
            other => unreachable!("add produced {:?}", other),
        }
    }

    /// Merge `patch` into the timer; `None` when the id is unknown
    pub fn update_timer(&self, id: TimerId, patch: TimerPatch) -> Result<Option<Timer>> {
        match self.store.dispatch(Action::Update { id, patch })? {
            Outcome::Updated(timer) => {
                self.record_action("update");
                Ok(Some(timer))
            }
            _ => Ok(None),
        }
    }

    /// Stop the countdown loop, then remove the timer
    pub fn delete_timer(&self, id: TimerId) -> Result<Option<Timer>> {
        self.scheduler.stop(id)?;
        match self.store.dispatch(Action::Delete(id))? {
            Outcome::Removed(timer) => {
                info!("Deleted timer {}", id);
                self.record_action("delete");
                Ok(Some(timer))
            }
            _ => Ok(None),
        }
    }

    /// Stop the countdown loop, then move the timer into history
    pub fn complete_timer(&self, id: TimerId) -> Result<Option<CompletedTimer>> {
        self.scheduler.stop(id)?;
        match self.store.dispatch(Action::Complete { id, at: Utc::now() })? {
            Outcome::Completed(record) => {
                info!("Completed timer {} manually", id);
                self.record_action("complete");
                Ok(Some(record))
            }
            _ => Ok(None),
        }
    }

    pub fn start_timer(&self, id: TimerId) -> Result<Option<Timer>> {
        let timer = self.scheduler.start(id)?;
        if timer.is_some() {
            self.record_action("start");
        }
        Ok(timer)
    }

    pub fn pause_timer(&self, id: TimerId) -> Result<Option<Timer>> {
        let timer = self.scheduler.pause(id)?;
        if timer.is_some() {
            self.record_action("pause");
        }
        Ok(timer)
    }

    pub fn reset_timer(&self, id: TimerId) -> Result<Option<Timer>> {
        let timer = self.scheduler.reset(id)?;
        if timer.is_some() {
            self.record_action("reset");
        }
        Ok(timer)
    }

    /// Start every timer in a category, in creation order
    pub fn start_category(&self, category: &str) -> Result<Vec<Timer>> {
        self.for_category(category, |id| self.scheduler.start(id))
    }

    pub fn pause_category(&self, category: &str) -> Result<Vec<Timer>> {
        self.for_category(category, |id| self.scheduler.pause(id))
    }

    pub fn reset_category(&self, category: &str) -> Result<Vec<Timer>> {
        self.for_category(category, |id| self.scheduler.reset(id))
    }

    fn for_category<F>(&self, category: &str, op: F) -> Result<Vec<Timer>>
    where
        F: Fn(TimerId) -> Result<Option<Timer>>,
    {
        let ids = self.store.snapshot()?.ids_in_category(category);
        let mut touched = Vec::with_capacity(ids.len());
        for id in ids {
            // A timer can complete between the snapshot and its turn
            if let Some(timer) = op(id)? {
                touched.push(timer);
            }
        }
        if !touched.is_empty() {
            self.record_action(&format!("category:{}", category));
        }
        Ok(touched)
    }

    pub fn snapshot(&self) -> Result<EngineState> {
        self.store.snapshot()
    }

    pub fn timer(&self, id: TimerId) -> Result<Option<Timer>> {
        self.store.timer(id)
    }

    pub fn timers(&self) -> Result<Vec<Timer>> {
        Ok(self.store.snapshot()?.timers)
    }

    pub fn completed_timers(&self) -> Result<Vec<CompletedTimer>> {
        Ok(self.store.snapshot()?.completed_timers)
    }

    pub fn categories(&self) -> Result<Vec<String>> {
        Ok(self.store.snapshot()?.categories())
    }

    pub fn subscribe_alerts(&self) -> broadcast::Receiver<Alert> {
        self.alerts_tx.subscribe()
    }

    pub fn theme(&self) -> Result<ThemeMode> {
        load_theme(&self.storage)
    }

    pub fn set_theme(&self, mode: ThemeMode) -> Result<ThemeMode> {
        save_theme(&self.storage, mode)?;
        info!("Theme set to {}", mode);
        Ok(mode)
    }

    /// Stop all countdown loops and write a final snapshot
    pub fn shutdown(&self) -> Result<()> {
        self.scheduler.shutdown()?;
        let state = self.store.snapshot()?;
        save_timer_state(&self.storage, &state)?;
        info!("Saved {} timer(s) on shutdown", state.timers.len());
        Ok(())
    }

    fn record_action(&self, action: &str) {
        match self.last_action.lock() {
            Ok(mut last_action) => *last_action = Some(action.to_string()),
            Err(e) => warn!("Failed to record last action: {}", e),
        }
        if let Ok(mut last_time) = self.last_action_time.lock() {
            *last_time = Some(Utc::now());
        }
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }

    /// Get last action information
    pub fn get_last_action(&self) -> (Option<String>, Option<DateTime<Utc>>) {
        let last_action = self.last_action.lock().ok().and_then(|a| a.clone());
        let last_action_time = self.last_action_time.lock().ok().and_then(|t| *t);
        (last_action, last_action_time)
    }
}
