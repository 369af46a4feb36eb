//! Halfway and completion notifications derived from state changes

use std::sync::Arc;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::state::{Action, CompletedTimer, EngineState, Outcome, Timer, TimerStore};

/// A notification for the UI layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Alert {
    /// Remaining time first dropped to half the duration
    Halfway { timer: Timer },
    Completed { timer: CompletedTimer },
}

impl Alert {
    pub fn kind(&self) -> &'static str {
        match self {
            Alert::Halfway { .. } => "halfway",
            Alert::Completed { .. } => "completed",
        }
    }
}

/// Observes committed states and decides which alerts to raise.
///
/// The only state it writes is the halfway latch, through the store, and an
/// alert is raised only when that latch actually flips.
#[derive(Debug)]
pub struct AlertDetector {
    store: Arc<TimerStore>,
    seen_completions: usize,
}

impl AlertDetector {
    /// History already present in the store is treated as seen
    pub fn new(store: Arc<TimerStore>) -> Self {
        let seen_completions = store
            .snapshot()
            .map(|state| state.completed_timers.len())
            .unwrap_or(0);
        Self { store, seen_completions }
    }

    pub fn observe(&mut self, state: &EngineState) -> Vec<Alert> {
        let mut alerts = Vec::new();

        for timer in state.timers.iter().filter(|t| t.is_halfway_due()) {
            match self.store.dispatch(Action::LatchHalfway(timer.id)) {
                Ok(Outcome::Updated(latched)) => alerts.push(Alert::Halfway { timer: latched }),
                Ok(_) => debug!("Halfway latch for timer {} already set", timer.id),
                Err(e) => warn!("Failed to latch halfway alert for timer {}: {}", timer.id, e),
            }
        }

        let completed = state.completed_timers.len();
        if completed > self.seen_completions {
            alerts.extend(
                state.completed_timers[self.seen_completions..]
                    .iter()
                    .cloned()
                    .map(|timer| Alert::Completed { timer }),
            );
        }
        // History only shrinks when a snapshot is reloaded
        self.seen_completions = completed;

        alerts
    }
}

/// Background task that watches the store and broadcasts alerts
pub async fn alert_detector_task(store: Arc<TimerStore>, alerts_tx: broadcast::Sender<Alert>) {
    info!("Starting alert detector task");

    let mut state_rx = store.subscribe();
    let mut detector = AlertDetector::new(store);

    while state_rx.changed().await.is_ok() {
        // Clone out of the borrow: latching dispatches back into the store,
        // which publishes on this same channel
        let state = state_rx.borrow_and_update().clone();

        for alert in detector.observe(&state) {
            match &alert {
                Alert::Halfway { timer } => {
                    info!("Halfway alert: {} ({}s left)", timer.name, timer.remaining_time)
                }
                Alert::Completed { timer } => {
                    info!("Completion alert: {} completed at {}", timer.timer.name, timer.completed_at)
                }
            }
            // No subscribers is normal when no UI is connected
            let _ = alerts_tx.send(alert);
        }
    }

    debug!("Store closed, alert detector task exiting");
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::state::NewTimer;

    fn add(store: &TimerStore, fields: NewTimer) -> u64 {
        match store.dispatch(Action::Add(fields)).unwrap() {
            Outcome::Added(timer) => timer.id,
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    fn tick(store: &TimerStore, id: u64) {
        store.dispatch(Action::Tick { id, at: Utc::now() }).unwrap();
    }

    fn observe(detector: &mut AlertDetector, store: &TimerStore) -> Vec<Alert> {
        detector.observe(&store.snapshot().unwrap())
    }

    #[test]
    fn halfway_fires_exactly_once() {
        let store = Arc::new(TimerStore::default());
        let id = add(&store, NewTimer::new("Plank", "Workout", 10).with_halfway_alert());
        store.dispatch(Action::Start(id)).unwrap();
        let mut detector = AlertDetector::new(Arc::clone(&store));

        let mut halfway = 0;
        for _ in 0..9 {
            tick(&store, id);
            for alert in observe(&mut detector, &store) {
                if let Alert::Halfway { timer } = alert {
                    assert_eq!(timer.remaining_time, 5);
                    assert!(timer.halfway_alert_triggered);
                    halfway += 1;
                }
            }
        }

        assert_eq!(halfway, 1);
        let timer = store.timer(id).unwrap().unwrap();
        assert_eq!(timer.remaining_time, 1);
        assert!(timer.halfway_alert_triggered);
    }

    #[test]
    fn halfway_needs_opt_in() {
        let store = Arc::new(TimerStore::default());
        let id = add(&store, NewTimer::new("Plank", "Workout", 4));
        store.dispatch(Action::Start(id)).unwrap();
        let mut detector = AlertDetector::new(Arc::clone(&store));

        tick(&store, id);
        tick(&store, id);
        assert!(observe(&mut detector, &store).is_empty());
    }

    #[test]
    fn reset_rearms_halfway() {
        let store = Arc::new(TimerStore::default());
        let id = add(&store, NewTimer::new("Plank", "Workout", 2).with_halfway_alert());
        store.dispatch(Action::Start(id)).unwrap();
        let mut detector = AlertDetector::new(Arc::clone(&store));

        tick(&store, id);
        assert_eq!(observe(&mut detector, &store).len(), 1);

        store.dispatch(Action::Reset(id)).unwrap();
        store.dispatch(Action::Start(id)).unwrap();
        tick(&store, id);
        assert_eq!(observe(&mut detector, &store).len(), 1);
    }

    #[test]
    fn stale_state_after_reset_raises_nothing() {
        let store = Arc::new(TimerStore::default());
        let id = add(&store, NewTimer::new("Plank", "Workout", 10).with_halfway_alert());
        store.dispatch(Action::Start(id)).unwrap();
        let mut detector = AlertDetector::new(Arc::clone(&store));

        for _ in 0..5 {
            tick(&store, id);
        }
        let stale = store.snapshot().unwrap();
        store.dispatch(Action::Reset(id)).unwrap();

        assert!(detector.observe(&stale).is_empty());
        let timer = store.timer(id).unwrap().unwrap();
        assert_eq!(timer.remaining_time, 10);
        assert!(!timer.halfway_alert_triggered);

        store.dispatch(Action::Start(id)).unwrap();
        let mut halfway = 0;
        for _ in 0..5 {
            tick(&store, id);
            halfway += observe(&mut detector, &store).len();
        }
        assert_eq!(halfway, 1);
    }

    #[test]
    fn one_completion_alert_per_new_entry_in_order() {
        let store = Arc::new(TimerStore::default());
        let a = add(&store, NewTimer::new("A", "Break", 5));
        let b = add(&store, NewTimer::new("B", "Break", 5));
        let mut detector = AlertDetector::new(Arc::clone(&store));

        store.dispatch(Action::Complete { id: a, at: Utc::now() }).unwrap();
        store.dispatch(Action::Complete { id: b, at: Utc::now() }).unwrap();

        let alerts = observe(&mut detector, &store);
        let ids: Vec<u64> = alerts
            .iter()
            .map(|alert| match alert {
                Alert::Completed { timer } => timer.id(),
                other => panic!("unexpected alert {:?}", other),
            })
            .collect();
        assert_eq!(ids, vec![a, b]);

        assert!(observe(&mut detector, &store).is_empty());
    }

    #[test]
    fn loaded_history_is_not_announced() {
        let json = r#"{"completedTimers":[
            {"id":3,"name":"Old","category":"Study","duration":5,"remainingTime":1,"status":"running","completedAt":"2024-05-01T10:00:00Z"}
        ]}"#;
        let store = Arc::new(TimerStore::default());
        store.load(serde_json::from_str(json).unwrap()).unwrap();

        let mut detector = AlertDetector::new(Arc::clone(&store));
        assert!(observe(&mut detector, &store).is_empty());
    }

    #[tokio::test]
    async fn task_broadcasts_alerts() {
        let store = Arc::new(TimerStore::default());
        let (alerts_tx, mut alerts_rx) = broadcast::channel(16);
        let id = add(&store, NewTimer::new("Tea", "Break", 5));

        tokio::spawn(alert_detector_task(Arc::clone(&store), alerts_tx));
        tokio::task::yield_now().await;

        store.dispatch(Action::Complete { id, at: Utc::now() }).unwrap();

        let alert = alerts_rx.recv().await.unwrap();
        assert_eq!(alert.kind(), "completed");
    }
}
