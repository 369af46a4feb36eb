//! Per-timer countdown loops
//!
//! Each running timer owns one tokio task that fires every second and
//! dispatches [`Action::Tick`]. A firing only commits while the loop map
//! still holds that task's generation, and it dispatches with the map
//! locked, so pause, reset and stop (which cancel under the same lock)
//! always win against a loop that has already woken up.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};
use chrono::Utc;
use tokio::{
    task::AbortHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tracing::{debug, error, info};

use crate::{
    error::{Result, TimerError},
    state::{Action, Outcome, Timer, TimerId, TimerStore},
};

/// Countdown granularity
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug)]
struct LoopHandle {
    generation: u64,
    abort: AbortHandle,
}

type LoopMap = Arc<Mutex<HashMap<TimerId, LoopHandle>>>;

/// Owns the id → cancellation handle map for every active countdown loop
#[derive(Debug, Clone)]
pub struct TickScheduler {
    store: Arc<TimerStore>,
    loops: LoopMap,
    generations: Arc<AtomicU64>,
    period: Duration,
}

impl TickScheduler {
    pub fn new(store: Arc<TimerStore>) -> Self {
        Self::with_period(store, TICK_PERIOD)
    }

    pub fn with_period(store: Arc<TimerStore>, period: Duration) -> Self {
        Self {
            store,
            loops: Arc::new(Mutex::new(HashMap::new())),
            generations: Arc::new(AtomicU64::new(0)),
            period,
        }
    }

    /// Mark the timer running and install its countdown loop.
    ///
    /// Returns `None` for an unknown id. A timer that already has a loop or
    /// is already running is returned unchanged.
    pub fn start(&self, id: TimerId) -> Result<Option<Timer>> {
        let mut loops = self.lock_loops()?;

        if loops.contains_key(&id) {
            debug!("Timer {} already has a countdown loop", id);
            return self.store.timer(id);
        }

        match self.store.dispatch(Action::Start(id))? {
            Outcome::Updated(timer) => {
                let handle = self.spawn_loop(id);
                loops.insert(id, handle);
                info!("Started timer {} ({}s remaining)", id, timer.remaining_time);
                Ok(Some(timer))
            }
            _ => self.store.timer(id),
        }
    }

    /// Cancel the loop and mark the timer paused
    pub fn pause(&self, id: TimerId) -> Result<Option<Timer>> {
        let mut loops = self.lock_loops()?;
        cancel(&mut loops, id);

        match self.store.dispatch(Action::Pause(id))? {
            Outcome::Updated(timer) => {
                info!("Paused timer {} at {}s", id, timer.remaining_time);
                Ok(Some(timer))
            }
            _ => Ok(None),
        }
    }

    /// Cancel the loop and restore the full idle countdown
    pub fn reset(&self, id: TimerId) -> Result<Option<Timer>> {
        let mut loops = self.lock_loops()?;
        cancel(&mut loops, id);

        match self.store.dispatch(Action::Reset(id))? {
            Outcome::Updated(timer) => {
                info!("Reset timer {}", id);
                Ok(Some(timer))
            }
            _ => Ok(None),
        }
    }

    /// Cancel the loop without touching state; used before delete and complete.
    ///
    /// Returns whether a loop was active.
    pub fn stop(&self, id: TimerId) -> Result<bool> {
        let mut loops = self.lock_loops()?;
        Ok(cancel(&mut loops, id))
    }

    /// Reinstall loops for timers restored with `running` status
    pub fn resume_running(&self) -> Result<usize> {
        let mut loops = self.lock_loops()?;
        let running = self.store.snapshot()?.running_ids();

        let mut resumed = 0;
        for id in running {
            if loops.contains_key(&id) {
                continue;
            }
            let handle = self.spawn_loop(id);
            loops.insert(id, handle);
            resumed += 1;
        }

        if resumed > 0 {
            info!("Resumed {} running timer(s)", resumed);
        }
        Ok(resumed)
    }

    /// Abort every loop
    pub fn shutdown(&self) -> Result<()> {
        let mut loops = self.lock_loops()?;
        for (_, handle) in loops.drain() {
            handle.abort.abort();
        }
        Ok(())
    }

    pub fn is_active(&self, id: TimerId) -> bool {
        self.loops.lock().map(|loops| loops.contains_key(&id)).unwrap_or(false)
    }

    pub fn active_loops(&self) -> usize {
        self.loops.lock().map(|loops| loops.len()).unwrap_or(0)
    }

    fn lock_loops(&self) -> Result<std::sync::MutexGuard<'_, HashMap<TimerId, LoopHandle>>> {
        self.loops.lock()
            .map_err(|e| TimerError::Lock(format!("tick loops: {}", e)))
    }

    /// Spawn the countdown task. Must be called with the loop map locked so
    /// the task cannot deregister before it is registered.
    fn spawn_loop(&self, id: TimerId) -> LoopHandle {
        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        let store = Arc::clone(&self.store);
        let loops = Arc::clone(&self.loops);
        let period = self.period;
        // First firing is one period after start, measured from now rather
        // than from whenever the task is first polled
        let first = Instant::now() + period;

        let task = tokio::spawn(async move {
            let mut interval = interval_at(first, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;

                let Ok(mut registry) = loops.lock() else {
                    error!("Loop map poisoned, stopping countdown for timer {}", id);
                    break;
                };
                // On a multi-threaded runtime an aborted loop can still wake
                // once; only the registered generation may tick
                if registry.get(&id).map(|h| h.generation) != Some(generation) {
                    debug!("Countdown loop for timer {} was cancelled", id);
                    break;
                }

                let keep_running = match store.dispatch(Action::Tick { id, at: Utc::now() }) {
                    Ok(Outcome::Updated(timer)) => {
                        debug!("Timer {} tick: {}s remaining", id, timer.remaining_time);
                        true
                    }
                    Ok(Outcome::Completed(record)) => {
                        info!("Timer {} ({}) completed", id, record.timer.name);
                        false
                    }
                    Ok(_) => {
                        debug!("Timer {} is no longer running, stopping its loop", id);
                        false
                    }
                    Err(e) => {
                        error!("Tick for timer {} failed: {}", id, e);
                        false
                    }
                };
                if !keep_running {
                    registry.remove(&id);
                    break;
                }
            }
        });

        LoopHandle {
            generation,
            abort: task.abort_handle(),
        }
    }
}

fn cancel(loops: &mut HashMap<TimerId, LoopHandle>, id: TimerId) -> bool {
    match loops.remove(&id) {
        Some(handle) => {
            handle.abort.abort();
            debug!("Cancelled countdown loop for timer {}", id);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use tokio::time;

    use super::*;
    use crate::state::{EngineState, NewTimer, TimerStatus};

    // All tests run on a paused clock; `advance` moves it one tick at a time.

    async fn advance_secs(secs: u64) {
        for _ in 0..secs {
            time::advance(TICK_PERIOD).await;
            for _ in 0..5 {
                tokio::task::yield_now().await;
            }
        }
    }

    fn setup() -> (Arc<TimerStore>, TickScheduler) {
        let store = Arc::new(TimerStore::default());
        let scheduler = TickScheduler::new(Arc::clone(&store));
        (store, scheduler)
    }

    fn add(store: &TimerStore, duration: u64) -> TimerId {
        match store.dispatch(Action::Add(NewTimer::new("Timer", "Test", duration))).unwrap() {
            Outcome::Added(timer) => timer.id,
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    fn remaining(store: &TimerStore, id: TimerId) -> u64 {
        store.timer(id).unwrap().unwrap().remaining_time
    }

    #[tokio::test(start_paused = true)]
    async fn start_counts_down_once_per_second() {
        let (store, scheduler) = setup();
        let id = add(&store, 10);

        let timer = scheduler.start(id).unwrap().unwrap();
        assert_eq!(timer.status, TimerStatus::Running);
        assert_eq!(remaining(&store, id), 10);

        advance_secs(3).await;
        assert_eq!(remaining(&store, id), 7);
        assert!(scheduler.is_active(id));
    }

    #[tokio::test(start_paused = true)]
    async fn double_start_keeps_single_loop() {
        let (store, scheduler) = setup();
        let id = add(&store, 10);

        scheduler.start(id).unwrap();
        let before = store.snapshot().unwrap();
        scheduler.start(id).unwrap();
        assert_eq!(store.snapshot().unwrap(), before);
        assert_eq!(scheduler.active_loops(), 1);

        advance_secs(1).await;
        assert_eq!(remaining(&store, id), 9);
    }

    #[tokio::test(start_paused = true)]
    async fn completes_exactly_once() {
        let (store, scheduler) = setup();
        let id = add(&store, 3);
        scheduler.start(id).unwrap();

        advance_secs(3).await;
        let state = store.snapshot().unwrap();
        assert!(state.timer(id).is_none());
        assert_eq!(state.completed_timers.len(), 1);
        assert_eq!(state.completed_timers[0].id(), id);
        assert_eq!(scheduler.active_loops(), 0);

        advance_secs(3).await;
        assert_eq!(store.snapshot().unwrap(), state);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_stops_countdown_and_start_resumes() {
        let (store, scheduler) = setup();
        let id = add(&store, 10);
        scheduler.start(id).unwrap();
        advance_secs(2).await;

        let paused = scheduler.pause(id).unwrap().unwrap();
        assert_eq!(paused.status, TimerStatus::Paused);
        assert!(!scheduler.is_active(id));

        advance_secs(3).await;
        assert_eq!(remaining(&store, id), 8);

        scheduler.start(id).unwrap();
        advance_secs(1).await;
        assert_eq!(remaining(&store, id), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_restores_idle_full_timer() {
        let (store, scheduler) = setup();
        let id = add(&store, 10);
        scheduler.start(id).unwrap();
        advance_secs(4).await;

        let timer = scheduler.reset(id).unwrap().unwrap();
        assert_eq!(timer.remaining_time, 10);
        assert_eq!(timer.status, TimerStatus::Idle);
        assert!(!timer.halfway_alert_triggered);

        advance_secs(2).await;
        assert_eq!(remaining(&store, id), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_then_delete_leaves_no_trace() {
        let (store, scheduler) = setup();
        let id = add(&store, 10);
        scheduler.start(id).unwrap();
        advance_secs(1).await;

        assert!(scheduler.stop(id).unwrap());
        store.dispatch(Action::Delete(id)).unwrap();
        let after_delete = store.snapshot().unwrap();

        advance_secs(5).await;
        assert_eq!(store.snapshot().unwrap(), after_delete);
        assert!(after_delete.completed_timers.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn loop_exits_when_timer_removed_underneath() {
        let (store, scheduler) = setup();
        let id = add(&store, 10);
        scheduler.start(id).unwrap();

        // Deleted without stopping the loop first: the next tick notices
        store.dispatch(Action::Delete(id)).unwrap();
        advance_secs(1).await;
        assert_eq!(scheduler.active_loops(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn deregistered_loop_does_not_tick() {
        let (store, scheduler) = setup();
        let id = add(&store, 10);
        scheduler.start(id).unwrap();

        // Drop the registration but leave the task alive, as when an abort
        // has not yet landed
        scheduler.loops.lock().unwrap().remove(&id);
        advance_secs(2).await;

        assert_eq!(remaining(&store, id), 10);
        assert_eq!(scheduler.active_loops(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn restarted_loop_replaces_the_old_generation() {
        let (store, scheduler) = setup();
        let id = add(&store, 10);
        scheduler.start(id).unwrap();
        let stale = scheduler.loops.lock().unwrap().remove(&id).unwrap();

        // The old task is still alive; only the new one may count down
        store.dispatch(Action::Pause(id)).unwrap();
        scheduler.start(id).unwrap();
        advance_secs(3).await;

        assert_eq!(remaining(&store, id), 7);
        assert!(scheduler.is_active(id));
        stale.abort.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn timers_tick_independently() {
        let (store, scheduler) = setup();
        let a = add(&store, 5);
        let b = add(&store, 20);
        scheduler.start(a).unwrap();
        advance_secs(2).await;
        scheduler.start(b).unwrap();
        advance_secs(2).await;

        assert_eq!(remaining(&store, a), 1);
        assert_eq!(remaining(&store, b), 18);

        scheduler.pause(b).unwrap();
        advance_secs(1).await;
        let state = store.snapshot().unwrap();
        assert!(state.timer(a).is_none());
        assert_eq!(state.completed_timers.len(), 1);
        assert_eq!(remaining(&store, b), 18);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_ids_are_ignored() {
        let (_, scheduler) = setup();
        assert!(scheduler.start(42).unwrap().is_none());
        assert!(scheduler.pause(42).unwrap().is_none());
        assert!(scheduler.reset(42).unwrap().is_none());
        assert!(!scheduler.stop(42).unwrap());
        assert_eq!(scheduler.active_loops(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn resume_running_restores_loops_after_load() {
        let json = r#"{"timers":[
            {"id":1,"name":"A","category":"Study","duration":60,"remainingTime":30,"status":"running"},
            {"id":2,"name":"B","category":"Study","duration":60,"remainingTime":30,"status":"paused"}
        ]}"#;
        let snapshot: EngineState = serde_json::from_str(json).unwrap();
        let (store, scheduler) = setup();
        store.load(snapshot).unwrap();

        assert_eq!(scheduler.resume_running().unwrap(), 1);
        assert!(scheduler.is_active(1));
        assert!(!scheduler.is_active(2));

        advance_secs(1).await;
        assert_eq!(remaining(&store, 1), 29);
        assert_eq!(remaining(&store, 2), 30);
    }
}
