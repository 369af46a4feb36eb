//! Snapshot writer background task

use std::sync::Arc;
use tracing::{debug, error, info};

use crate::{
    state::TimerStore,
    storage::{save_timer_state, LocalStorage},
};

/// Save the engine state after every committed change.
///
/// Changes that land while a save is in flight are coalesced into the next
/// save, so only the latest state is written.
pub async fn persistence_task(store: Arc<TimerStore>, storage: LocalStorage) {
    info!("Starting persistence task, writing to {}", storage.path().display());

    let mut state_rx = store.subscribe();

    while state_rx.changed().await.is_ok() {
        let state = state_rx.borrow_and_update().clone();
        let storage = storage.clone();

        let saved = tokio::task::spawn_blocking(move || save_timer_state(&storage, &state)).await;
        match saved {
            Ok(Ok(())) => debug!("Timer state saved"),
            Ok(Err(e)) => error!("Failed to save timer state: {}", e),
            Err(e) => error!("Timer state save task failed: {}", e),
        }
    }

    debug!("Store closed, persistence task exiting");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tempfile::TempDir;

    use super::*;
    use crate::{
        state::{Action, NewTimer},
        storage::load_timer_state,
    };

    #[tokio::test]
    async fn writes_each_change() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path().join("storage.json"));
        let store = Arc::new(TimerStore::default());

        tokio::spawn(persistence_task(Arc::clone(&store), storage.clone()));
        tokio::task::yield_now().await;

        store.dispatch(Action::Add(NewTimer::new("Read", "Study", 60))).unwrap();

        let mut saved = None;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            saved = load_timer_state(&storage).unwrap();
            if saved.is_some() {
                break;
            }
        }

        assert_eq!(saved, Some(store.snapshot().unwrap()));
    }
}
