//! State management module
//! 
//! This module contains the timer records, the engine state with its
//! reducer, the store that owns it, and the application facade.

pub mod app_state;
pub mod engine_state;
pub mod store;
pub mod timer;

// Re-export main types
pub use app_state::AppState;
pub use engine_state::{Action, EngineState, Outcome};
pub use store::TimerStore;
pub use timer::{CompletedTimer, NewTimer, Timer, TimerId, TimerPatch, TimerStatus};
