//! Timer Manager - a state-managed countdown timer engine
//! 
//! This library holds named, categorized countdown timers, drives each
//! running timer with its own one-second loop, raises halfway and
//! completion alerts, and persists everything to local storage.

pub mod config;
pub mod error;
pub mod state;
pub mod storage;
pub mod tasks;
pub mod api;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use error::TimerError;
pub use state::{AppState, TimerStore};
pub use api::create_router;
pub use utils::signals::shutdown_signal;
