//! Error types shared by the engine, storage and HTTP bridge

use thiserror::Error;

use crate::state::TimerId;

/// Errors produced by timer engine operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimerError {
    /// Malformed input to add/update; nothing was committed
    #[error("Invalid timer: {0}")]
    Validation(String),

    #[error("Timer {0} not found")]
    NotFound(TimerId),

    /// Persisted snapshot could not be read, parsed or written
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Failed to lock {0}")]
    Lock(String),
}

impl From<std::io::Error> for TimerError {
    fn from(e: std::io::Error) -> Self {
        TimerError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for TimerError {
    fn from(e: serde_json::Error) -> Self {
        TimerError::Storage(e.to_string())
    }
}

pub type Result<T, E = TimerError> = std::result::Result<T, E>;
