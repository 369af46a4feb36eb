//! Background tasks module
//! 
//! Countdown loops, alert detection and snapshot persistence all run as
//! tokio tasks alongside the HTTP bridge.

pub mod alert_detector;
pub mod persistence;
pub mod tick_scheduler;

// Re-export main types
pub use alert_detector::{alert_detector_task, Alert, AlertDetector};
pub use persistence::persistence_task;
pub use tick_scheduler::{TickScheduler, TICK_PERIOD};
