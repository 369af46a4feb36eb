//! Persistent store adapter
//!
//! Engine snapshots and UI preferences live under fixed keys in a
//! file-backed [`LocalStorage`].

pub mod local_storage;
pub mod snapshot;
pub mod theme;

pub use local_storage::LocalStorage;
pub use snapshot::{load_or_default, load_timer_state, save_timer_state, TIMER_STATE_KEY};
pub use theme::{load_theme, save_theme, ThemeMode, THEME_MODE_KEY};
