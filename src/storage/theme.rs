//! Theme preference owned by the UI shell

use std::fmt;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use super::LocalStorage;

pub const THEME_MODE_KEY: &str = "themeMode";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    #[default]
    Light,
    Dark,
}

impl ThemeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThemeMode::Light => "light",
            ThemeMode::Dark => "dark",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "light" => Some(ThemeMode::Light),
            "dark" => Some(ThemeMode::Dark),
            _ => None,
        }
    }
}

impl fmt::Display for ThemeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored as a bare string, not JSON; unknown values read as the default
pub fn load_theme(storage: &LocalStorage) -> Result<ThemeMode> {
    Ok(storage
        .get_item(THEME_MODE_KEY)?
        .and_then(|value| ThemeMode::parse(&value))
        .unwrap_or_default())
}

pub fn save_theme(storage: &LocalStorage, mode: ThemeMode) -> Result<()> {
    storage.set_item(THEME_MODE_KEY, mode.as_str())
}
