//! File-backed string key-value storage

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard,
    },
};
use tracing::debug;

use crate::error::{Result, TimerError};

/// Durable string→string storage kept as a single JSON object on disk.
///
/// Values are opaque strings; callers serialize their own payloads, the same
/// way a browser's `localStorage` is used. Clones share one write lock, so
/// writers from the request handlers and the persistence task never lose
/// each other's keys.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

/// Suffix counter so concurrent writers never share a temp file
static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

impl LocalStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read one key; a missing file reads as empty
    pub fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    /// Write one key, keeping every other key as it was
    pub fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock_writes()?;
        // An unreadable file must not block writes; it gets replaced
        let mut items = self.read_all().unwrap_or_default();
        items.insert(key.to_string(), value.to_string());
        self.write_all(&items)
    }

    pub fn remove_item(&self, key: &str) -> Result<()> {
        let _guard = self.lock_writes()?;
        let mut items = self.read_all()?;
        if items.remove(key).is_some() {
            self.write_all(&items)?;
        }
        Ok(())
    }

    fn lock_writes(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_lock.lock()
            .map_err(|e| TimerError::Lock(format!("storage writer: {}", e)))
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&content).map_err(|e| {
            TimerError::Storage(format!("{} is not a storage file: {}", self.path.display(), e))
        })
    }

    /// Write to a sibling temp file and rename it over the original
    fn write_all(&self, items: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = serde_json::to_string_pretty(items)?;
        let file_name = self.path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let tmp = self.path.with_file_name(format!(
            ".{}.{}.{}.tmp",
            file_name,
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        fs::write(&tmp, content)?;
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        debug!("Wrote {} key(s) to {}", items.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn missing_file_reads_empty() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path().join("absent.json"));
        assert_eq!(storage.get_item("timerState").unwrap(), None);
    }

    #[test]
    fn keys_are_independent() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path().join("nested").join("storage.json"));

        storage.set_item("timerState", "{}").unwrap();
        storage.set_item("themeMode", "dark").unwrap();
        storage.set_item("timerState", "{\"timers\":[]}").unwrap();

        assert_eq!(storage.get_item("themeMode").unwrap().as_deref(), Some("dark"));
        assert_eq!(storage.get_item("timerState").unwrap().as_deref(), Some("{\"timers\":[]}"));

        storage.remove_item("themeMode").unwrap();
        assert_eq!(storage.get_item("themeMode").unwrap(), None);
    }

    #[test]
    fn concurrent_writers_keep_every_key() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path().join("storage.json"));

        let writers: Vec<_> = ["timerState", "themeMode"]
            .into_iter()
            .map(|key| {
                let storage = storage.clone();
                std::thread::spawn(move || {
                    for i in 0..300 {
                        storage.set_item(key, &i.to_string()).unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        assert_eq!(storage.get_item("timerState").unwrap().as_deref(), Some("299"));
        assert_eq!(storage.get_item("themeMode").unwrap().as_deref(), Some("299"));
        let leftovers = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn corrupt_file_is_a_storage_error_but_can_be_overwritten() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storage.json");
        fs::write(&path, "not json").unwrap();
        let storage = LocalStorage::new(&path);

        assert!(matches!(storage.get_item("timerState"), Err(TimerError::Storage(_))));

        storage.set_item("themeMode", "light").unwrap();
        assert_eq!(storage.get_item("themeMode").unwrap().as_deref(), Some("light"));
    }
}
