//! Whole-document state persistence, one document per driver.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::StateError;

/// Loads a state document at run start and saves it at run end.
pub trait StateStore<T>: Send + Sync {
    /// Returns `T::default()` when nothing has been saved yet.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] when the backing storage cannot be read.
    fn load(&self) -> Result<T, StateError>;

    /// # Errors
    ///
    /// Returns [`StateError`] when the document cannot be written.
    fn save(&self, state: &T) -> Result<(), StateError>;
}

/// JSON document on disk, replaced atomically on save.
#[derive(Debug)]
pub struct JsonFileStore<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonFileStore<T> {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl<T> StateStore<T> for JsonFileStore<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    fn load(&self) -> Result<T, StateError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
            Err(e) => return Err(StateError::io(&self.path, e)),
        };

        match serde_json::from_str(&raw) {
            Ok(state) => Ok(state),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "state document is corrupt; starting from defaults"
                );
                Ok(T::default())
            }
        }
    }

    fn save(&self, state: &T) -> Result<(), StateError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StateError::io(parent, e))?;
        }

        let body = serde_json::to_string_pretty(state)?;
        let tmp = self.temp_path();
        std::fs::write(&tmp, body).map_err(|e| StateError::io(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| StateError::io(&self.path, e))?;
        Ok(())
    }
}

/// In-process store for tests and dry tooling. Counts saves.
#[derive(Debug, Default)]
pub struct MemoryStore<T> {
    state: Mutex<Option<T>>,
    saves: AtomicUsize,
}

impl<T: Clone> MemoryStore<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(None),
            saves: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn with_state(state: T) -> Self {
        Self {
            state: Mutex::new(Some(state)),
            saves: AtomicUsize::new(0),
        }
    }

    /// Last document written or seeded, if any.
    #[must_use]
    pub fn current(&self) -> Option<T> {
        self.state.lock().ok().and_then(|s| s.clone())
    }

    #[must_use]
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl<T> StateStore<T> for MemoryStore<T>
where
    T: Clone + Default + Send,
{
    fn load(&self) -> Result<T, StateError> {
        let guard = self
            .state
            .lock()
            .map_err(|e| StateError::Poisoned(e.to_string()))?;
        Ok(guard.clone().unwrap_or_default())
    }

    fn save(&self, state: &T) -> Result<(), StateError> {
        let mut guard = self
            .state
            .lock()
            .map_err(|e| StateError::Poisoned(e.to_string()))?;
        *guard = Some(state.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DaemonState, PollerState};

    #[test]
    fn missing_file_loads_default() {
        let dir = tempfile::tempdir().unwrap();
        let store: JsonFileStore<PollerState> = JsonFileStore::new(dir.path().join("p.json"));
        assert_eq!(store.load().unwrap(), PollerState::default());
    }

    #[test]
    fn save_then_load_restores_document_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("poller_state.json");
        let store: JsonFileStore<PollerState> = JsonFileStore::new(&path);

        let mut state = PollerState::default();
        state.run_count = 3;
        state.total_polled = 17;
        store.save(&state).unwrap();

        assert_eq!(store.load().unwrap(), state);
        assert!(!dir.path().join("nested").join("poller_state.json.tmp").exists());
    }

    #[test]
    fn corrupt_file_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon_state.json");
        std::fs::write(&path, "{ not json").unwrap();
        let store: JsonFileStore<DaemonState> = JsonFileStore::new(&path);
        assert_eq!(store.load().unwrap(), DaemonState::default());
    }

    #[test]
    fn memory_store_counts_saves() {
        let store: MemoryStore<PollerState> = MemoryStore::new();
        assert!(store.current().is_none());
        let mut state = store.load().unwrap();
        state.run_count = 1;
        store.save(&state).unwrap();
        store.save(&state).unwrap();
        assert_eq!(store.save_count(), 2);
        assert_eq!(store.current().unwrap().run_count, 1);
    }
}
