//! Durable storage for the persisted state record.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use meteora_core::PersistenceError;
use parking_lot::Mutex;

/// A single-record key/value store holding the JSON-encoded persisted state.
pub trait StateStorage: Send + Sync {
    /// The saved record, or `None` if nothing was saved.
    fn load(&self) -> Result<Option<String>, PersistenceError>;

    fn save(&self, record: &str) -> Result<(), PersistenceError>;

    /// Erase the record. Clearing an absent record succeeds.
    fn clear(&self) -> Result<(), PersistenceError>;
}

/// Record stored as a JSON file, replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStorage for FileStorage {
    fn load(&self) -> Result<Option<String>, PersistenceError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(None),
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, record: &str) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, record)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), PersistenceError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// File storage at `path`, or in-process storage when its directory cannot
/// be created. State then lasts only for this run.
pub fn open_storage(path: &Path) -> Arc<dyn StateStorage> {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            tracing::warn!(
                "Data directory {} unavailable, state will not be saved: {}",
                parent.display(),
                e
            );
            return Arc::new(MemoryStorage::new());
        }
    }
    Arc::new(FileStorage::new(path))
}

/// In-process storage; used when no data directory is available and in tests.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    record: Mutex<Option<String>>,
    fail_writes: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: impl Into<String>) -> Self {
        Self {
            record: Mutex::new(Some(record.into())),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Current raw record
    pub fn record(&self) -> Option<String> {
        self.record.lock().clone()
    }

    /// Make subsequent saves fail, simulating a full or read-only disk
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl StateStorage for MemoryStorage {
    fn load(&self) -> Result<Option<String>, PersistenceError> {
        Ok(self.record.lock().clone())
    }

    fn save(&self, record: &str) -> Result<(), PersistenceError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PersistenceError::WriteFailed("storage quota exceeded".into()));
        }
        *self.record.lock() = Some(record.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), PersistenceError> {
        *self.record.lock() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn test_file_storage_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("state.json"));
        assert!(storage.load().unwrap().is_none());
    }

    #[test]
    fn test_file_storage_save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("nested").join("state.json"));

        storage.save(r#"{"favorites":[]}"#).unwrap();
        assert_eq!(storage.load().unwrap().as_deref(), Some(r#"{"favorites":[]}"#));

        storage.clear().unwrap();
        assert!(storage.load().unwrap().is_none());
        // Clearing twice is fine
        storage.clear().unwrap();
    }

    #[test]
    fn test_open_storage_uses_file_when_directory_exists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("state.json");

        let storage = open_storage(&path);
        storage.save("{}").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_open_storage_falls_back_to_memory() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the data directory should be
        let blocker = dir.path().join("data");
        std::fs::write(&blocker, "").unwrap();
        let path = blocker.join("state.json");

        let storage = open_storage(&path);
        storage.save(r#"{"favorites":[]}"#).unwrap();
        assert_eq!(storage.load().unwrap().as_deref(), Some(r#"{"favorites":[]}"#));
        assert!(!path.exists());
    }

    #[test]
    fn test_memory_storage_failing_writes() {
        let storage = MemoryStorage::with_record("{}");
        storage.set_fail_writes(true);
        assert!(storage.save("{\"a\":1}").is_err());
        assert_eq!(storage.record().as_deref(), Some("{}"));
    }
}
