//! Key-value persistence seam for the transcript
//!
//! Isolating storage behind an explicit provider keeps the store testable
//! with deterministic doubles instead of a process-global singleton.

use crate::error::ClientError;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

/// Process-wide key under which the transcript is persisted
pub const TRANSCRIPT_KEY: &str = "switchboard.transcript";

/// Thin key-value persistence abstraction
pub trait StorageProvider: Send + Sync {
    /// Read the value stored under `key`, if any
    fn get(&self, key: &str) -> Result<Option<String>, ClientError>;

    /// Write `value` under `key`, replacing any prior value
    fn set(&self, key: &str, value: &str) -> Result<(), ClientError>;

    /// Erase the value stored under `key`
    fn clear(&self, key: &str) -> Result<(), ClientError>;
}

/// File-backed storage: each key maps to one JSON file under a directory
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Create storage rooted at `dir`, creating the directory if needed
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, ClientError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| ClientError::persistence(format!("create {}: {e}", dir.display())))?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl StorageProvider for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, ClientError> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ClientError::persistence(format!(
                "read {}: {e}",
                path.display()
            ))),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ClientError> {
        let path = self.path_for(key);
        std::fs::write(&path, value)
            .map_err(|e| ClientError::persistence(format!("write {}: {e}", path.display())))
    }

    fn clear(&self, key: &str) -> Result<(), ClientError> {
        let path = self.path_for(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ClientError::persistence(format!(
                "remove {}: {e}",
                path.display()
            ))),
        }
    }
}

/// In-memory storage (for testing)
#[derive(Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageProvider for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, ClientError> {
        Ok(self.values.lock().unwrap().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ClientError> {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<(), ClientError> {
        self.values.lock().unwrap().remove(key);
        Ok(())
    }
}
