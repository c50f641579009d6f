use floortalk_core::QuotaError;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

/// Key-value blob persistence for quota state and request history.
/// Missing or unparsable blobs are treated as empty by callers; no schema
/// versioning beyond that.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, QuotaError>;
    fn set(&self, key: &str, value: &str) -> Result<(), QuotaError>;
}

impl<T: KvStore + ?Sized> KvStore for std::sync::Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>, QuotaError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), QuotaError> {
        (**self).set(key, value)
    }
}

/// In-memory store, used by tests and as a fallback when no state directory
/// is available.
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, QuotaError> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| QuotaError::StoreRead(e.to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), QuotaError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| QuotaError::StoreWrite(e.to_string()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// One JSON file per key under a directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, QuotaError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(QuotaError::StoreRead(e.to_string())),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), QuotaError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| QuotaError::StoreWrite(e.to_string()))?;
        std::fs::write(self.path_for(key), value)
            .map_err(|e| QuotaError::StoreWrite(e.to_string()))
    }
}
