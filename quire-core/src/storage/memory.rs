//! In-memory storage

use super::{candidate_names, validate_name, Storage, StorageError, StorageResult, StoredFile};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Thread-safe in-memory blob store. Clones share the same blobs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    blobs: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of stored blobs
    pub fn len(&self) -> usize {
        self.blobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let blobs = self.blobs.read().unwrap_or_else(PoisonError::into_inner);
        let mut keys: Vec<_> = blobs.keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl Storage for MemoryStorage {
    fn read(&self, key: &str) -> StorageResult<Vec<u8>> {
        let blobs = self.blobs.read().unwrap_or_else(PoisonError::into_inner);
        blobs
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    fn write(&self, name: &str, data: &[u8]) -> StorageResult<StoredFile> {
        validate_name(name)?;
        let mut blobs = self.blobs.write().unwrap_or_else(PoisonError::into_inner);
        let key = candidate_names(name)
            .find(|key| !blobs.contains_key(key))
            .ok_or_else(|| StorageError::InvalidName(name.to_string()))?;
        blobs.insert(key.clone(), data.to_vec());
        Ok(StoredFile::new(key, data))
    }

    fn replace(&self, key: &str, data: &[u8]) -> StorageResult<StoredFile> {
        let mut blobs = self.blobs.write().unwrap_or_else(PoisonError::into_inner);
        let blob = blobs
            .get_mut(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        *blob = data.to_vec();
        Ok(StoredFile::new(key, data))
    }

    fn stat(&self, key: &str) -> StorageResult<StoredFile> {
        let blobs = self.blobs.read().unwrap_or_else(PoisonError::into_inner);
        blobs
            .get(key)
            .map(|data| StoredFile::new(key, data))
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let mut blobs = self.blobs.write().unwrap_or_else(PoisonError::into_inner);
        blobs
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }
}
