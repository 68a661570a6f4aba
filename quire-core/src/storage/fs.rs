//! Filesystem-backed storage

use super::{candidate_names, validate_name, Storage, StorageError, StorageResult, StoredFile};
use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Blobs stored as files below a root directory
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    /// Use `root` as the store, creating it if needed
    pub fn new(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path of `key`
    pub fn path_of(&self, key: &str) -> StorageResult<PathBuf> {
        validate_name(key)?;
        Ok(self.root.join(key))
    }

    /// Write `data` to a temporary file in the directory of `target`.
    /// The file is deleted when dropped without being persisted.
    fn stage(&self, target: &Path, data: &[u8]) -> StorageResult<NamedTempFile> {
        let dir = target.parent().unwrap_or(self.root.as_path());
        fs::create_dir_all(dir)?;
        let mut staged = NamedTempFile::new_in(dir)?;
        staged.write_all(data)?;
        staged.as_file().sync_all()?;
        Ok(staged)
    }

    fn not_found(key: &str, error: std::io::Error) -> StorageError {
        if error.kind() == ErrorKind::NotFound {
            StorageError::NotFound(key.to_string())
        } else {
            StorageError::Io(error)
        }
    }
}

impl Storage for FsStorage {
    fn read(&self, key: &str) -> StorageResult<Vec<u8>> {
        let path = self.path_of(key)?;
        let mut file = File::open(&path).map_err(|e| Self::not_found(key, e))?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        tracing::debug!("Read {} bytes from {}", data.len(), path.display());
        Ok(data)
    }

    fn write(&self, name: &str, data: &[u8]) -> StorageResult<StoredFile> {
        let first = self.path_of(name)?;
        let mut staged = self.stage(&first, data)?;

        for key in candidate_names(name) {
            let path = self.path_of(&key)?;
            // persist_noclobber fails when the key is taken
            match staged.persist_noclobber(&path) {
                Ok(_) => {
                    tracing::debug!("Stored {} bytes as {}", data.len(), path.display());
                    return Ok(StoredFile::new(key, data));
                }
                Err(e) if e.error.kind() == ErrorKind::AlreadyExists => staged = e.file,
                Err(e) => return Err(e.error.into()),
            }
        }
        Err(StorageError::InvalidName(name.to_string()))
    }

    fn replace(&self, key: &str, data: &[u8]) -> StorageResult<StoredFile> {
        let path = self.path_of(key)?;
        let metadata = fs::metadata(&path).map_err(|e| Self::not_found(key, e))?;
        if !metadata.is_file() {
            return Err(StorageError::NotFound(key.to_string()));
        }

        // The old blob stays intact until the rename
        let staged = self.stage(&path, data)?;
        staged.persist(&path).map_err(|e| e.error)?;
        tracing::debug!("Replaced {} with {} bytes", path.display(), data.len());
        Ok(StoredFile::new(key, data))
    }

    fn stat(&self, key: &str) -> StorageResult<StoredFile> {
        let path = self.path_of(key)?;
        let mut file = File::open(&path).map_err(|e| Self::not_found(key, e))?;
        if !file.metadata()?.is_file() {
            return Err(StorageError::NotFound(key.to_string()));
        }
        let mut head = Vec::with_capacity(1024);
        Read::by_ref(&mut file).take(1024).read_to_end(&mut head)?;
        Ok(StoredFile::new(key, &head))
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let path = self.path_of(key)?;
        fs::remove_file(&path).map_err(|e| Self::not_found(key, e))?;
        tracing::debug!("Removed {}", path.display());
        Ok(())
    }
}
