//! Stored-file operations
//!
//! [`PdfService`] binds a [`DocumentAssembler`] to a [`Storage`] backend and
//! exposes the page-assembly operations over stored files: load the source
//! blobs, run the operation on in-memory documents, store the result.
//!
//! ```rust
//! use quire::storage::{MemoryStorage, Storage};
//! use quire::{AssemblerConfig, Document, PdfService};
//!
//! # fn main() -> quire::Result<()> {
//! let storage = MemoryStorage::new();
//! let bytes = Document::new().to_bytes()?;
//! let file = storage.write("empty.pdf", &bytes)?;
//!
//! let service = PdfService::new(storage, AssemblerConfig::default());
//! assert_eq!(service.count_pages(&file), 0);
//! # Ok(())
//! # }
//! ```

use crate::document::Document;
use crate::error::{PdfError, Result};
use crate::operations::{AssemblerConfig, DocumentAssembler};
use crate::storage::{Storage, StorageError, StoredFile};

/// Page-assembly operations over a storage backend
#[derive(Debug, Clone)]
pub struct PdfService<S: Storage> {
    storage: S,
    assembler: DocumentAssembler,
}

impl<S: Storage> PdfService<S> {
    pub fn new(storage: S, config: AssemblerConfig) -> Self {
        Self {
            storage,
            assembler: DocumentAssembler::new(config),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn assembler(&self) -> &DocumentAssembler {
        &self.assembler
    }

    /// Number of pages in `file`, 0 when it cannot be read or parsed
    pub fn count_pages(&self, file: &StoredFile) -> usize {
        match self.storage.read(&file.key) {
            Ok(data) => self.assembler.count_pages(&data),
            Err(e) => {
                tracing::warn!("Cannot read {} ({}); reporting 0 pages", file.key, e);
                0
            }
        }
    }

    /// Store every page of `file` as its own document, named
    /// `<stem>-page-<n>.pdf` next to the source.
    ///
    /// Either every page is stored or none is: pages already written are
    /// removed again when a later write fails.
    pub fn extract_pages(&self, file: &StoredFile) -> Result<Vec<StoredFile>> {
        let doc = self.load(file)?;
        let serialized = self
            .assembler
            .extract_pages(&doc)?
            .iter()
            .map(|page| self.assembler.serialize(page))
            .collect::<Result<Vec<_>>>()?;

        let mut stored = Vec::with_capacity(serialized.len());
        for (index, bytes) in serialized.iter().enumerate() {
            let name = derived_name(file, &format!("page-{}", index + 1));
            match self.storage.write(&name, bytes) {
                Ok(page) => stored.push(page),
                Err(e) => {
                    self.discard(&stored);
                    return Err(e.into());
                }
            }
        }

        tracing::info!("Extracted {} pages from {}", stored.len(), file.key);
        Ok(stored)
    }

    /// Append the pages of `src` to `dest`, overwriting `dest`'s blob
    pub fn append(&self, dest: &StoredFile, src: &StoredFile) -> Result<StoredFile> {
        let mut target = self.load(dest)?;
        let source = self.load(src)?;

        self.assembler.append(&mut target, &source)?;
        let bytes = self.assembler.serialize(&target)?;
        let stored = self.storage.replace(&dest.key, &bytes)?;

        tracing::info!("Appended {} to {}", src.key, dest.key);
        Ok(stored)
    }

    /// Store a copy of `file` with every page rotated by `degrees`
    pub fn rotate(&self, file: &StoredFile, degrees: i32) -> Result<StoredFile> {
        let mut doc = self.load(file)?;
        self.assembler.rotate_pages(&mut doc, degrees)?;

        let bytes = self.assembler.serialize(&doc)?;
        let name = derived_name(file, &format!("rotated-{degrees}"));
        Ok(self.storage.write(&name, &bytes)?)
    }

    /// Concatenate `files` in order and store the result under `name`.
    ///
    /// Every file must hold the configured document variant.
    pub fn merge(&self, name: &str, files: &[StoredFile]) -> Result<StoredFile> {
        if files.is_empty() {
            return Err(PdfError::EmptyMergeSet);
        }

        // Check every input before parsing any of them
        for file in files {
            let current = self.storage.stat(&file.key).map_err(|e| source_error(file, e))?;
            self.assembler.check_variant(current.variant)?;
        }

        let documents = files
            .iter()
            .map(|file| self.load(file))
            .collect::<Result<Vec<_>>>()?;
        let merged = self.assembler.merge(&documents)?;

        let bytes = self.assembler.serialize(&merged)?;
        let stored = self.storage.write(name, &bytes)?;
        tracing::info!("Merged {} files into {}", files.len(), stored.key);
        Ok(stored)
    }

    /// Read and parse a stored file
    pub fn load(&self, file: &StoredFile) -> Result<Document> {
        let data = self
            .storage
            .read(&file.key)
            .map_err(|e| source_error(file, e))?;
        self.assembler.parse(&data)
    }

    /// Best-effort removal of blobs written by a failed operation
    fn discard(&self, files: &[StoredFile]) {
        for file in files {
            if let Err(e) = self.storage.remove(&file.key) {
                tracing::warn!("Cannot remove partial output {}: {}", file.key, e);
            }
        }
    }
}

fn source_error(file: &StoredFile, error: StorageError) -> PdfError {
    match error {
        StorageError::NotFound(_) => PdfError::SourceNotFound(file.key.clone()),
        other => PdfError::Storage(other),
    }
}

/// `dir/stem.pdf` becomes `dir/stem-<suffix>.pdf`
fn derived_name(file: &StoredFile, suffix: &str) -> String {
    let name = format!("{}-{}.pdf", file.stem(), suffix);
    match file.key.rfind('/') {
        Some(slash) => format!("{}/{}", &file.key[..slash], name),
        None => name,
    }
}
