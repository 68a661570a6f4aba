//! Blob storage collaborator
//!
//! The assembly engine works on in-memory [`Document`](crate::Document)
//! values. Persistence is delegated to a [`Storage`] backend that hands out
//! named, byte-addressable blobs. Two backends are provided:
//!
//! - [`FsStorage`] keeps blobs as files under a root directory
//! - [`MemoryStorage`] keeps them in a synchronised map, for tests and embedding

mod fs;
mod memory;

pub use fs::FsStorage;
pub use memory::MemoryStorage;

use std::fmt;
use thiserror::Error;

/// Storage failures
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Invalid blob name: {0}")]
    InvalidName(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Kind of content held by a blob, sniffed from its leading bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum DocumentVariant {
    Pdf,
    Png,
    Jpeg,
    Unknown,
}

impl DocumentVariant {
    /// Identify `data` by its magic number
    pub fn sniff(data: &[u8]) -> Self {
        // PDF readers accept the marker anywhere in the first kilobyte
        let window = &data[..data.len().min(crate::parser::header::HEADER_SEARCH_WINDOW)];
        if window.windows(5).any(|w| w == b"%PDF-") {
            DocumentVariant::Pdf
        } else if data.starts_with(b"\x89PNG\r\n\x1a\n") {
            DocumentVariant::Png
        } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            DocumentVariant::Jpeg
        } else {
            DocumentVariant::Unknown
        }
    }
}

impl fmt::Display for DocumentVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DocumentVariant::Pdf => "pdf",
            DocumentVariant::Png => "png",
            DocumentVariant::Jpeg => "jpeg",
            DocumentVariant::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Handle to a stored blob
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StoredFile {
    pub key: String,
    pub variant: DocumentVariant,
}

impl StoredFile {
    pub fn new(key: impl Into<String>, data: &[u8]) -> Self {
        Self {
            key: key.into(),
            variant: DocumentVariant::sniff(data),
        }
    }

    /// Key without its extension, used to name derived blobs
    pub fn stem(&self) -> &str {
        let name = self.key.rsplit('/').next().unwrap_or(&self.key);
        match name.rfind('.') {
            Some(dot) if dot > 0 => &name[..dot],
            _ => name,
        }
    }
}

impl fmt::Display for StoredFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.key, self.variant)
    }
}

/// Named blob store
pub trait Storage {
    /// Read the whole blob
    fn read(&self, key: &str) -> StorageResult<Vec<u8>>;

    /// Store `data` as a new blob. An existing blob is never overwritten:
    /// colliding names get a `-1`, `-2`, ... suffix before the extension.
    fn write(&self, name: &str, data: &[u8]) -> StorageResult<StoredFile>;

    /// Overwrite an existing blob
    fn replace(&self, key: &str, data: &[u8]) -> StorageResult<StoredFile>;

    /// Handle to an existing blob
    fn stat(&self, key: &str) -> StorageResult<StoredFile>;

    /// Delete a blob; `NotFound` if it does not exist
    fn remove(&self, key: &str) -> StorageResult<()>;

    fn exists(&self, key: &str) -> bool {
        self.stat(key).is_ok()
    }
}

/// Candidate keys for `name`: `name`, then `stem-1.ext`, `stem-2.ext`, ...
pub(crate) fn candidate_names(name: &str) -> impl Iterator<Item = String> + '_ {
    let (stem, extension) = match name.rfind('.') {
        Some(dot) if dot > 0 && !name[dot..].contains('/') => name.split_at(dot),
        _ => (name, ""),
    };
    std::iter::once(name.to_string())
        .chain((1u32..).map(move |n| format!("{stem}-{n}{extension}")))
}

/// Reject names that would escape the store
pub(crate) fn validate_name(name: &str) -> StorageResult<()> {
    let escapes = name
        .split(['/', '\\'])
        .any(|part| part == ".." || part.is_empty());
    if name.is_empty() || escapes || name.starts_with('/') {
        return Err(StorageError::InvalidName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_variants() {
        assert_eq!(DocumentVariant::sniff(b"%PDF-1.7\n"), DocumentVariant::Pdf);
        assert_eq!(
            DocumentVariant::sniff(b"garbage\n%PDF-1.4\n"),
            DocumentVariant::Pdf
        );
        assert_eq!(
            DocumentVariant::sniff(b"\x89PNG\r\n\x1a\n...."),
            DocumentVariant::Png
        );
        assert_eq!(
            DocumentVariant::sniff(&[0xFF, 0xD8, 0xFF, 0xE0]),
            DocumentVariant::Jpeg
        );
        assert_eq!(DocumentVariant::sniff(b""), DocumentVariant::Unknown);
        assert_eq!(DocumentVariant::sniff(b"hello"), DocumentVariant::Unknown);
    }

    #[test]
    fn test_variant_display() {
        assert_eq!(DocumentVariant::Pdf.to_string(), "pdf");
        assert_eq!(DocumentVariant::Jpeg.to_string(), "jpeg");
    }

    #[test]
    fn test_stored_file_stem() {
        let file = StoredFile::new("reports/q1.final.pdf", b"%PDF-1.4");
        assert_eq!(file.stem(), "q1.final");
        assert_eq!(file.variant, DocumentVariant::Pdf);
        assert_eq!(StoredFile::new("noext", b"").stem(), "noext");
        assert_eq!(StoredFile::new(".hidden", b"").stem(), ".hidden");
    }

    #[test]
    fn test_candidate_names() {
        let names: Vec<_> = candidate_names("out.pdf").take(3).collect();
        assert_eq!(names, vec!["out.pdf", "out-1.pdf", "out-2.pdf"]);

        let names: Vec<_> = candidate_names("dir.v2/out").take(2).collect();
        assert_eq!(names, vec!["dir.v2/out", "dir.v2/out-1"]);
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("a.pdf").is_ok());
        assert!(validate_name("nested/a.pdf").is_ok());
        for bad in ["", "/etc/passwd", "../up.pdf", "a//b", "a/../../b"] {
            assert!(matches!(
                validate_name(bad),
                Err(StorageError::InvalidName(_))
            ));
        }
    }
}
