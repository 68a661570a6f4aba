//! # quire
//!
//! A pure Rust PDF page-assembly engine: count, extract, append, rotate and
//! merge the pages of existing PDF documents without any external PDF toolkit.
//!
//! ## Features
//!
//! - **PDF Parsing**: Classic and stream cross-reference tables, incremental
//!   updates, object streams and xref reconstruction for damaged files
//! - **Page Assembly**: Extract, split, append, merge and rotate pages
//! - **Deep Copy Import**: Every imported page brings its own renumbered copy
//!   of the fonts, images and content streams it references
//! - **Serialization**: Compact, deterministic output with a classic xref table
//! - **Storage**: Pluggable blob storage with filesystem and in-memory backends
//!
//! Page content is never interpreted; content streams are copied verbatim.
//!
//! ## Quick Start
//!
//! ```rust
//! use quire::parser::PdfDictionary;
//! use quire::{Document, DocumentAssembler, Result};
//!
//! # fn main() -> Result<()> {
//! // Build a small document
//! let mut first = Document::new();
//! first.add_page(PdfDictionary::new())?;
//! first.add_page(PdfDictionary::new())?;
//!
//! let mut second = Document::new();
//! second.add_page(PdfDictionary::new())?;
//!
//! // Merge, rotate and serialize
//! let assembler = DocumentAssembler::default();
//! let mut merged = assembler.merge(&[first, second])?;
//! assembler.rotate_pages(&mut merged, 90)?;
//!
//! let bytes = assembler.serialize(&merged)?;
//! assert_eq!(assembler.count_pages(&bytes), 3);
//! # Ok(())
//! # }
//! ```
//!
//! ### Working with stored files
//!
//! ```rust,no_run
//! use quire::storage::{FsStorage, Storage};
//! use quire::{AssemblerConfig, PdfService};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let storage = FsStorage::new("documents")?;
//! let service = PdfService::new(storage, AssemblerConfig::default());
//!
//! let report = service.storage().stat("report.pdf")?;
//! for page in service.extract_pages(&report)? {
//!     println!("Stored {}", page.key);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`parser`] - Tokenizer and object reader
//! - [`recovery`] - Cross-reference reconstruction for damaged files
//! - [`document`] - In-memory document model and page tree
//! - [`operations`] - Extraction, assembly, merge, split and rotation
//! - [`writer`] - Serialization back to PDF bytes
//! - [`storage`] - Blob storage collaborator
//! - [`service`] - Operations over stored files

pub mod document;
pub mod error;
pub mod geometry;
pub mod operations;
pub mod parser;
pub mod recovery;
pub mod service;
pub mod storage;
pub mod writer;

// Re-export the document model
pub use document::{Document, PageNode, PageTree};
pub use error::{PdfError, Result};
pub use geometry::{Orientation, Point, Rectangle};

// Re-export parsing types
pub use parser::{
    ParseError, ParseOptions, PdfArray, PdfDictionary, PdfName, PdfObject, PdfReader, PdfStream,
    PdfString, PdfVersion,
};

// Re-export operations
pub use operations::{
    extract_page, extract_pages, merge_documents, rotate_pages, split_document, AssemblerConfig,
    DocumentAssembler, MergeInput, MergeOptions, PageRange, RotationAngle, SplitMode,
};

pub use service::PdfService;
pub use storage::{DocumentVariant, FsStorage, MemoryStorage, Storage, StorageError, StoredFile};
pub use writer::{PdfWriter, WriterOptions};

/// Current version of quire
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Supported PDF versions
pub mod pdf_version {
    /// Header versions the reader accepts
    pub const SUPPORTED_VERSIONS: &[&str] = &[
        "1.0", "1.1", "1.2", "1.3", "1.4", "1.5", "1.6", "1.7", "2.0",
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_empty_document() {
        let doc = Document::new();
        assert_eq!(doc.page_count(), 0);
    }

    #[test]
    fn test_version_info() {
        assert!(!VERSION.is_empty());
        assert!(pdf_version::SUPPORTED_VERSIONS.contains(&"1.7"));
        for version in pdf_version::SUPPORTED_VERSIONS {
            let (major, minor) = version.split_once('.').unwrap();
            let version = PdfVersion::new(major.parse().unwrap(), minor.parse().unwrap());
            assert!(version.is_supported());
        }
    }
}
