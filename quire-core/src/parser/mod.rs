//! PDF Parser Module
//!
//! Reads PDF byte streams into the in-memory object graph according to
//! ISO 32000-1 Section 7. The parser never interprets page content: content
//! streams are kept as opaque byte payloads.

pub mod filters;
pub mod header;
pub mod lexer;
pub mod object_stream;
pub mod objects;
pub mod reader;
pub mod trailer;
pub mod xref;

#[cfg(test)]
mod reader_tests;
#[cfg(test)]
pub(crate) mod test_helpers;

use crate::parser::objects::ObjectRef;

pub use self::header::{PdfHeader, PdfVersion};
pub use self::objects::{PdfArray, PdfDictionary, PdfName, PdfObject, PdfStream, PdfString};
pub use self::reader::PdfReader;
pub use self::trailer::PdfTrailer;
pub use self::xref::{XRefEntry, XRefTable};

/// Result type for parser operations
pub type ParseResult<T> = Result<T, ParseError>;

/// PDF Parser errors
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid PDF header")]
    InvalidHeader,

    #[error("Unsupported PDF version: {0}")]
    UnsupportedVersion(String),

    #[error("Syntax error at position {position}: {message}")]
    SyntaxError { position: usize, message: String },

    #[error("Unexpected token: expected {expected}, found {found}")]
    UnexpectedToken { expected: String, found: String },

    #[error("Missing required key: {0}")]
    MissingKey(String),

    #[error("Invalid xref table")]
    InvalidXRef,

    #[error("Invalid trailer: {0}")]
    InvalidTrailer(String),

    #[error("Object {object} points at offset {offset}, outside of the {len} byte file")]
    OffsetOutOfBounds {
        object: ObjectRef,
        offset: u64,
        len: usize,
    },

    #[error("Dangling reference: {0}")]
    DanglingReference(ObjectRef),

    #[error("Circular reference detected")]
    CircularReference,

    #[error("Objects nested deeper than {0} levels")]
    NestingTooDeep(usize),

    #[error("Stream decode error: {0}")]
    StreamDecodeError(String),

    #[error("Encryption not supported")]
    EncryptionNotSupported,

    #[error("Empty file")]
    EmptyFile,
}

/// Options controlling how tolerant the reader is of damaged input
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct ParseOptions {
    /// Rebuild the cross-reference table by scanning for `obj` markers when
    /// the declared one is missing or inconsistent
    pub recover_xref: bool,
    /// Maximum nesting of arrays and dictionaries inside a single object
    pub max_object_depth: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self::lenient()
    }
}

impl ParseOptions {
    /// Options that reject any structural damage
    pub fn strict() -> Self {
        Self {
            recover_xref: false,
            max_object_depth: 256,
        }
    }

    /// Options that fall back to xref reconstruction
    pub fn lenient() -> Self {
        Self {
            recover_xref: true,
            max_object_depth: 256,
        }
    }
}
