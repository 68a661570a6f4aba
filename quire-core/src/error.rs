use crate::parser::objects::ObjectRef;
use crate::parser::ParseError;
use crate::storage::{DocumentVariant, StorageError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfError {
    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    #[error("Dangling reference: {0}")]
    DanglingReference(ObjectRef),

    #[error("Page {index} is out of range (document has {count} pages)")]
    PageIndexOutOfRange { index: usize, count: usize },

    #[error("Invalid rotation: {0} degrees (must be 0, 90, 180 or 270)")]
    InvalidRotation(i32),

    #[error("Source document has no pages")]
    EmptySourceDocument,

    #[error("Nothing to merge: no documents given")]
    EmptyMergeSet,

    #[error("Type mismatch: expected {expected} document, found {found}")]
    TypeMismatch {
        expected: DocumentVariant,
        found: DocumentVariant,
    },

    #[error("Source not found: {0}")]
    SourceNotFound(String),

    #[error("Invalid page range: {0}")]
    InvalidPageRange(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PdfError>;

impl From<ParseError> for PdfError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::DanglingReference(reference) => PdfError::DanglingReference(reference),
            other => PdfError::MalformedDocument(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error as IoError, ErrorKind};

    #[test]
    fn test_pdf_error_display() {
        let error = PdfError::MalformedDocument("missing header".to_string());
        assert_eq!(error.to_string(), "Malformed document: missing header");

        let error = PdfError::PageIndexOutOfRange { index: 5, count: 3 };
        assert_eq!(
            error.to_string(),
            "Page 5 is out of range (document has 3 pages)"
        );

        let error = PdfError::InvalidRotation(45);
        assert!(error.to_string().contains("45 degrees"));
    }

    #[test]
    fn test_parse_error_conversion() {
        let error: PdfError = ParseError::InvalidHeader.into();
        assert!(matches!(error, PdfError::MalformedDocument(ref m) if m == "Invalid PDF header"));

        let error: PdfError = ParseError::DanglingReference(ObjectRef::new(4, 0)).into();
        assert!(matches!(
            error,
            PdfError::DanglingReference(r) if r == ObjectRef::new(4, 0)
        ));
    }

    #[test]
    fn test_type_mismatch_display() {
        let error = PdfError::TypeMismatch {
            expected: DocumentVariant::Pdf,
            found: DocumentVariant::Png,
        };
        assert_eq!(
            error.to_string(),
            "Type mismatch: expected pdf document, found png"
        );
    }

    #[test]
    fn test_pdf_error_from_io_error() {
        let io_error = IoError::new(ErrorKind::NotFound, "file not found");
        let pdf_error = PdfError::from(io_error);

        match pdf_error {
            PdfError::Io(ref err) => assert_eq!(err.kind(), ErrorKind::NotFound),
            _ => panic!("Expected IO error variant"),
        }
    }

    #[test]
    fn test_pdf_error_from_storage_error() {
        let error = PdfError::from(StorageError::NotFound("a.pdf".to_string()));
        assert_eq!(error.to_string(), "Storage error: Blob not found: a.pdf");
    }
}
