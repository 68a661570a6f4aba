//! Document assembler
//!
//! [`DocumentAssembler`] is the single entry point for the page-assembly
//! operations. It carries an [`AssemblerConfig`] so that parsing, writing and
//! the accepted document variant are decided in one place instead of through
//! global state.

use super::import::import_pages;
use super::merge::{merge_documents, MergeInput, MergeOptions, MetadataMode};
use super::page_extraction::{copy_info, PageExtractor};
use super::rotate::{rotate_pages, RotationAngle};
use super::split::{split_with, SplitMode};
use super::PageRange;
use crate::document::Document;
use crate::error::{PdfError, Result};
use crate::parser::objects::ObjectRef;
use crate::parser::ParseOptions;
use crate::storage::DocumentVariant;
use crate::writer::WriterOptions;

/// Configuration for [`DocumentAssembler`]
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct AssemblerConfig {
    /// The only kind of stored file merge accepts
    pub document_variant: DocumentVariant,
    pub parse: ParseOptions,
    pub writer: WriterOptions,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            document_variant: DocumentVariant::Pdf,
            parse: ParseOptions::default(),
            writer: WriterOptions::default(),
        }
    }
}

impl AssemblerConfig {
    pub fn with_parse_options(mut self, parse: ParseOptions) -> Self {
        self.parse = parse;
        self
    }

    pub fn with_writer_options(mut self, writer: WriterOptions) -> Self {
        self.writer = writer;
        self
    }

    pub fn with_document_variant(mut self, variant: DocumentVariant) -> Self {
        self.document_variant = variant;
        self
    }
}

/// Page-assembly engine
#[derive(Debug, Clone, Default)]
pub struct DocumentAssembler {
    config: AssemblerConfig,
}

impl DocumentAssembler {
    pub fn new(config: AssemblerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AssemblerConfig {
        &self.config
    }

    /// Parse bytes with the configured options
    pub fn parse(&self, data: &[u8]) -> Result<Document> {
        Document::from_bytes_with_options(data, self.config.parse.clone())
    }

    /// Serialize with the configured options
    pub fn serialize(&self, doc: &Document) -> Result<Vec<u8>> {
        doc.to_bytes_with(&self.config.writer)
    }

    /// Number of pages, 0 when the document cannot be read
    pub fn count_pages(&self, data: &[u8]) -> usize {
        match self.parse(data) {
            Ok(doc) => doc.page_count(),
            Err(e) => {
                tracing::warn!("Cannot parse document ({}); reporting 0 pages", e);
                0
            }
        }
    }

    /// Copy the selected pages of `src` to the end of `dest`
    pub fn import_pages(
        &self,
        dest: &mut Document,
        src: &Document,
        range: &PageRange,
    ) -> Result<Vec<ObjectRef>> {
        let pages = range.select(src)?;
        import_pages(dest, src, &pages)
    }

    /// Append all pages of `src` to `dest`.
    ///
    /// `dest` is rebuilt from scratch: its own pages are re-imported into a
    /// fresh document first, then `src`'s pages follow. Its information
    /// dictionary is kept. On failure `dest` is left as it was.
    pub fn append(&self, dest: &mut Document, src: &Document) -> Result<()> {
        let mut rebuilt = Document::new();
        rebuilt.set_version(dest.version().max(src.version()));

        let own = dest.pages()?;
        let incoming = src.pages()?;
        import_pages(&mut rebuilt, dest, &own)?;
        import_pages(&mut rebuilt, src, &incoming)?;
        copy_info(dest, &mut rebuilt)?;

        tracing::info!(
            "Appended {} pages to a document of {} pages",
            incoming.len(),
            own.len()
        );
        *dest = rebuilt;
        Ok(())
    }

    /// Rotate every page by `degrees` (0, 90, 180 or 270)
    pub fn rotate_pages(&self, doc: &mut Document, degrees: i32) -> Result<usize> {
        self.rotate_page_range(doc, &PageRange::All, degrees)
    }

    /// Rotate the selected pages by `degrees`
    pub fn rotate_page_range(
        &self,
        doc: &mut Document,
        range: &PageRange,
        degrees: i32,
    ) -> Result<usize> {
        let angle = RotationAngle::from_degrees(degrees)?;
        rotate_pages(doc, range, angle)
    }

    /// Merge `documents` in order; metadata comes from the first one
    pub fn merge(&self, documents: &[Document]) -> Result<Document> {
        let inputs: Vec<_> = documents.iter().map(MergeInput::new).collect();
        self.merge_inputs(&inputs)
    }

    pub fn merge_inputs(&self, inputs: &[MergeInput<'_>]) -> Result<Document> {
        merge_documents(
            inputs,
            &MergeOptions {
                metadata_mode: MetadataMode::FromFirst,
            },
        )
    }

    /// Extract the page at 1-based `index` into its own document
    pub fn extract(&self, doc: &Document, index: usize) -> Result<Document> {
        PageExtractor::new().extract(doc, index)
    }

    /// Extract every page into its own document
    pub fn extract_pages(&self, doc: &Document) -> Result<Vec<Document>> {
        PageExtractor::new().extract_pages(doc)
    }

    pub fn split(&self, doc: &Document, mode: &SplitMode) -> Result<Vec<Document>> {
        split_with(&PageExtractor::new(), doc, mode)
    }

    /// Fail unless `found` is the configured document variant
    pub fn check_variant(&self, found: DocumentVariant) -> Result<()> {
        if found == self.config.document_variant {
            Ok(())
        } else {
            Err(PdfError::TypeMismatch {
                expected: self.config.document_variant,
                found,
            })
        }
    }
}
