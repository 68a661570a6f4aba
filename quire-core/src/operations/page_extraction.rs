//! Page extraction functionality
//!
//! Builds brand-new documents out of selected pages of a source document.
//! Each output owns deep copies of everything its pages reference and never
//! shares object numbers with the source.

use super::import::{import_pages, ObjectImporter};
use super::PageRange;
use crate::document::{Document, PageNode};
use crate::error::{PdfError, Result};
use crate::parser::objects::PdfObject;

/// Options for page extraction
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct PageExtractionOptions {
    /// Copy the source's information dictionary into each output
    pub preserve_metadata: bool,
}

impl Default for PageExtractionOptions {
    fn default() -> Self {
        Self {
            preserve_metadata: true,
        }
    }
}

/// Page extractor for extracting pages from PDF documents
#[derive(Debug, Clone, Default)]
pub struct PageExtractor {
    options: PageExtractionOptions,
}

impl PageExtractor {
    /// Create a new page extractor
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new page extractor with custom options
    pub fn with_options(options: PageExtractionOptions) -> Self {
        Self { options }
    }

    /// Extract the page at 1-based `index` into a single-page document
    pub fn extract(&self, doc: &Document, index: usize) -> Result<Document> {
        let pages = source_pages(doc)?;
        let count = pages.len();
        let page = pages
            .into_iter()
            .nth(index.wrapping_sub(1))
            .ok_or(PdfError::PageIndexOutOfRange { index, count })?;
        self.build(doc, &[page])
    }

    /// Extract every page into its own single-page document
    pub fn extract_pages(&self, doc: &Document) -> Result<Vec<Document>> {
        let pages = source_pages(doc)?;
        let extracted = pages
            .iter()
            .map(|page| self.build(doc, std::slice::from_ref(page)))
            .collect::<Result<Vec<_>>>()?;
        tracing::info!("Extracted {} pages", extracted.len());
        Ok(extracted)
    }

    /// Extract a selection of pages into one document
    pub fn extract_range(&self, doc: &Document, range: &PageRange) -> Result<Document> {
        source_pages(doc)?;
        let pages = range.select(doc)?;
        self.build(doc, &pages)
    }

    /// Assemble `pages` of `source` into a fresh document
    pub(crate) fn build(&self, source: &Document, pages: &[PageNode]) -> Result<Document> {
        let mut output = Document::new();
        output.set_version(source.version());
        import_pages(&mut output, source, pages)?;
        if self.options.preserve_metadata {
            copy_info(source, &mut output)?;
        }
        Ok(output)
    }
}

/// Pages of `doc`, failing for a document without any
fn source_pages(doc: &Document) -> Result<Vec<PageNode>> {
    let pages = doc.pages()?;
    if pages.is_empty() {
        return Err(PdfError::EmptySourceDocument);
    }
    Ok(pages)
}

/// Copy the information dictionary of `source`, if it has one
pub(crate) fn copy_info(source: &Document, dest: &mut Document) -> Result<()> {
    let Some(info) = source.info() else {
        return Ok(());
    };
    let copied = ObjectImporter::new().import_value(
        source,
        &PdfObject::Dictionary(info.clone()),
        dest,
    )?;
    if let PdfObject::Dictionary(dict) = copied {
        dest.set_info(dict);
    }
    Ok(())
}

/// Extract the page at 1-based `index` with default options
pub fn extract_page(doc: &Document, index: usize) -> Result<Document> {
    PageExtractor::new().extract(doc, index)
}

/// Extract every page into its own document with default options
pub fn extract_pages(doc: &Document) -> Result<Vec<Document>> {
    PageExtractor::new().extract_pages(doc)
}
