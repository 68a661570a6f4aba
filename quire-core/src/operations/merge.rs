//! PDF merging functionality
//!
//! Merging builds a fresh document and imports the selected pages of every
//! input in order, so object numbers of different inputs can never collide.
//! The inputs themselves are left untouched.

use super::import::import_pages;
use super::page_extraction::copy_info;
use super::PageRange;
use crate::document::Document;
use crate::error::{PdfError, Result};

/// How to handle metadata when merging
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MetadataMode {
    /// Use metadata from the first document
    #[default]
    FromFirst,
    /// Use metadata from a specific document (by index)
    FromDocument(usize),
    /// Don't set any metadata
    None,
}

/// Options for PDF merging
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct MergeOptions {
    pub metadata_mode: MetadataMode,
}

/// One document and the pages to take from it
#[derive(Debug, Clone)]
pub struct MergeInput<'d> {
    pub document: &'d Document,
    /// Pages to take from this input
    pub pages: PageRange,
}

impl<'d> MergeInput<'d> {
    /// Create a new merge input that includes all pages
    pub fn new(document: &'d Document) -> Self {
        Self {
            document,
            pages: PageRange::All,
        }
    }

    /// Create a merge input with specific pages
    pub fn with_pages(document: &'d Document, pages: PageRange) -> Self {
        Self { document, pages }
    }
}

/// Concatenate the selected pages of `inputs` into a new document.
///
/// The output takes the highest header version among the inputs.
pub fn merge_documents(inputs: &[MergeInput<'_>], options: &MergeOptions) -> Result<Document> {
    if inputs.is_empty() {
        return Err(PdfError::EmptyMergeSet);
    }

    let mut merged = Document::new();
    if let Some(version) = inputs.iter().map(|input| input.document.version()).max() {
        merged.set_version(version);
    }

    let mut total = 0;
    for (index, input) in inputs.iter().enumerate() {
        let pages = input.pages.select(input.document)?;
        import_pages(&mut merged, input.document, &pages)?;
        tracing::debug!("Merge input {}: {} pages", index, pages.len());
        total += pages.len();
    }

    let metadata_source = match options.metadata_mode {
        MetadataMode::FromFirst => Some(0),
        MetadataMode::FromDocument(index) => Some(index),
        MetadataMode::None => None,
    };
    if let Some(index) = metadata_source {
        let input = inputs.get(index).ok_or_else(|| {
            PdfError::InvalidPageRange(format!(
                "metadata source {index} is not one of the {} inputs",
                inputs.len()
            ))
        })?;
        copy_info(input.document, &mut merged)?;
    }

    tracing::info!("Merged {} documents into {} pages", inputs.len(), total);
    Ok(merged)
}
