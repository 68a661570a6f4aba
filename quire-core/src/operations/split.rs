//! PDF splitting functionality
//!
//! Splits a document into several documents along page boundaries.

use super::page_extraction::PageExtractor;
use super::PageRange;
use crate::document::Document;
use crate::error::{PdfError, Result};
use std::str::FromStr;

/// How to divide a document into parts
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SplitMode {
    /// Split into single pages
    SinglePages,
    /// One output per page range
    Ranges(Vec<PageRange>),
    /// Split into chunks of N pages
    ChunkSize(usize),
    /// Start a new output at each of these page numbers
    SplitAt(Vec<usize>),
}

impl SplitMode {
    /// The page ranges this mode produces for a document of `total_pages`
    pub fn ranges(&self, total_pages: usize) -> Result<Vec<PageRange>> {
        match self {
            SplitMode::SinglePages => Ok((1..=total_pages).map(PageRange::Single).collect()),
            SplitMode::Ranges(ranges) => Ok(ranges.clone()),
            SplitMode::ChunkSize(0) => Err(PdfError::InvalidPageRange(
                "chunk size must be at least 1".to_string(),
            )),
            SplitMode::ChunkSize(size) => Ok((1..=total_pages)
                .step_by(*size)
                .map(|start| {
                    PageRange::Range(start, start.saturating_add(size - 1).min(total_pages))
                })
                .collect()),
            SplitMode::SplitAt(points) => {
                let mut points = points.clone();
                points.sort_unstable();
                points.dedup();

                let mut ranges = Vec::new();
                let mut start = 1;
                for point in points {
                    // Points outside (1, total] would produce empty outputs
                    if point > start && point <= total_pages {
                        ranges.push(PageRange::Range(start, point - 1));
                        start = point;
                    }
                }
                if start <= total_pages {
                    ranges.push(PageRange::Range(start, total_pages));
                }
                Ok(ranges)
            }
        }
    }
}

impl FromStr for SplitMode {
    type Err = PdfError;

    /// Parse `pages`, `chunk:N` or `at:a,b,...`
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("pages") {
            return Ok(SplitMode::SinglePages);
        }
        if let Some(size) = s.strip_prefix("chunk:") {
            let size = size
                .trim()
                .parse::<usize>()
                .map_err(|_| PdfError::InvalidPageRange(format!("Invalid chunk size: {size}")))?;
            return Ok(SplitMode::ChunkSize(size));
        }
        if let Some(points) = s.strip_prefix("at:") {
            let points = points
                .split(',')
                .map(|p| {
                    p.trim()
                        .parse::<usize>()
                        .map_err(|_| PdfError::InvalidPageRange(format!("Invalid split point: {p}")))
                })
                .collect::<Result<Vec<_>>>()?;
            return Ok(SplitMode::SplitAt(points));
        }
        Err(PdfError::InvalidPageRange(format!(
            "Invalid split mode: {s} (expected pages, chunk:N or at:a,b)"
        )))
    }
}

/// Split `doc` into several documents
pub fn split_document(doc: &Document, mode: &SplitMode) -> Result<Vec<Document>> {
    split_with(&PageExtractor::new(), doc, mode)
}

pub(crate) fn split_with(
    extractor: &PageExtractor,
    doc: &Document,
    mode: &SplitMode,
) -> Result<Vec<Document>> {
    let total_pages = doc.pages()?.len();
    if total_pages == 0 {
        return Err(PdfError::EmptySourceDocument);
    }

    let outputs = mode
        .ranges(total_pages)?
        .iter()
        .map(|range| {
            let pages = range.select(doc)?;
            extractor.build(doc, &pages)
        })
        .collect::<Result<Vec<_>>>()?;

    tracing::info!(
        "Split {} pages into {} documents",
        total_pages,
        outputs.len()
    );
    Ok(outputs)
}
