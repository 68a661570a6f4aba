//! PDF operations module
//!
//! Page-level assembly on top of the document model: extracting pages into
//! new documents, appending and merging documents, splitting and rotating.
//! Every operation either returns complete documents or fails; nothing is
//! partially assembled.

pub mod assembler;
pub mod import;
pub mod merge;
pub mod page_extraction;
pub mod rotate;
pub mod split;

pub use assembler::{AssemblerConfig, DocumentAssembler};
pub use import::{import_pages, ObjectImporter};
pub use merge::{merge_documents, MergeInput, MergeOptions, MetadataMode};
pub use page_extraction::{extract_page, extract_pages, PageExtractionOptions, PageExtractor};
pub use rotate::{rotate_all_pages, rotate_pages, RotationAngle};
pub use split::{split_document, SplitMode};

use crate::document::{Document, PageNode};
use crate::error::{PdfError, Result};
use std::fmt;
use std::str::FromStr;

/// Page selection, in 1-based page numbers
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PageRange {
    /// All pages
    All,
    /// Single page
    Single(usize),
    /// Range of pages (inclusive)
    Range(usize, usize),
    /// List of specific pages, in the given order
    List(Vec<usize>),
}

impl PageRange {
    /// Parse a page range from a string
    ///
    /// Examples:
    /// - "all" -> All pages
    /// - "3" -> Single page
    /// - "2-5" -> Range of pages
    /// - "1,3,5" -> List of pages
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();

        if s.eq_ignore_ascii_case("all") {
            return Ok(PageRange::All);
        }

        // Try single page
        if let Ok(page) = s.parse::<usize>() {
            return Ok(PageRange::Single(check_page_number(page)?));
        }

        // Try list (e.g., "1,3,5")
        if s.contains(',') {
            let pages = s
                .split(',')
                .map(|p| {
                    let page = p
                        .trim()
                        .parse::<usize>()
                        .map_err(|_| PdfError::InvalidPageRange(format!("Invalid page: {p}")))?;
                    check_page_number(page)
                })
                .collect::<Result<Vec<_>>>()?;
            return Ok(PageRange::List(pages));
        }

        // Try range (e.g., "1-5")
        if let Some((start, end)) = s.split_once('-') {
            let start = start
                .trim()
                .parse::<usize>()
                .map_err(|_| PdfError::InvalidPageRange(format!("Invalid start: {start}")))?;
            let end = end
                .trim()
                .parse::<usize>()
                .map_err(|_| PdfError::InvalidPageRange(format!("Invalid end: {end}")))?;

            let (start, end) = (check_page_number(start)?, check_page_number(end)?);
            if start > end {
                return Err(PdfError::InvalidPageRange(format!(
                    "Start {start} is greater than end {end}"
                )));
            }

            return Ok(PageRange::Range(start, end));
        }

        Err(PdfError::InvalidPageRange(format!("Invalid format: {s}")))
    }

    /// Resolve to page numbers against a document of `total_pages` pages
    pub fn page_numbers(&self, total_pages: usize) -> Result<Vec<usize>> {
        let check = |page: usize| {
            if page == 0 || page > total_pages {
                Err(PdfError::PageIndexOutOfRange {
                    index: page,
                    count: total_pages,
                })
            } else {
                Ok(page)
            }
        };

        match self {
            PageRange::All => Ok((1..=total_pages).collect()),
            PageRange::Single(page) => Ok(vec![check(*page)?]),
            PageRange::Range(start, end) => {
                if start > end {
                    return Err(PdfError::InvalidPageRange(format!(
                        "Start {start} is greater than end {end}"
                    )));
                }
                check(*start)?;
                check(*end)?;
                Ok((*start..=*end).collect())
            }
            PageRange::List(pages) => pages.iter().map(|&page| check(page)).collect(),
        }
    }

    /// The selected pages of `document`, in selection order
    pub fn select(&self, document: &Document) -> Result<Vec<PageNode>> {
        let pages = document.pages()?;
        let numbers = self.page_numbers(pages.len())?;
        Ok(numbers
            .into_iter()
            .map(|number| pages[number - 1].clone())
            .collect())
    }
}

fn check_page_number(page: usize) -> Result<usize> {
    if page == 0 {
        return Err(PdfError::InvalidPageRange(
            "Page numbers start at 1".to_string(),
        ));
    }
    Ok(page)
}

impl FromStr for PageRange {
    type Err = PdfError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageRange::All => write!(f, "all"),
            PageRange::Single(page) => write!(f, "{page}"),
            PageRange::Range(start, end) => write!(f, "{start}-{end}"),
            PageRange::List(pages) => {
                let pages: Vec<String> = pages.iter().map(ToString::to_string).collect();
                write!(f, "{}", pages.join(","))
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support;
