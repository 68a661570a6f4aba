//! PDF Header Parser
//!
//! Parses PDF header and version according to ISO 32000-1 Section 7.5.2

use super::lexer::find_bytes;
use super::{ParseError, ParseResult};

/// How far into the file the `%PDF-` marker may appear
pub const HEADER_SEARCH_WINDOW: usize = 1024;

/// PDF Version information
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PdfVersion {
    pub major: u8,
    pub minor: u8,
}

impl PdfVersion {
    /// Create a new PDF version
    pub fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    /// Check if this version is supported
    pub fn is_supported(&self) -> bool {
        // We support PDF 1.0 through 2.0
        matches!((self.major, self.minor), (1, 0..=7) | (2, 0))
    }
}

impl Default for PdfVersion {
    fn default() -> Self {
        Self::new(1, 7)
    }
}

impl std::fmt::Display for PdfVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// PDF Header information
#[derive(Debug, Clone, PartialEq)]
pub struct PdfHeader {
    pub version: PdfVersion,
    /// Byte offset of `%PDF-`; non-zero when junk precedes the header
    pub offset: usize,
    pub has_binary_marker: bool,
}

impl PdfHeader {
    /// Parse the PDF header from the start of a file
    pub fn parse(data: &[u8]) -> ParseResult<Self> {
        if data.is_empty() {
            return Err(ParseError::EmptyFile);
        }

        let window = &data[..data.len().min(HEADER_SEARCH_WINDOW)];
        let offset = find_bytes(window, b"%PDF-").ok_or(ParseError::InvalidHeader)?;
        let rest = &data[offset + 5..];

        let line_end = rest
            .iter()
            .position(|b| matches!(b, b'\r' | b'\n'))
            .unwrap_or(rest.len());
        let version = Self::parse_version(&rest[..line_end])?;

        if !version.is_supported() {
            return Err(ParseError::UnsupportedVersion(version.to_string()));
        }

        let has_binary_marker = Self::check_binary_marker(&rest[line_end..]);

        Ok(PdfHeader {
            version,
            offset,
            has_binary_marker,
        })
    }

    /// Parse `M.m`; trailing bytes after the minor digits are ignored
    fn parse_version(line: &[u8]) -> ParseResult<PdfVersion> {
        let line = String::from_utf8_lossy(line);
        let (major, minor) = line.trim().split_once('.').ok_or(ParseError::InvalidHeader)?;

        let minor_digits: String = minor.chars().take_while(|c| c.is_ascii_digit()).collect();
        let major = major
            .trim()
            .parse::<u8>()
            .map_err(|_| ParseError::InvalidHeader)?;
        let minor = minor_digits
            .parse::<u8>()
            .map_err(|_| ParseError::InvalidHeader)?;

        Ok(PdfVersion::new(major, minor))
    }

    /// Check for the binary marker comment on the line after the header
    fn check_binary_marker(rest: &[u8]) -> bool {
        let start = rest
            .iter()
            .position(|b| !matches!(b, b'\r' | b'\n'))
            .unwrap_or(rest.len());
        let line = &rest[start..];
        let end = line
            .iter()
            .position(|b| matches!(b, b'\r' | b'\n'))
            .unwrap_or(line.len());
        let line = &line[..end];

        line.first() == Some(&b'%') && line[1..].iter().filter(|b| **b >= 128).count() >= 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pdf_header_basic() {
        let header = PdfHeader::parse(b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n1 0 obj").unwrap();
        assert_eq!(header.version, PdfVersion::new(1, 7));
        assert_eq!(header.offset, 0);
        assert!(header.has_binary_marker);
    }

    #[test]
    fn test_parse_pdf_header_without_binary_marker() {
        let header = PdfHeader::parse(b"%PDF-1.4\r\n1 0 obj").unwrap();
        assert_eq!(header.version, PdfVersion::new(1, 4));
        assert!(!header.has_binary_marker);
    }

    #[test]
    fn test_parse_pdf_header_with_leading_junk() {
        let mut data = vec![b'x'; 300];
        data.extend_from_slice(b"%PDF-1.3\n");
        let header = PdfHeader::parse(&data).unwrap();
        assert_eq!(header.offset, 300);
        assert_eq!(header.version, PdfVersion::new(1, 3));
    }

    #[test]
    fn test_parse_pdf_header_beyond_window() {
        let mut data = vec![b' '; HEADER_SEARCH_WINDOW + 10];
        data.extend_from_slice(b"%PDF-1.3\n");
        assert!(matches!(
            PdfHeader::parse(&data),
            Err(ParseError::InvalidHeader)
        ));
    }

    #[test]
    fn test_parse_pdf_header_trailing_garbage_after_version() {
        let header = PdfHeader::parse(b"%PDF-1.5 some producer note\n").unwrap();
        assert_eq!(header.version, PdfVersion::new(1, 5));
    }

    #[test]
    fn test_invalid_headers() {
        assert!(matches!(PdfHeader::parse(b""), Err(ParseError::EmptyFile)));
        assert!(matches!(
            PdfHeader::parse(b"%PS-Adobe-3.0\n"),
            Err(ParseError::InvalidHeader)
        ));
        assert!(matches!(
            PdfHeader::parse(b"%PDF-x.y\n"),
            Err(ParseError::InvalidHeader)
        ));
        assert!(matches!(
            PdfHeader::parse(b"%PDF-3.0\n"),
            Err(ParseError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn test_version_display_and_order() {
        assert_eq!(PdfVersion::new(1, 7).to_string(), "1.7");
        assert!(PdfVersion::new(1, 4) < PdfVersion::new(2, 0));
        assert_eq!(PdfVersion::default(), PdfVersion::new(1, 7));
    }
}
