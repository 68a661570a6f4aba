//! PDF Cross-Reference Table Parser
//!
//! Parses xref tables according to ISO 32000-1 Section 7.5.4, cross-reference
//! streams according to Section 7.5.8, and follows the `/Prev` chain of
//! incrementally updated files (Section 7.5.6).

use super::lexer::{rfind_bytes, Lexer, Token};
use super::objects::{ParseContext, PdfDictionary, PdfObject, PdfStream};
use super::{ParseError, ParseResult};
use std::collections::{BTreeMap, HashSet};

/// How far from the end of the file `startxref` is searched for
const STARTXREF_SEARCH_WINDOW: usize = 2048;

/// Cross-reference entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntry {
    /// Free object entry
    Free { next_free: u32, generation: u16 },
    /// In-use object stored at a byte offset
    InUse { offset: u64, generation: u16 },
    /// Object stored inside an object stream (PDF 1.5+)
    Compressed { stream_number: u32, index: u32 },
}

impl XRefEntry {
    pub fn is_in_use(&self) -> bool {
        !matches!(self, XRefEntry::Free { .. })
    }

    /// Generation number the entry declares; compressed objects are always 0
    pub fn generation(&self) -> u16 {
        match self {
            XRefEntry::Free { generation, .. } | XRefEntry::InUse { generation, .. } => {
                *generation
            }
            XRefEntry::Compressed { .. } => 0,
        }
    }
}

/// Cross-reference table
#[derive(Debug, Clone, Default)]
pub struct XRefTable {
    /// Map of object number to xref entry
    entries: BTreeMap<u32, XRefEntry>,
    /// Trailer dictionary
    trailer: Option<PdfDictionary>,
}

/// One xref section together with the trailer that follows it
struct XRefSection {
    entries: Vec<(u32, XRefEntry)>,
    trailer: PdfDictionary,
}

impl XRefTable {
    /// Create a new empty xref table
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the cross-reference data of a whole file.
    ///
    /// Starts at the offset named by the last `startxref` and walks `/Prev`
    /// links; entries from newer sections shadow older ones. `base_offset` is
    /// the position of `%PDF-`, used when offsets were computed from it.
    pub fn parse(data: &[u8], base_offset: usize) -> ParseResult<Self> {
        let start = Self::find_xref_offset(data)?;
        let mut table = Self::new();
        let mut visited = HashSet::new();
        let mut next = Some(start);

        while let Some(offset) = next {
            if !visited.insert(offset) {
                tracing::warn!("Cycle in /Prev chain at offset {}", offset);
                break;
            }

            let section = Self::parse_section_with_base(data, offset, base_offset)?;
            next = section
                .trailer
                .get("Prev")
                .and_then(|p| p.as_integer())
                .and_then(|p| u64::try_from(p).ok());

            // Hybrid files keep compressed entries in a side stream
            let hybrid = section
                .trailer
                .get("XRefStm")
                .and_then(|p| p.as_integer())
                .and_then(|p| u64::try_from(p).ok());

            let mut section_entries: BTreeMap<u32, XRefEntry> =
                section.entries.into_iter().collect();
            if let Some(stm_offset) = hybrid {
                match Self::parse_section_with_base(data, stm_offset, base_offset) {
                    Ok(stream_section) => {
                        for (number, entry) in stream_section.entries {
                            let shadowed = section_entries
                                .get(&number)
                                .is_some_and(|existing| existing.is_in_use());
                            if !shadowed {
                                section_entries.insert(number, entry);
                            }
                        }
                    }
                    Err(e) => tracing::warn!("Ignoring unreadable /XRefStm section: {}", e),
                }
            }

            for (number, entry) in section_entries {
                table.entries.entry(number).or_insert(entry);
            }
            table.merge_trailer(section.trailer);
        }

        tracing::debug!(
            "Loaded {} xref entries from {} section(s)",
            table.entries.len(),
            visited.len()
        );
        Ok(table)
    }

    /// Fill keys missing from the newest trailer with older values
    fn merge_trailer(&mut self, older: PdfDictionary) {
        match &mut self.trailer {
            None => self.trailer = Some(older),
            Some(current) => {
                for (key, value) in older.0 {
                    if matches!(key.as_str(), "Prev" | "XRefStm") {
                        continue;
                    }
                    current.0.entry(key).or_insert(value);
                }
            }
        }
    }

    fn parse_section_with_base(
        data: &[u8],
        offset: u64,
        base_offset: usize,
    ) -> ParseResult<XRefSection> {
        match Self::parse_section(data, offset) {
            Ok(section) => Ok(section),
            Err(e) if base_offset > 0 => {
                tracing::debug!("xref at {} unreadable ({}), retrying from header", offset, e);
                Self::parse_section(data, offset + base_offset as u64)
            }
            Err(e) => Err(e),
        }
    }

    /// Parse the section at `offset`, either a classic table or a stream
    fn parse_section(data: &[u8], offset: u64) -> ParseResult<XRefSection> {
        let position = usize::try_from(offset)
            .ok()
            .filter(|p| *p < data.len())
            .ok_or(ParseError::InvalidXRef)?;

        let mut lexer = Lexer::at(data, position);
        match lexer.next_significant_token()? {
            Token::XRef => Self::parse_traditional_xref(&mut lexer),
            Token::Integer(_) => {
                lexer.set_position(position);
                let (_, object) = PdfObject::parse_indirect(&mut lexer, &ParseContext::default())?;
                match object {
                    PdfObject::Stream(stream) if stream.dict.get_type() == Some("XRef") => {
                        let xref_stream = XRefStream::parse(&stream)?;
                        Ok(XRefSection {
                            entries: xref_stream.to_xref_entries()?,
                            trailer: xref_stream.dict,
                        })
                    }
                    _ => Err(ParseError::InvalidXRef),
                }
            }
            _ => Err(ParseError::InvalidXRef),
        }
    }

    /// Parse traditional xref table, positioned after the `xref` keyword
    fn parse_traditional_xref(lexer: &mut Lexer<'_>) -> ParseResult<XRefSection> {
        let mut entries = Vec::new();

        loop {
            let first = match lexer.next_significant_token()? {
                Token::Trailer => break,
                Token::Integer(n) => u32::try_from(n).map_err(|_| ParseError::InvalidXRef)?,
                _ => return Err(ParseError::InvalidXRef),
            };
            let count = match lexer.next_significant_token()? {
                Token::Integer(n) => u32::try_from(n).map_err(|_| ParseError::InvalidXRef)?,
                _ => return Err(ParseError::InvalidXRef),
            };

            // count comes from the file; entries are read until it runs out
            let mut subsection = Vec::new();
            for i in 0..count {
                let entry = Self::parse_xref_entry(lexer)?;
                subsection.push((first.saturating_add(i), entry));
            }

            // Some writers start the first subsection at 1 although it holds
            // the free-list head of object 0
            if first == 1 {
                if let Some((_, XRefEntry::Free { generation: 65535, .. })) = subsection.first() {
                    tracing::debug!("Shifting xref subsection that starts at 1 onto 0");
                    for (number, _) in subsection.iter_mut() {
                        *number -= 1;
                    }
                }
            }
            entries.extend(subsection);
        }

        let trailer = match PdfObject::parse(lexer, &ParseContext::default())? {
            PdfObject::Dictionary(dict) => dict,
            other => {
                return Err(ParseError::InvalidTrailer(format!(
                    "expected dictionary, found {}",
                    other.type_name()
                )))
            }
        };

        Ok(XRefSection { entries, trailer })
    }

    /// Parse a single `oooooooooo ggggg n|f` entry
    fn parse_xref_entry(lexer: &mut Lexer<'_>) -> ParseResult<XRefEntry> {
        let offset = match lexer.next_significant_token()? {
            Token::Integer(n) => u64::try_from(n).map_err(|_| ParseError::InvalidXRef)?,
            _ => return Err(ParseError::InvalidXRef),
        };
        let generation = match lexer.next_significant_token()? {
            Token::Integer(n) => u16::try_from(n).map_err(|_| ParseError::InvalidXRef)?,
            _ => return Err(ParseError::InvalidXRef),
        };

        match lexer.next_significant_token()? {
            // An in-use entry at offset 0 cannot point at an object
            Token::Keyword(flag) if flag == "n" && offset > 0 => {
                Ok(XRefEntry::InUse { offset, generation })
            }
            Token::Keyword(flag) if flag == "n" || flag == "f" => Ok(XRefEntry::Free {
                next_free: u32::try_from(offset).unwrap_or(0),
                generation,
            }),
            _ => Err(ParseError::InvalidXRef),
        }
    }

    /// Find the xref offset by looking for startxref at the end of the file
    pub fn find_xref_offset(data: &[u8]) -> ParseResult<u64> {
        let tail_start = data.len().saturating_sub(STARTXREF_SEARCH_WINDOW);
        let tail = &data[tail_start..];
        let keyword = rfind_bytes(tail, b"startxref").ok_or(ParseError::InvalidXRef)?;

        let mut lexer = Lexer::at(data, tail_start + keyword);
        lexer.expect_keyword("startxref")?;
        match lexer.next_significant_token()? {
            Token::Integer(offset) => u64::try_from(offset).map_err(|_| ParseError::InvalidXRef),
            _ => Err(ParseError::InvalidXRef),
        }
    }

    /// Get an xref entry by object number
    pub fn get_entry(&self, obj_num: u32) -> Option<&XRefEntry> {
        self.entries.get(&obj_num)
    }

    /// Add or replace an entry
    pub fn insert(&mut self, obj_num: u32, entry: XRefEntry) {
        self.entries.insert(obj_num, entry);
    }

    /// Get the trailer dictionary
    pub fn trailer(&self) -> Option<&PdfDictionary> {
        self.trailer.as_ref()
    }

    pub fn set_trailer(&mut self, trailer: PdfDictionary) {
        self.trailer = Some(trailer);
    }

    /// Get the number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all entries in ascending object number
    pub fn iter(&self) -> impl Iterator<Item = (&u32, &XRefEntry)> {
        self.entries.iter()
    }

    /// Iterate over entries that describe live objects
    pub fn in_use(&self) -> impl Iterator<Item = (u32, XRefEntry)> + '_ {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.is_in_use())
            .map(|(number, entry)| (*number, *entry))
    }
}

/// Cross-reference stream (PDF 1.5+)
#[derive(Debug, Clone)]
pub struct XRefStream {
    /// Stream dictionary, which doubles as the trailer
    pub dict: PdfDictionary,
    /// Decoded stream data
    pub data: Vec<u8>,
    /// Field widths from W array
    pub widths: [usize; 3],
    /// Index array (pairs of [first_object_number, count])
    pub index: Vec<(u32, u32)>,
}

impl XRefStream {
    /// Parse an xref stream object
    pub fn parse(stream: &PdfStream) -> ParseResult<Self> {
        let dict = &stream.dict;
        let widths: Vec<usize> = dict
            .get("W")
            .and_then(|obj| obj.as_array())
            .ok_or_else(|| ParseError::MissingKey("W array in xref stream".to_string()))?
            .iter()
            .map(|obj| {
                obj.as_integer()
                    .and_then(|n| usize::try_from(n).ok())
                    .filter(|n| *n <= 8)
                    .ok_or_else(|| ParseError::SyntaxError {
                        position: 0,
                        message: "Invalid width in W array".to_string(),
                    })
            })
            .collect::<ParseResult<_>>()?;

        let widths: [usize; 3] = widths.try_into().map_err(|w: Vec<usize>| {
            ParseError::SyntaxError {
                position: 0,
                message: format!("W array must have 3 elements, found {}", w.len()),
            }
        })?;

        let index = match dict.get("Index").and_then(|obj| obj.as_array()) {
            Some(index_array) => index_array
                .0
                .chunks_exact(2)
                .map(|pair| {
                    let first = pair[0].as_integer().and_then(|n| u32::try_from(n).ok());
                    let count = pair[1].as_integer().and_then(|n| u32::try_from(n).ok());
                    first.zip(count).ok_or_else(|| ParseError::SyntaxError {
                        position: 0,
                        message: "Invalid Index array in xref stream".to_string(),
                    })
                })
                .collect::<ParseResult<Vec<_>>>()?,
            None => {
                // Default: start at 0, count is Size
                let size = dict
                    .get("Size")
                    .and_then(|obj| obj.as_integer())
                    .and_then(|n| u32::try_from(n).ok())
                    .ok_or_else(|| ParseError::MissingKey("Size in xref stream".to_string()))?;
                vec![(0, size)]
            }
        };

        Ok(XRefStream {
            dict: dict.clone(),
            data: stream.decode()?,
            widths,
            index,
        })
    }

    /// Convert the cross-reference stream to xref entries
    pub fn to_xref_entries(&self) -> ParseResult<Vec<(u32, XRefEntry)>> {
        let entry_size: usize = self.widths.iter().sum();
        if entry_size == 0 {
            return Err(ParseError::SyntaxError {
                position: 0,
                message: "Invalid entry size (0) in xref stream".to_string(),
            });
        }

        let mut entries = Vec::new();
        let mut rows = self.data.chunks_exact(entry_size);

        for &(first_obj, count) in &self.index {
            for i in 0..count {
                let Some(row) = rows.next() else {
                    tracing::warn!(
                        "Xref stream truncated after {} entries",
                        entries.len()
                    );
                    return Ok(entries);
                };

                let (type_bytes, rest) = row.split_at(self.widths[0]);
                let (second, third) = rest.split_at(self.widths[1]);

                // A zero-width type field defaults to type 1
                let entry_type = if self.widths[0] == 0 {
                    1
                } else {
                    read_field(type_bytes)
                };
                let field2 = read_field(second);
                let field3 = read_field(third);
                let number = first_obj.saturating_add(i);

                let entry = match entry_type {
                    0 => XRefEntry::Free {
                        next_free: u32::try_from(field2).unwrap_or(0),
                        generation: u16::try_from(field3).unwrap_or(0),
                    },
                    1 if field2 > 0 => match u16::try_from(field3) {
                        Ok(generation) => XRefEntry::InUse {
                            offset: field2,
                            generation,
                        },
                        Err(_) => oversized_entry(number),
                    },
                    1 => XRefEntry::Free {
                        next_free: 0,
                        generation: u16::try_from(field3).unwrap_or(0),
                    },
                    2 => match (u32::try_from(field2), u32::try_from(field3)) {
                        (Ok(stream_number), Ok(index)) => XRefEntry::Compressed {
                            stream_number,
                            index,
                        },
                        _ => oversized_entry(number),
                    },
                    // Unknown types are treated as references to the null object
                    _ => continue,
                };

                entries.push((number, entry));
            }
        }

        Ok(entries)
    }
}

/// Entry whose fields do not fit their types; the object reads as free
fn oversized_entry(number: u32) -> XRefEntry {
    tracing::warn!("Xref stream entry for object {} is out of range", number);
    XRefEntry::Free {
        next_free: 0,
        generation: 0,
    }
}

/// Read a field from bytes (big-endian)
fn read_field(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(0u64, |value, &byte| (value << 8) | u64::from(byte))
}
