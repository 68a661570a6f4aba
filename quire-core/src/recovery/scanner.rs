//! PDF object scanner for recovery operations

use crate::parser::lexer::{find_bytes, is_delimiter, is_whitespace, Lexer, Token};
use crate::parser::objects::{ParseContext, PdfDictionary, PdfObject};
use std::collections::BTreeMap;

/// Scanner for finding `N G obj` definitions in a damaged file
pub struct ObjectScanner {
    /// Found objects indexed by object number; later definitions win
    objects: BTreeMap<u32, ScannedObject>,
    /// Dictionaries following `trailer` keywords, in file order
    trailers: Vec<PdfDictionary>,
    stats: ScanStats,
    max_depth: usize,
}

/// A scanned PDF object
#[derive(Debug, Clone)]
pub struct ScannedObject {
    pub number: u32,
    pub generation: u16,
    /// File offset of the object number
    pub offset: u64,
    /// Object type if detected
    pub object_type: ObjectType,
    /// Parsed value, kept for structural objects only
    pub value: Option<PdfObject>,
}

/// Object kinds the recovery cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectType {
    Catalog,
    Pages,
    Page,
    /// Object stream holding compressed objects
    ObjStm,
    /// Cross-reference stream
    XRef,
    Other,
    /// Header found but the body would not parse
    Unreadable,
}

/// Scan statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanStats {
    /// Number of object headers found, duplicates included
    pub objects_found: usize,
    /// Headers whose body failed to parse
    pub unreadable_objects: usize,
    pub pages_found: usize,
    pub trailers_found: usize,
}

/// Result of scanning operation
#[derive(Debug)]
pub struct ScanResult {
    pub objects: BTreeMap<u32, ScannedObject>,
    pub trailers: Vec<PdfDictionary>,
    pub stats: ScanStats,
}

impl ObjectScanner {
    /// Create a new object scanner
    pub fn new(max_depth: usize) -> Self {
        Self {
            objects: BTreeMap::new(),
            trailers: Vec::new(),
            stats: ScanStats::default(),
            max_depth,
        }
    }

    /// Scan a whole file for object definitions and trailer dictionaries
    pub fn scan(mut self, data: &[u8]) -> ScanResult {
        let mut pos = 0;
        while let Some(found) = find_bytes(&data[pos..], b"obj") {
            let keyword = pos + found;
            pos = keyword + 3;

            if !is_keyword_boundary(data, keyword, 3) {
                continue;
            }
            if let Some((number, generation, start)) = parse_object_header(data, keyword) {
                self.record_object(data, number, generation, start);
            }
        }

        let mut pos = 0;
        while let Some(found) = find_bytes(&data[pos..], b"trailer") {
            let keyword = pos + found;
            pos = keyword + 7;

            if !is_keyword_boundary(data, keyword, 7) {
                continue;
            }
            let mut lexer = Lexer::at(data, keyword + 7);
            let ctx = ParseContext::with_max_depth(self.max_depth);
            if let Ok(PdfObject::Dictionary(dict)) = PdfObject::parse(&mut lexer, &ctx) {
                self.stats.trailers_found += 1;
                self.trailers.push(dict);
            }
        }

        tracing::debug!(
            "Scan found {} object headers ({} distinct), {} trailers",
            self.stats.objects_found,
            self.objects.len(),
            self.stats.trailers_found
        );

        ScanResult {
            objects: self.objects,
            trailers: self.trailers,
            stats: self.stats,
        }
    }

    fn record_object(&mut self, data: &[u8], number: u32, generation: u16, start: usize) {
        self.stats.objects_found += 1;

        let ctx = ParseContext::with_max_depth(self.max_depth);
        let mut lexer = Lexer::at(data, start);
        let parsed = PdfObject::parse_indirect(&mut lexer, &ctx);

        let (object_type, value) = match parsed {
            Ok((_, object)) => {
                let object_type = detect_object_type(&object);
                let keep = matches!(
                    object_type,
                    ObjectType::Catalog | ObjectType::ObjStm | ObjectType::XRef
                );
                (object_type, keep.then_some(object))
            }
            Err(e) => {
                tracing::debug!("Object {} {} at {} unreadable: {}", number, generation, start, e);
                self.stats.unreadable_objects += 1;
                (ObjectType::Unreadable, None)
            }
        };

        if object_type == ObjectType::Page {
            self.stats.pages_found += 1;
        }

        // An unreadable redefinition must not hide a readable earlier one
        if object_type == ObjectType::Unreadable && self.objects.contains_key(&number) {
            return;
        }

        self.objects.insert(
            number,
            ScannedObject {
                number,
                generation,
                offset: start as u64,
                object_type,
                value,
            },
        );
    }
}

/// The keyword at `at` must be delimited on both sides
fn is_keyword_boundary(data: &[u8], at: usize, len: usize) -> bool {
    let before_ok = at == 0 || is_whitespace(data[at - 1]);
    let after_ok = data
        .get(at + len)
        .map_or(true, |&b| is_whitespace(b) || is_delimiter(b));
    before_ok && after_ok
}

/// Walk backwards from `obj` over `N G` and return them with the offset of N
fn parse_object_header(data: &[u8], keyword: usize) -> Option<(u32, u16, usize)> {
    let mut end = keyword;
    while end > 0 && is_whitespace(data[end - 1]) {
        end -= 1;
    }
    let gen_end = end;
    while end > 0 && data[end - 1].is_ascii_digit() {
        end -= 1;
    }
    let gen_start = end;
    if gen_start == gen_end || gen_start == 0 || !is_whitespace(data[gen_start - 1]) {
        return None;
    }

    while end > 0 && is_whitespace(data[end - 1]) {
        end -= 1;
    }
    let num_end = end;
    while end > 0 && data[end - 1].is_ascii_digit() {
        end -= 1;
    }
    let num_start = end;
    if num_start == num_end {
        return None;
    }
    if num_start > 0 && !(is_whitespace(data[num_start - 1]) || is_delimiter(data[num_start - 1]))
    {
        return None;
    }

    // Re-lex to make sure the three tokens really are adjacent
    let mut lexer = Lexer::at(data, num_start);
    match (lexer.next_token().ok()?, lexer.next_token().ok()?) {
        (Token::Integer(n), Token::Integer(g)) => {
            Some((u32::try_from(n).ok()?, u16::try_from(g).ok()?, num_start))
        }
        _ => None,
    }
}

fn detect_object_type(object: &PdfObject) -> ObjectType {
    let Some(dict) = object.as_dict() else {
        return ObjectType::Other;
    };
    match dict.get_type() {
        Some("Catalog") => ObjectType::Catalog,
        Some("Pages") => ObjectType::Pages,
        Some("Page") => ObjectType::Page,
        Some("ObjStm") if object.as_stream().is_some() => ObjectType::ObjStm,
        Some("XRef") if object.as_stream().is_some() => ObjectType::XRef,
        _ => ObjectType::Other,
    }
}
