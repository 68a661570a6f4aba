//! High-level PDF Reader API
//!
//! Loads every live object of a PDF byte stream into an owned object table,
//! validating the cross-reference data on the way and falling back to a
//! linear scan of the file when it cannot be trusted.

use super::header::{PdfHeader, PdfVersion};
use super::lexer::{Lexer, Token};
use super::object_stream::ObjectStream;
use super::objects::{ObjectRef, ParseContext, PdfObject};
use super::trailer::PdfTrailer;
use super::xref::{XRefEntry, XRefTable};
use super::{ParseError, ParseOptions, ParseResult};
use crate::recovery;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Fully loaded contents of a PDF file
#[derive(Debug, Clone)]
pub struct ParsedPdf {
    pub version: PdfVersion,
    pub trailer: PdfTrailer,
    pub objects: BTreeMap<ObjectRef, PdfObject>,
    /// Whether the cross-reference table had to be rebuilt
    pub recovered: bool,
}

/// High-level PDF reader over an in-memory byte slice
pub struct PdfReader<'a> {
    data: &'a [u8],
    header: PdfHeader,
    xref: XRefTable,
    trailer: PdfTrailer,
    /// Cache of object streams
    object_stream_cache: HashMap<u32, ObjectStream>,
    /// Parsing options
    options: ParseOptions,
    recovered: bool,
}

impl<'a> PdfReader<'a> {
    /// Parse a whole PDF file with default options
    pub fn parse(data: &'a [u8]) -> ParseResult<ParsedPdf> {
        Self::parse_with_options(data, ParseOptions::default())
    }

    /// Parse a whole PDF file, rejecting documents whose object graph
    /// references objects that do not exist
    pub fn parse_with_options(data: &'a [u8], options: ParseOptions) -> ParseResult<ParsedPdf> {
        let mut reader = Self::new_with_options(data, options)?;
        let mut objects = reader.load_all()?;

        if let Err(err) = reader.check_references(&objects) {
            if !(reader.options.recover_xref && !reader.recovered) {
                return Err(err);
            }
            // The declared xref may simply have omitted live objects
            tracing::warn!("{}; rebuilding cross-reference table", err);
            reader.rebuild_xref()?;
            objects = reader.load_all()?;
            reader.check_references(&objects)?;
        }

        reader.drop_dangling_info(&objects);

        tracing::debug!(
            "Parsed PDF {} with {} objects{}",
            reader.header.version,
            objects.len(),
            if reader.recovered { " (recovered)" } else { "" }
        );

        Ok(ParsedPdf {
            version: reader.header.version,
            trailer: reader.trailer,
            objects,
            recovered: reader.recovered,
        })
    }

    /// Create a reader with default options
    pub fn new(data: &'a [u8]) -> ParseResult<Self> {
        Self::new_with_options(data, ParseOptions::default())
    }

    /// Create a reader with custom parsing options
    pub fn new_with_options(data: &'a [u8], options: ParseOptions) -> ParseResult<Self> {
        let header = PdfHeader::parse(data)?;

        let declared = XRefTable::parse(data, header.offset).and_then(|xref| {
            Self::validate_xref(data, &xref)?;
            let trailer = xref
                .trailer()
                .cloned()
                .ok_or_else(|| ParseError::InvalidTrailer("missing".to_string()))?;
            Ok((xref, trailer))
        });

        let (xref, trailer_dict, recovered) = match declared {
            Ok((xref, trailer)) if trailer.contains_key("Root") => (xref, trailer, false),
            outcome => {
                if !options.recover_xref {
                    return Err(match outcome {
                        Ok(_) => ParseError::MissingKey("Root".to_string()),
                        Err(e) => e,
                    });
                }
                match outcome {
                    Ok(_) => tracing::warn!("Trailer has no /Root, scanning file"),
                    Err(e) => {
                        tracing::warn!("Cross-reference data unusable ({}), scanning file", e)
                    }
                }
                let xref = recovery::rebuild_xref(data, options.max_object_depth)?;
                let trailer = xref
                    .trailer()
                    .cloned()
                    .ok_or_else(|| ParseError::InvalidTrailer("not recoverable".to_string()))?;
                (xref, trailer, true)
            }
        };

        let trailer = PdfTrailer::from_dict(trailer_dict)?;

        Ok(Self {
            data,
            header,
            xref,
            trailer,
            object_stream_cache: HashMap::new(),
            options,
            recovered,
        })
    }

    /// Check that every in-use entry points at a matching `N G obj` header
    fn validate_xref(data: &[u8], xref: &XRefTable) -> ParseResult<()> {
        for (number, entry) in xref.in_use() {
            let XRefEntry::InUse { offset, generation } = entry else {
                continue;
            };
            let object = ObjectRef::new(number, generation);
            let position = usize::try_from(offset)
                .ok()
                .filter(|p| *p < data.len())
                .ok_or(ParseError::OffsetOutOfBounds {
                    object,
                    offset,
                    len: data.len(),
                })?;

            let mut lexer = Lexer::at(data, position);
            let header = (
                lexer.next_token()?,
                lexer.next_token()?,
                lexer.next_token()?,
            );
            let matches = matches!(
                header,
                (Token::Integer(n), Token::Integer(g), Token::Obj)
                    if n == i64::from(number) && g == i64::from(generation)
            );
            if !matches {
                tracing::debug!("xref entry for {} does not point at its object", object);
                return Err(ParseError::InvalidXRef);
            }
        }
        Ok(())
    }

    /// Replace the declared xref with one rebuilt by scanning
    fn rebuild_xref(&mut self) -> ParseResult<()> {
        let xref = recovery::rebuild_xref(self.data, self.options.max_object_depth)?;
        let root = self.trailer.root()?;

        // Keep the declared trailer when it still names a live catalog
        if xref.get_entry(root.number).is_none() {
            if let Some(trailer) = xref.trailer() {
                self.trailer = PdfTrailer::from_dict(trailer.clone())?;
            }
        }
        self.xref = xref;
        self.object_stream_cache.clear();
        self.recovered = true;
        Ok(())
    }

    /// Get the PDF version
    pub fn version(&self) -> PdfVersion {
        self.header.version
    }

    /// Get the trailer
    pub fn trailer(&self) -> &PdfTrailer {
        &self.trailer
    }

    /// Get the cross-reference table in use
    pub fn xref(&self) -> &XRefTable {
        &self.xref
    }

    /// Get parsing options
    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Whether the xref was rebuilt by scanning
    pub fn was_recovered(&self) -> bool {
        self.recovered
    }

    /// Load every live object named by the cross-reference table.
    ///
    /// Cross-reference and object streams are structural and left out.
    pub fn load_all(&mut self) -> ParseResult<BTreeMap<ObjectRef, PdfObject>> {
        let mut objects = BTreeMap::new();
        let entries: Vec<(u32, XRefEntry)> = self.xref.in_use().collect();

        for (number, entry) in entries {
            match self.get_object(number) {
                Ok((reference, object)) => {
                    let structural = matches!(
                        &object,
                        PdfObject::Stream(s) if matches!(s.dict.get_type(), Some("XRef" | "ObjStm"))
                    );
                    if !structural {
                        objects.insert(reference, object);
                    }
                }
                Err(e) if self.options.recover_xref => {
                    tracing::warn!("Skipping unreadable object {} ({:?}): {}", number, entry, e);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(objects)
    }

    /// Load a single object by number
    pub fn get_object(&mut self, number: u32) -> ParseResult<(ObjectRef, PdfObject)> {
        match self.xref.get_entry(number).copied() {
            Some(XRefEntry::InUse { offset, generation }) => {
                let object = self.load_object_at(number, generation, offset)?;
                Ok((ObjectRef::new(number, generation), object))
            }
            Some(XRefEntry::Compressed {
                stream_number,
                index,
            }) => {
                let object = self.get_compressed_object(number, stream_number, index)?;
                Ok((ObjectRef::new(number, 0), object))
            }
            Some(XRefEntry::Free { generation, .. }) => {
                Err(ParseError::DanglingReference(ObjectRef::new(number, generation)))
            }
            None => Err(ParseError::DanglingReference(ObjectRef::new(number, 0))),
        }
    }

    fn load_object_at(&self, number: u32, generation: u16, offset: u64) -> ParseResult<PdfObject> {
        let object = ObjectRef::new(number, generation);
        let position = usize::try_from(offset)
            .ok()
            .filter(|p| *p < self.data.len())
            .ok_or(ParseError::OffsetOutOfBounds {
                object,
                offset,
                len: self.data.len(),
            })?;

        let resolver = |r: ObjectRef| self.resolve_length(r);
        let ctx = ParseContext::with_max_depth(self.options.max_object_depth)
            .with_length_resolver(&resolver);

        let mut lexer = Lexer::at(self.data, position);
        let (found, value) = PdfObject::parse_indirect(&mut lexer, &ctx)?;
        if found.number != number {
            return Err(ParseError::SyntaxError {
                position,
                message: format!("Expected object {object}, found {found}"),
            });
        }
        Ok(value)
    }

    /// Resolve an indirect `/Length` without recursing into other streams
    fn resolve_length(&self, reference: ObjectRef) -> Option<usize> {
        let Some(XRefEntry::InUse { offset, .. }) = self.xref.get_entry(reference.number) else {
            return None;
        };
        let position = usize::try_from(*offset).ok()?;
        if position >= self.data.len() {
            return None;
        }
        let mut lexer = Lexer::at(self.data, position);
        let (_, value) = PdfObject::parse_indirect(&mut lexer, &ParseContext::default()).ok()?;
        value.as_integer().and_then(|n| usize::try_from(n).ok())
    }

    fn get_compressed_object(
        &mut self,
        number: u32,
        stream_number: u32,
        index: u32,
    ) -> ParseResult<PdfObject> {
        if !self.object_stream_cache.contains_key(&stream_number) {
            let object_stream = match self.xref.get_entry(stream_number).copied() {
                Some(XRefEntry::InUse { offset, generation }) => {
                    match self.load_object_at(stream_number, generation, offset)? {
                        PdfObject::Stream(stream) => {
                            ObjectStream::parse(&stream, self.options.max_object_depth)?
                        }
                        other => {
                            return Err(ParseError::SyntaxError {
                                position: offset as usize,
                                message: format!(
                                    "Object stream {stream_number} is a {}",
                                    other.type_name()
                                ),
                            })
                        }
                    }
                }
                // Object streams may not themselves be compressed
                _ => {
                    return Err(ParseError::DanglingReference(ObjectRef::new(
                        stream_number,
                        0,
                    )))
                }
            };
            self.object_stream_cache.insert(stream_number, object_stream);
        }

        self.object_stream_cache
            .get(&stream_number)
            .and_then(|stream| stream.object_at(index as usize, number))
            .cloned()
            .ok_or(ParseError::DanglingReference(ObjectRef::new(number, 0)))
    }

    /// Walk everything reachable from `/Root` and fail on the first
    /// reference that does not resolve
    fn check_references(&self, objects: &BTreeMap<ObjectRef, PdfObject>) -> ParseResult<()> {
        let root = self.trailer.root()?;
        let mut visited = HashSet::new();
        let mut pending = vec![root];

        while let Some(reference) = pending.pop() {
            if !visited.insert(reference) {
                continue;
            }
            let object = objects
                .get(&reference)
                .ok_or(ParseError::DanglingReference(reference))?;
            collect_references(object, &mut pending);
        }

        Ok(())
    }

    /// A broken `/Info` is metadata, not structure: drop it
    fn drop_dangling_info(&mut self, objects: &BTreeMap<ObjectRef, PdfObject>) {
        if let Some(info) = self.trailer.info() {
            if !objects.contains_key(&info) {
                tracing::warn!("Trailer /Info {} does not resolve; dropping it", info);
                self.trailer.dict.remove("Info");
            }
        }
    }
}

/// Push every reference contained in `object` onto `out`
pub(crate) fn collect_references(object: &PdfObject, out: &mut Vec<ObjectRef>) {
    match object {
        PdfObject::Reference(r) => out.push(*r),
        PdfObject::Array(array) => {
            for item in array.iter() {
                collect_references(item, out);
            }
        }
        PdfObject::Dictionary(dict) => {
            for (_, value) in dict.iter() {
                collect_references(value, out);
            }
        }
        PdfObject::Stream(stream) => {
            for (_, value) in stream.dict.iter() {
                collect_references(value, out);
            }
        }
        _ => {}
    }
}
