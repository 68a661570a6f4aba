//! PDF Object Parser
//!
//! Parses PDF objects from tokens according to ISO 32000-1 Section 7.3

use super::lexer::{Lexer, Token};
use super::{ParseError, ParseResult};
use indexmap::IndexMap;
use std::borrow::Borrow;
use std::fmt;

/// Identifier of an indirect object: object number plus generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef {
    pub number: u32,
    pub generation: u16,
}

impl ObjectRef {
    pub fn new(number: u32, generation: u16) -> Self {
        Self { number, generation }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.number, self.generation)
    }
}

/// PDF Name object
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PdfName(pub String);

/// PDF String object
#[derive(Debug, Clone, PartialEq)]
pub struct PdfString(pub Vec<u8>);

/// PDF Array object
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PdfArray(pub Vec<PdfObject>);

/// PDF Dictionary object; keys keep their insertion order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PdfDictionary(pub IndexMap<PdfName, PdfObject>);

/// PDF Stream object
#[derive(Debug, Clone, PartialEq)]
pub struct PdfStream {
    pub dict: PdfDictionary,
    pub data: Vec<u8>,
}

impl PdfStream {
    pub fn new(dict: PdfDictionary, data: Vec<u8>) -> Self {
        Self { dict, data }
    }

    /// Get the decompressed stream data
    pub fn decode(&self) -> ParseResult<Vec<u8>> {
        super::filters::decode_stream(&self.data, &self.dict)
    }

    /// Get the raw (possibly compressed) stream data
    pub fn raw_data(&self) -> &[u8] {
        &self.data
    }
}

/// PDF Object types
#[derive(Debug, Clone, PartialEq)]
pub enum PdfObject {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    String(PdfString),
    Name(PdfName),
    Array(PdfArray),
    Dictionary(PdfDictionary),
    Stream(PdfStream),
    Reference(ObjectRef),
}

/// Resolves an indirect `/Length` to its integer value
pub type LengthResolver<'r> = &'r dyn Fn(ObjectRef) -> Option<usize>;

/// Per-parse settings threaded through the recursive descent
#[derive(Clone, Copy)]
pub struct ParseContext<'r> {
    pub max_depth: usize,
    pub length_resolver: Option<LengthResolver<'r>>,
}

impl Default for ParseContext<'_> {
    fn default() -> Self {
        Self {
            max_depth: 256,
            length_resolver: None,
        }
    }
}

impl<'r> ParseContext<'r> {
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            max_depth,
            length_resolver: None,
        }
    }

    pub fn with_length_resolver(mut self, resolver: LengthResolver<'r>) -> Self {
        self.length_resolver = Some(resolver);
        self
    }
}

impl PdfObject {
    /// Parse a PDF object from a lexer
    pub fn parse(lexer: &mut Lexer<'_>, ctx: &ParseContext<'_>) -> ParseResult<Self> {
        let token = lexer.next_significant_token()?;
        Self::parse_from_token(lexer, token, ctx, 0)
    }

    /// Parse an indirect object definition `N G obj ... endobj`.
    ///
    /// A missing `endobj` is tolerated; the value ends where the next token
    /// cannot continue it.
    pub fn parse_indirect(
        lexer: &mut Lexer<'_>,
        ctx: &ParseContext<'_>,
    ) -> ParseResult<(ObjectRef, Self)> {
        let number = match lexer.next_significant_token()? {
            Token::Integer(n) if (0..=i64::from(u32::MAX)).contains(&n) => n as u32,
            other => {
                return Err(ParseError::UnexpectedToken {
                    expected: "object number".to_string(),
                    found: format!("{other:?}"),
                })
            }
        };
        let generation = match lexer.next_significant_token()? {
            Token::Integer(g) if (0..=i64::from(u16::MAX)).contains(&g) => g as u16,
            other => {
                return Err(ParseError::UnexpectedToken {
                    expected: "generation number".to_string(),
                    found: format!("{other:?}"),
                })
            }
        };
        lexer.expect_keyword("obj")?;

        let object = Self::parse(lexer, ctx)?;

        match lexer.next_significant_token()? {
            Token::EndObj => {}
            other => lexer.push_token(other),
        }

        Ok((ObjectRef::new(number, generation), object))
    }

    /// Parse a PDF object starting from a specific token
    fn parse_from_token(
        lexer: &mut Lexer<'_>,
        token: Token,
        ctx: &ParseContext<'_>,
        depth: usize,
    ) -> ParseResult<Self> {
        match token {
            Token::Null => Ok(PdfObject::Null),
            Token::Boolean(b) => Ok(PdfObject::Boolean(b)),
            Token::Integer(i) => Self::parse_integer_or_reference(lexer, i),
            Token::Real(r) => Ok(PdfObject::Real(r)),
            Token::String(s) => Ok(PdfObject::String(PdfString(s))),
            Token::Name(n) => Ok(PdfObject::Name(PdfName(n))),
            Token::ArrayStart => Self::parse_array(lexer, ctx, depth + 1),
            Token::DictStart => Self::parse_dictionary_or_stream(lexer, ctx, depth + 1),
            Token::Comment(_) => {
                let next = lexer.next_significant_token()?;
                Self::parse_from_token(lexer, next, ctx, depth)
            }
            Token::Eof => Err(ParseError::SyntaxError {
                position: lexer.position(),
                message: "Unexpected end of file".to_string(),
            }),
            _ => Err(ParseError::UnexpectedToken {
                expected: "PDF object".to_string(),
                found: format!("{token:?}"),
            }),
        }
    }

    /// An integer followed by `G R` is an indirect reference
    fn parse_integer_or_reference(lexer: &mut Lexer<'_>, value: i64) -> ParseResult<Self> {
        let second = lexer.next_token()?;
        if let Token::Integer(generation) = second {
            let third = lexer.next_token()?;
            if third == Token::Ref {
                return match (u32::try_from(value), u16::try_from(generation)) {
                    (Ok(number), Ok(generation)) => {
                        Ok(PdfObject::Reference(ObjectRef::new(number, generation)))
                    }
                    _ => Err(ParseError::SyntaxError {
                        position: lexer.position(),
                        message: format!("Invalid reference {value} {generation} R"),
                    }),
                };
            }
            lexer.push_token(third);
        }
        lexer.push_token(second);
        Ok(PdfObject::Integer(value))
    }

    fn check_depth(lexer: &Lexer<'_>, ctx: &ParseContext<'_>, depth: usize) -> ParseResult<()> {
        if depth > ctx.max_depth {
            tracing::debug!(
                "Nesting limit {} exceeded at byte {}",
                ctx.max_depth,
                lexer.position()
            );
            return Err(ParseError::NestingTooDeep(ctx.max_depth));
        }
        Ok(())
    }

    /// Parse a PDF array
    fn parse_array(
        lexer: &mut Lexer<'_>,
        ctx: &ParseContext<'_>,
        depth: usize,
    ) -> ParseResult<Self> {
        Self::check_depth(lexer, ctx, depth)?;
        let mut elements = Vec::new();

        loop {
            let token = lexer.next_significant_token()?;
            match token {
                Token::ArrayEnd => break,
                _ => {
                    let obj = Self::parse_from_token(lexer, token, ctx, depth)?;
                    elements.push(obj);
                }
            }
        }

        Ok(PdfObject::Array(PdfArray(elements)))
    }

    /// Parse a PDF dictionary and check if it's followed by a stream
    fn parse_dictionary_or_stream(
        lexer: &mut Lexer<'_>,
        ctx: &ParseContext<'_>,
        depth: usize,
    ) -> ParseResult<Self> {
        Self::check_depth(lexer, ctx, depth)?;
        let dict = Self::parse_dictionary_inner(lexer, ctx, depth)?;

        match lexer.next_significant_token()? {
            Token::Stream => {
                let data = Self::parse_stream_data(lexer, &dict, ctx)?;
                Ok(PdfObject::Stream(PdfStream { dict, data }))
            }
            token => {
                // Not a stream, just a dictionary
                lexer.push_token(token);
                Ok(PdfObject::Dictionary(dict))
            }
        }
    }

    /// Parse the inner dictionary
    fn parse_dictionary_inner(
        lexer: &mut Lexer<'_>,
        ctx: &ParseContext<'_>,
        depth: usize,
    ) -> ParseResult<PdfDictionary> {
        let mut dict = IndexMap::new();

        loop {
            let token = lexer.next_significant_token()?;
            match token {
                Token::DictEnd => break,
                Token::Name(key) => {
                    let value_token = lexer.next_significant_token()?;
                    if value_token == Token::DictEnd {
                        // Key without a value at the end of the dictionary
                        dict.insert(PdfName(key), PdfObject::Null);
                        break;
                    }
                    let value = Self::parse_from_token(lexer, value_token, ctx, depth)?;
                    dict.insert(PdfName(key), value);
                }
                _ => {
                    return Err(ParseError::UnexpectedToken {
                        expected: "dictionary key (name) or >>".to_string(),
                        found: format!("{token:?}"),
                    });
                }
            }
        }

        Ok(PdfDictionary(dict))
    }

    /// Parse stream data.
    ///
    /// The declared `/Length` is trusted only when it lands on `endstream`;
    /// otherwise the payload runs up to the next `endstream` keyword.
    fn parse_stream_data(
        lexer: &mut Lexer<'_>,
        dict: &PdfDictionary,
        ctx: &ParseContext<'_>,
    ) -> ParseResult<Vec<u8>> {
        lexer.skip_stream_eol();
        let start = lexer.position();
        let data = lexer.data();

        let declared = match dict.get("Length") {
            Some(PdfObject::Integer(len)) => usize::try_from(*len).ok(),
            Some(PdfObject::Reference(r)) => ctx.length_resolver.and_then(|resolve| resolve(*r)),
            _ => None,
        };

        if let Some(length) = declared {
            if let Some(end) = start.checked_add(length).filter(|end| *end <= data.len()) {
                let mut probe = Lexer::at(data, end);
                probe.skip_whitespace();
                if probe.starts_with(b"endstream") {
                    let payload = data[start..end].to_vec();
                    lexer.set_position(probe.position());
                    lexer.expect_keyword("endstream")?;
                    return Ok(payload);
                }
            }
            tracing::debug!(
                "Stream /Length {} at byte {} does not reach endstream, scanning",
                length,
                start
            );
        }

        let end = lexer
            .find_sequence(b"endstream")
            .ok_or_else(|| ParseError::SyntaxError {
                position: start,
                message: "Stream without endstream".to_string(),
            })?;

        // The EOL before endstream belongs to the syntax, not the payload
        let mut payload_end = end;
        if payload_end > start && data[payload_end - 1] == b'\n' {
            payload_end -= 1;
        }
        if payload_end > start && data[payload_end - 1] == b'\r' {
            payload_end -= 1;
        }

        let payload = data[start..payload_end].to_vec();
        lexer.set_position(end);
        lexer.expect_keyword("endstream")?;
        Ok(payload)
    }

    /// Check if this object is null
    pub fn is_null(&self) -> bool {
        matches!(self, PdfObject::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PdfObject::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            PdfObject::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Get the object as a real number; integers are widened
    pub fn as_real(&self) -> Option<f64> {
        match self {
            PdfObject::Real(r) => Some(*r),
            PdfObject::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&PdfString> {
        match self {
            PdfObject::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&PdfName> {
        match self {
            PdfObject::Name(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&PdfArray> {
        match self {
            PdfObject::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut PdfArray> {
        match self {
            PdfObject::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Get the object as a dictionary; a stream yields its dictionary
    pub fn as_dict(&self) -> Option<&PdfDictionary> {
        match self {
            PdfObject::Dictionary(d) => Some(d),
            PdfObject::Stream(s) => Some(&s.dict),
            _ => None,
        }
    }

    pub fn as_dict_mut(&mut self) -> Option<&mut PdfDictionary> {
        match self {
            PdfObject::Dictionary(d) => Some(d),
            PdfObject::Stream(s) => Some(&mut s.dict),
            _ => None,
        }
    }

    pub fn as_stream(&self) -> Option<&PdfStream> {
        match self {
            PdfObject::Stream(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<ObjectRef> {
        match self {
            PdfObject::Reference(r) => Some(*r),
            _ => None,
        }
    }

    /// Short name of the object kind, for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            PdfObject::Null => "null",
            PdfObject::Boolean(_) => "boolean",
            PdfObject::Integer(_) => "integer",
            PdfObject::Real(_) => "real",
            PdfObject::String(_) => "string",
            PdfObject::Name(_) => "name",
            PdfObject::Array(_) => "array",
            PdfObject::Dictionary(_) => "dictionary",
            PdfObject::Stream(_) => "stream",
            PdfObject::Reference(_) => "reference",
        }
    }

    /// Build a name object
    pub fn name(name: &str) -> Self {
        PdfObject::Name(PdfName::new(name))
    }
}

impl From<bool> for PdfObject {
    fn from(value: bool) -> Self {
        PdfObject::Boolean(value)
    }
}

impl From<i64> for PdfObject {
    fn from(value: i64) -> Self {
        PdfObject::Integer(value)
    }
}

impl From<f64> for PdfObject {
    fn from(value: f64) -> Self {
        PdfObject::Real(value)
    }
}

impl From<ObjectRef> for PdfObject {
    fn from(value: ObjectRef) -> Self {
        PdfObject::Reference(value)
    }
}

impl From<PdfArray> for PdfObject {
    fn from(value: PdfArray) -> Self {
        PdfObject::Array(value)
    }
}

impl From<PdfDictionary> for PdfObject {
    fn from(value: PdfDictionary) -> Self {
        PdfObject::Dictionary(value)
    }
}

impl From<PdfStream> for PdfObject {
    fn from(value: PdfStream) -> Self {
        PdfObject::Stream(value)
    }
}

impl From<PdfString> for PdfObject {
    fn from(value: PdfString) -> Self {
        PdfObject::String(value)
    }
}

impl PdfDictionary {
    /// Create a new empty dictionary
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    /// Get a value by key
    pub fn get(&self, key: &str) -> Option<&PdfObject> {
        self.0.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut PdfObject> {
        self.0.get_mut(key)
    }

    /// Insert or replace a key, keeping the position of an existing key
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<PdfObject>) {
        self.0.insert(PdfName(key.into()), value.into());
    }

    /// Remove a key, preserving the order of the remaining entries
    pub fn remove(&mut self, key: &str) -> Option<PdfObject> {
        self.0.shift_remove(key)
    }

    /// Check if dictionary contains a key
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Get the dictionary type (value of /Type key)
    pub fn get_type(&self) -> Option<&str> {
        self.get("Type")
            .and_then(|obj| obj.as_name())
            .map(|n| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PdfName, &PdfObject)> {
        self.0.iter()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut PdfObject> {
        self.0.values_mut()
    }
}

impl PdfArray {
    /// Create a new empty array
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PdfObject> {
        self.0.get(index)
    }

    pub fn push(&mut self, obj: impl Into<PdfObject>) {
        self.0.push(obj.into());
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PdfObject> {
        self.0.iter()
    }
}

impl From<Vec<PdfObject>> for PdfArray {
    fn from(value: Vec<PdfObject>) -> Self {
        Self(value)
    }
}

impl From<&str> for PdfString {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }
}

impl PdfString {
    /// Create a new PDF string
    pub fn new(data: Vec<u8>) -> Self {
        Self(data)
    }

    /// Get as UTF-8 string if possible
    pub fn as_str(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.0)
    }

    /// Get as bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl PdfName {
    /// Create a new PDF name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the name as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for PdfName {
    fn borrow(&self) -> &str {
        &self.0
    }
}
