//! PDF Object Stream Parser
//!
//! Handles compressed objects stored in object streams (PDF 1.5+,
//! ISO 32000-1 Section 7.5.7)

use super::lexer::{Lexer, Token};
use super::objects::{ParseContext, PdfObject, PdfStream};
use super::{ParseError, ParseResult};

/// Represents a PDF object stream containing compressed objects
#[derive(Debug)]
pub struct ObjectStream {
    /// Object number and value, in stream order
    objects: Vec<(u32, PdfObject)>,
}

impl ObjectStream {
    /// Parse an object stream, eagerly reading every object it holds
    pub fn parse(stream: &PdfStream, max_depth: usize) -> ParseResult<Self> {
        let dict = &stream.dict;

        let n = dict
            .get("N")
            .and_then(|obj| obj.as_integer())
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| ParseError::MissingKey("N".to_string()))?;

        let first = dict
            .get("First")
            .and_then(|obj| obj.as_integer())
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| ParseError::MissingKey("First".to_string()))?;

        let data = stream.decode()?;
        let mut lexer = Lexer::new(&data);

        // Read object number/offset pairs
        let mut offsets = Vec::with_capacity(n.min(4096));
        for _ in 0..n {
            let obj_num = match lexer.next_significant_token()? {
                Token::Integer(v) => u32::try_from(v).ok(),
                _ => None,
            };
            let offset = match lexer.next_significant_token()? {
                Token::Integer(v) => usize::try_from(v).ok(),
                _ => None,
            };
            match obj_num.zip(offset) {
                Some(pair) => offsets.push(pair),
                None => {
                    return Err(ParseError::SyntaxError {
                        position: lexer.position(),
                        message: "Expected object number and offset in object stream".to_string(),
                    })
                }
            }
        }

        let ctx = ParseContext::with_max_depth(max_depth);
        let mut objects = Vec::with_capacity(offsets.len());
        for (obj_num, offset) in offsets {
            let position = first.saturating_add(offset);
            if position >= data.len() {
                return Err(ParseError::SyntaxError {
                    position,
                    message: format!("Object {obj_num} lies outside its object stream"),
                });
            }
            let mut obj_lexer = Lexer::at(&data, position);
            let obj = PdfObject::parse(&mut obj_lexer, &ctx)?;
            objects.push((obj_num, obj));
        }

        Ok(ObjectStream { objects })
    }

    /// Get an object by its object number
    pub fn get_object(&self, obj_num: u32) -> Option<&PdfObject> {
        self.objects
            .iter()
            .find(|(number, _)| *number == obj_num)
            .map(|(_, obj)| obj)
    }

    /// Get the object stored at `index`, checking it carries `obj_num`
    pub fn object_at(&self, index: usize, obj_num: u32) -> Option<&PdfObject> {
        match self.objects.get(index) {
            Some((number, obj)) if *number == obj_num => Some(obj),
            // Index disagrees with the header; fall back to a lookup by number
            _ => self.get_object(obj_num),
        }
    }

    /// Get all objects in stream order
    pub fn objects(&self) -> &[(u32, PdfObject)] {
        &self.objects
    }

    pub fn into_objects(self) -> Vec<(u32, PdfObject)> {
        self.objects
    }
}
