//! PDF Trailer Parser
//!
//! Parses PDF trailer according to ISO 32000-1 Section 7.5.5

use super::objects::{ObjectRef, PdfDictionary, PdfObject};
use super::{ParseError, ParseResult};

/// PDF Trailer information
#[derive(Debug, Clone, PartialEq)]
pub struct PdfTrailer {
    /// The trailer dictionary
    pub dict: PdfDictionary,
}

impl PdfTrailer {
    /// Wrap a trailer dictionary, checking the entries every document needs
    pub fn from_dict(dict: PdfDictionary) -> ParseResult<Self> {
        let trailer = PdfTrailer { dict };
        trailer.validate()?;
        Ok(trailer)
    }

    /// Build the minimal trailer for a document rooted at `root`
    pub fn for_root(root: ObjectRef, size: u32) -> Self {
        let mut dict = PdfDictionary::new();
        dict.insert("Size", i64::from(size));
        dict.insert("Root", root);
        PdfTrailer { dict }
    }

    /// Get the size (number of entries in xref table)
    pub fn size(&self) -> Option<u32> {
        self.dict
            .get("Size")
            .and_then(|obj| obj.as_integer())
            .and_then(|i| u32::try_from(i).ok())
    }

    /// Get the root object reference (document catalog)
    pub fn root(&self) -> ParseResult<ObjectRef> {
        self.dict
            .get("Root")
            .and_then(|obj| obj.as_reference())
            .ok_or_else(|| ParseError::MissingKey("Root".to_string()))
    }

    /// Get the info object reference (document information dictionary)
    pub fn info(&self) -> Option<ObjectRef> {
        self.dict.get("Info").and_then(|obj| obj.as_reference())
    }

    /// Get the ID array (file identifiers)
    pub fn id(&self) -> Option<&PdfObject> {
        self.dict.get("ID")
    }

    /// Check if this PDF is encrypted
    pub fn is_encrypted(&self) -> bool {
        self.dict.contains_key("Encrypt")
    }

    /// Validate the trailer dictionary
    pub fn validate(&self) -> ParseResult<()> {
        self.root()?;
        if self.is_encrypted() {
            return Err(ParseError::EncryptionNotSupported);
        }
        Ok(())
    }

    /// Get access to the trailer dictionary
    pub fn dict(&self) -> &PdfDictionary {
        &self.dict
    }
}
