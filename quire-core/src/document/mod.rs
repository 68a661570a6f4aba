//! In-memory PDF document
//!
//! A [`Document`] owns its object table outright. Documents never share
//! objects: moving pages between documents goes through
//! [`ObjectImporter`](crate::operations::import::ObjectImporter), which
//! deep-copies under fresh object numbers.

pub mod page_tree;

pub use page_tree::{PageNode, PageTree};

use crate::error::{PdfError, Result};
use crate::parser::objects::{ObjectRef, PdfArray, PdfDictionary, PdfObject};
use crate::parser::{ParseOptions, PdfReader, PdfTrailer, PdfVersion};
use crate::writer::{PdfWriter, WriterOptions};
use std::collections::BTreeMap;
use std::io::BufWriter;
use std::path::Path;

/// Longest chain of references followed by [`Document::dereference`]
const MAX_REFERENCE_CHAIN: usize = 32;

/// A PDF document: header version, trailer and object table.
///
/// # Example
///
/// ```rust
/// use quire::Document;
/// use quire::parser::PdfDictionary;
///
/// let mut doc = Document::new();
/// doc.add_page(PdfDictionary::new()).unwrap();
/// assert_eq!(doc.page_count(), 1);
///
/// let bytes = doc.to_bytes().unwrap();
/// let reparsed = Document::from_bytes(&bytes).unwrap();
/// assert_eq!(reparsed.page_count(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct Document {
    version: PdfVersion,
    trailer: PdfTrailer,
    objects: BTreeMap<ObjectRef, PdfObject>,
    recovered: bool,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document: a catalog and a `Pages` node with no kids
    pub fn new() -> Self {
        let catalog_ref = ObjectRef::new(1, 0);
        let pages_ref = ObjectRef::new(2, 0);

        let mut pages = PdfDictionary::new();
        pages.insert("Type", PdfObject::name("Pages"));
        pages.insert("Kids", PdfArray::new());
        pages.insert("Count", 0i64);

        let mut catalog = PdfDictionary::new();
        catalog.insert("Type", PdfObject::name("Catalog"));
        catalog.insert("Pages", pages_ref);

        let mut objects = BTreeMap::new();
        objects.insert(catalog_ref, PdfObject::Dictionary(catalog));
        objects.insert(pages_ref, PdfObject::Dictionary(pages));

        Self {
            version: PdfVersion::default(),
            trailer: PdfTrailer::for_root(catalog_ref, 3),
            objects,
            recovered: false,
        }
    }

    /// A document with no objects at all, to be filled by an importer
    pub(crate) fn bare(version: PdfVersion) -> Self {
        Self {
            version,
            trailer: PdfTrailer {
                dict: PdfDictionary::new(),
            },
            objects: BTreeMap::new(),
            recovered: false,
        }
    }

    /// Parse a document with the default (lenient) options
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::from_bytes_with_options(data, ParseOptions::default())
    }

    /// Parse a document
    pub fn from_bytes_with_options(data: &[u8], options: ParseOptions) -> Result<Self> {
        let parsed = PdfReader::parse_with_options(data, options)?;
        Ok(Self {
            version: parsed.version,
            trailer: parsed.trailer,
            objects: parsed.objects,
            recovered: parsed.recovered,
        })
    }

    /// Read and parse a file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_bytes(&data)
    }

    pub fn version(&self) -> PdfVersion {
        self.version
    }

    pub fn set_version(&mut self, version: PdfVersion) {
        self.version = version;
    }

    pub fn trailer(&self) -> &PdfTrailer {
        &self.trailer
    }

    pub(crate) fn set_trailer(&mut self, trailer: PdfTrailer) {
        self.trailer = trailer;
    }

    /// Whether parsing had to rebuild the cross-reference table
    pub fn was_recovered(&self) -> bool {
        self.recovered
    }

    /// All objects, in ascending object number
    pub fn objects(&self) -> &BTreeMap<ObjectRef, PdfObject> {
        &self.objects
    }

    pub fn get(&self, reference: ObjectRef) -> Option<&PdfObject> {
        self.objects.get(&reference)
    }

    pub fn get_mut(&mut self, reference: ObjectRef) -> Option<&mut PdfObject> {
        self.objects.get_mut(&reference)
    }

    /// Look up an object, failing when it does not exist
    pub fn resolve(&self, reference: ObjectRef) -> Result<&PdfObject> {
        self.objects
            .get(&reference)
            .ok_or(PdfError::DanglingReference(reference))
    }

    /// Follow `object` through any chain of references to a direct value
    pub fn dereference<'a>(&'a self, object: &'a PdfObject) -> Result<&'a PdfObject> {
        let mut current = object;
        for _ in 0..MAX_REFERENCE_CHAIN {
            match current {
                PdfObject::Reference(reference) => current = self.resolve(*reference)?,
                direct => return Ok(direct),
            }
        }
        Err(PdfError::MalformedDocument(format!(
            "reference chain longer than {MAX_REFERENCE_CHAIN} starting at {object:?}"
        )))
    }

    /// Highest object number in use, 0 for an empty table
    pub fn max_object_number(&self) -> u32 {
        self.objects
            .keys()
            .next_back()
            .map_or(0, |reference| reference.number)
    }

    /// Store `object` under the next free object number
    pub fn add_object(&mut self, object: impl Into<PdfObject>) -> ObjectRef {
        let reference = ObjectRef::new(self.max_object_number() + 1, 0);
        self.objects.insert(reference, object.into());
        reference
    }

    /// Allocate an object number now and fill it in later with
    /// [`set_object`](Self::set_object)
    pub fn reserve(&mut self) -> ObjectRef {
        self.add_object(PdfObject::Null)
    }

    /// Insert or replace the object at `reference`
    pub fn set_object(&mut self, reference: ObjectRef, object: impl Into<PdfObject>) {
        self.objects.insert(reference, object.into());
    }

    pub fn root_ref(&self) -> Result<ObjectRef> {
        Ok(self.trailer.root()?)
    }

    /// The document catalog
    pub fn catalog(&self) -> Result<&PdfDictionary> {
        let root = self.root_ref()?;
        self.resolve(root)?
            .as_dict()
            .ok_or_else(|| PdfError::MalformedDocument(format!("catalog {root} is not a dictionary")))
    }

    /// Root node of the page tree
    pub fn pages_root_ref(&self) -> Result<ObjectRef> {
        self.catalog()?
            .get("Pages")
            .and_then(PdfObject::as_reference)
            .ok_or_else(|| PdfError::MalformedDocument("catalog has no /Pages reference".to_string()))
    }

    /// Document information dictionary, if any
    pub fn info(&self) -> Option<&PdfDictionary> {
        self.trailer
            .info()
            .and_then(|info| self.objects.get(&info))
            .and_then(PdfObject::as_dict)
    }

    /// Replace the information dictionary
    pub fn set_info(&mut self, info: PdfDictionary) -> ObjectRef {
        let info_ref = self.add_object(info);
        self.trailer.dict.insert("Info", info_ref);
        info_ref
    }

    /// Set an entry of the information dictionary, creating it when absent
    pub fn set_info_entry(&mut self, key: &str, value: impl Into<PdfObject>) {
        let info_ref = match self.trailer.info() {
            Some(info) if self.info().is_some() => info,
            _ => self.set_info(PdfDictionary::new()),
        };
        if let Some(dict) = self.objects.get_mut(&info_ref).and_then(PdfObject::as_dict_mut) {
            dict.insert(key, value);
        }
    }

    /// Walk the page tree
    pub fn page_tree(&self) -> Result<PageTree> {
        page_tree::walk(self, self.pages_root_ref()?)
    }

    /// All pages in document order
    pub fn pages(&self) -> Result<Vec<PageNode>> {
        Ok(self.page_tree()?.pages)
    }

    /// Number of pages; 0 when the page tree is missing or malformed
    pub fn page_count(&self) -> usize {
        match self.page_tree() {
            Ok(tree) => tree.pages.len(),
            Err(e) => {
                tracing::warn!("Cannot count pages ({}); reporting 0", e);
                0
            }
        }
    }

    /// The page at 1-based `index`
    pub fn page_at(&self, index: usize) -> Result<PageNode> {
        let mut pages = self.pages()?;
        let count = pages.len();
        if index == 0 || index > count {
            return Err(PdfError::PageIndexOutOfRange { index, count });
        }
        Ok(pages.swap_remove(index - 1))
    }

    /// Append an existing page object to the root `Pages` node.
    ///
    /// The page's `/Parent` is pointed at the root node.
    pub fn push_page(&mut self, page: ObjectRef) -> Result<()> {
        let root = self.pages_root_ref()?;

        let page_dict = self
            .objects
            .get_mut(&page)
            .ok_or(PdfError::DanglingReference(page))?
            .as_dict_mut()
            .ok_or_else(|| PdfError::MalformedDocument(format!("page {page} is not a dictionary")))?;
        page_dict.insert("Parent", root);

        let pages = self
            .objects
            .get_mut(&root)
            .ok_or(PdfError::DanglingReference(root))?
            .as_dict_mut()
            .ok_or_else(|| PdfError::MalformedDocument(format!("pages node {root} is not a dictionary")))?;

        match pages.get_mut("Kids").and_then(PdfObject::as_array_mut) {
            Some(kids) => kids.push(page),
            None => pages.insert("Kids", PdfArray(vec![page.into()])),
        }
        let count = pages.get("Count").and_then(PdfObject::as_integer).unwrap_or(0);
        pages.insert("Count", count + 1);
        Ok(())
    }

    /// Store `page` as a new page object and append it to the page tree
    pub fn add_page(&mut self, mut page: PdfDictionary) -> Result<ObjectRef> {
        page.insert("Type", PdfObject::name("Page"));
        let reference = self.add_object(page);
        self.push_page(reference)?;
        Ok(reference)
    }

    /// Serialize with the default writer options
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.to_bytes_with(&WriterOptions::default())
    }

    pub fn to_bytes_with(&self, options: &WriterOptions) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        PdfWriter::with_options(&mut buffer, options.clone()).write_document(self)?;
        Ok(buffer)
    }

    /// Write the document to a file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.save_with(path, &WriterOptions::default())
    }

    pub fn save_with(&self, path: impl AsRef<Path>, options: &WriterOptions) -> Result<()> {
        let file = std::fs::File::create(path)?;
        PdfWriter::with_options(BufWriter::new(file), options.clone()).write_document(self)
    }
}
