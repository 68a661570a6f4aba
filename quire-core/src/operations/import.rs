//! Deep copy of object subgraphs between documents
//!
//! Every object reached from an imported value is copied into the
//! destination under a freshly allocated number, and references are rewritten
//! to the new numbers. One importer keeps one mapping, so an object reached
//! twice (a font shared by several pages, say) is copied once.

use crate::document::{Document, PageNode};
use crate::error::{PdfError, Result};
use crate::parser::objects::{ObjectRef, PdfArray, PdfDictionary, PdfObject, PdfStream};
use std::collections::{HashMap, HashSet};

/// Renumbering deep copier from one source document into one destination
#[derive(Debug, Default)]
pub struct ObjectImporter {
    /// Source reference to destination reference
    mapping: HashMap<ObjectRef, ObjectRef>,
    /// Source objects that must not be copied unless already mapped;
    /// references to them become `null`
    barrier: HashSet<ObjectRef>,
    /// Mapped objects whose content is not copied yet
    pending: Vec<(ObjectRef, ObjectRef)>,
}

impl ObjectImporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop the copy at these source objects.
    ///
    /// Page imports put the whole source page tree here so that links from
    /// annotations or `/Parent` entries never drag in unselected pages.
    pub fn with_barrier(mut self, barrier: HashSet<ObjectRef>) -> Self {
        self.barrier = barrier;
        self
    }

    /// Source to destination mapping built so far
    pub fn mapping(&self) -> &HashMap<ObjectRef, ObjectRef> {
        &self.mapping
    }

    /// Allocate the destination number for `source` without copying it yet.
    ///
    /// Reserving a barrier object lets other copied objects link to it.
    pub fn reserve(&mut self, source: ObjectRef, dest: &mut Document) -> ObjectRef {
        if let Some(&mapped) = self.mapping.get(&source) {
            return mapped;
        }
        let target = dest.reserve();
        self.mapping.insert(source, target);
        target
    }

    /// Copy the indirect object `reference` and everything it reaches
    pub fn import_object(
        &mut self,
        source: &Document,
        reference: ObjectRef,
        dest: &mut Document,
    ) -> Result<ObjectRef> {
        if let Some(&mapped) = self.mapping.get(&reference) {
            return Ok(mapped);
        }
        // Fail before allocating anything for a missing object
        source.resolve(reference)?;
        let target = self.reserve(reference, dest);
        self.pending.push((reference, target));
        self.drain(source, dest)?;
        Ok(target)
    }

    /// Copy a direct value, importing every object it references
    pub fn import_value(
        &mut self,
        source: &Document,
        value: &PdfObject,
        dest: &mut Document,
    ) -> Result<PdfObject> {
        let copied = self.rewrite(value, dest);
        self.drain(source, dest)?;
        Ok(copied)
    }

    /// Copy the page `page` of `source` as a standalone page dictionary.
    ///
    /// Inherited attributes are written onto the copy, and `/Parent` is left
    /// for the caller to set. The page's own number must already be reserved
    /// when other objects of the source point back at it.
    pub fn import_page(
        &mut self,
        source: &Document,
        page: &PageNode,
        dest: &mut Document,
    ) -> Result<ObjectRef> {
        let target = self.reserve(page.reference, dest);

        let mut dict = page.dict.clone();
        dict.remove("Parent");
        dict.insert("Type", PdfObject::name("Page"));
        dict.insert("MediaBox", page.media_box.to_array());
        match page.crop_box {
            Some(crop_box) => dict.insert("CropBox", crop_box.to_array()),
            None => {
                dict.remove("CropBox");
            }
        }
        if page.rotate == 0 {
            dict.remove("Rotate");
        } else {
            dict.insert("Rotate", i64::from(page.rotate));
        }
        if let Some(resources) = &page.resources {
            dict.insert("Resources", resources.clone());
        }

        let copied = self.import_value(source, &PdfObject::Dictionary(dict), dest)?;
        dest.set_object(target, copied);
        Ok(target)
    }

    /// Copy the content of every pending object
    fn drain(&mut self, source: &Document, dest: &mut Document) -> Result<()> {
        while let Some((from, to)) = self.pending.pop() {
            let object = source.resolve(from)?;
            let copied = self.rewrite(object, dest);
            dest.set_object(to, copied);
        }
        Ok(())
    }

    /// Clone `value` with references rewritten, queueing unseen targets
    fn rewrite(&mut self, value: &PdfObject, dest: &mut Document) -> PdfObject {
        match value {
            PdfObject::Reference(reference) => self.map_reference(*reference, dest),
            PdfObject::Array(array) => PdfObject::Array(PdfArray(
                array.iter().map(|item| self.rewrite(item, dest)).collect(),
            )),
            PdfObject::Dictionary(dict) => PdfObject::Dictionary(self.rewrite_dict(dict, dest)),
            PdfObject::Stream(stream) => PdfObject::Stream(PdfStream::new(
                self.rewrite_dict(&stream.dict, dest),
                stream.data.clone(),
            )),
            direct => direct.clone(),
        }
    }

    fn rewrite_dict(&mut self, dict: &PdfDictionary, dest: &mut Document) -> PdfDictionary {
        let mut copy = PdfDictionary::new();
        for (key, value) in dict.iter() {
            copy.insert(key.as_str(), self.rewrite(value, dest));
        }
        copy
    }

    fn map_reference(&mut self, reference: ObjectRef, dest: &mut Document) -> PdfObject {
        if let Some(&mapped) = self.mapping.get(&reference) {
            return PdfObject::Reference(mapped);
        }
        if self.barrier.contains(&reference) {
            tracing::debug!("Not following link to page tree node {}", reference);
            return PdfObject::Null;
        }
        let target = self.reserve(reference, dest);
        self.pending.push((reference, target));
        PdfObject::Reference(target)
    }
}

/// Copy `pages` of `source` to the end of `dest`'s page tree.
///
/// All selected pages are reserved before any content is copied, so links
/// between them survive while links to pages left behind become `null`.
pub fn import_pages(dest: &mut Document, source: &Document, pages: &[PageNode]) -> Result<Vec<ObjectRef>> {
    let tree = source.page_tree()?;
    let mut importer = ObjectImporter::new().with_barrier(tree.nodes);

    let mut seen = HashSet::new();
    for page in pages {
        if !seen.insert(page.reference) {
            return Err(PdfError::InvalidPageRange(format!(
                "page object {} selected twice",
                page.reference
            )));
        }
        importer.reserve(page.reference, dest);
    }

    let mut imported = Vec::with_capacity(pages.len());
    for page in pages {
        let target = importer.import_page(source, page, dest)?;
        dest.push_page(target)?;
        tracing::debug!(
            "Imported page {} as {} ({}, rotate {})",
            page.reference,
            target,
            page.orientation,
            page.rotate
        );
        imported.push(target);
    }

    Ok(imported)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Orientation, Rectangle};
    use crate::parser::objects::PdfString;
    use pretty_assertions::assert_eq;

    fn source_with_shared_font(pages: usize) -> Document {
        let mut doc = Document::new();
        let mut font = PdfDictionary::new();
        font.insert("Type", PdfObject::name("Font"));
        font.insert("BaseFont", PdfObject::name("Helvetica"));
        let font = doc.add_object(font);

        for i in 0..pages {
            let content = doc.add_object(PdfStream::new(
                PdfDictionary::new(),
                format!("BT (page {i}) Tj ET").into_bytes(),
            ));
            let mut fonts = PdfDictionary::new();
            fonts.insert("F1", font);
            let mut resources = PdfDictionary::new();
            resources.insert("Font", fonts);

            let mut page = PdfDictionary::new();
            page.insert("Contents", content);
            page.insert("Resources", resources);
            doc.add_page(page).unwrap();
        }
        doc
    }

    #[test]
    fn test_import_object_renumbers() {
        let mut source = Document::new();
        let leaf = source.add_object(PdfString::from("leaf"));
        let mut holder = PdfDictionary::new();
        holder.insert("Leaf", leaf);
        let holder = source.add_object(holder);

        let mut dest = Document::new();
        dest.add_object(1i64);
        let mut importer = ObjectImporter::new();
        let copied = importer.import_object(&source, holder, &mut dest).unwrap();

        assert_eq!(copied, ObjectRef::new(4, 0));
        let dict = dest.resolve(copied).unwrap().as_dict().unwrap();
        let leaf_copy = dict.get("Leaf").unwrap().as_reference().unwrap();
        assert_eq!(leaf_copy, ObjectRef::new(5, 0));
        assert_eq!(
            dest.resolve(leaf_copy).unwrap(),
            &PdfObject::String(PdfString::from("leaf"))
        );
    }

    #[test]
    fn test_import_handles_cycles() {
        let mut source = Document::new();
        let a = source.reserve();
        let b = source.reserve();
        let mut a_dict = PdfDictionary::new();
        a_dict.insert("Next", b);
        let mut b_dict = PdfDictionary::new();
        b_dict.insert("Next", a);
        source.set_object(a, a_dict);
        source.set_object(b, b_dict);

        let mut dest = Document::new();
        let mut importer = ObjectImporter::new();
        let a_copy = importer.import_object(&source, a, &mut dest).unwrap();
        assert_eq!(importer.mapping().len(), 2);

        let b_copy = dest.resolve(a_copy).unwrap().as_dict().unwrap().get("Next").unwrap().as_reference().unwrap();
        let back = dest.resolve(b_copy).unwrap().as_dict().unwrap().get("Next").unwrap().as_reference();
        assert_eq!(back, Some(a_copy));
    }

    #[test]
    fn test_import_dangling_reference_fails() {
        let mut source = Document::new();
        let mut holder = PdfDictionary::new();
        holder.insert("Missing", ObjectRef::new(50, 0));
        let holder = source.add_object(holder);

        let mut dest = Document::new();
        let result = ObjectImporter::new().import_object(&source, holder, &mut dest);
        assert!(matches!(
            result,
            Err(PdfError::DanglingReference(r)) if r == ObjectRef::new(50, 0)
        ));
    }

    #[test]
    fn test_import_pages_shares_resources_once() {
        let source = source_with_shared_font(3);
        let pages = source.pages().unwrap();

        let mut dest = Document::new();
        let imported = import_pages(&mut dest, &source, &pages).unwrap();

        assert_eq!(imported.len(), 3);
        assert_eq!(dest.page_count(), 3);

        let fonts: HashSet<_> = dest
            .pages()
            .unwrap()
            .iter()
            .map(|page| {
                let resources = dest.dereference(page.resources.as_ref().unwrap()).unwrap();
                let fonts = resources.as_dict().unwrap().get("Font").unwrap();
                fonts.as_dict().unwrap().get("F1").unwrap().as_reference().unwrap()
            })
            .collect();
        assert_eq!(fonts.len(), 1);
    }

    #[test]
    fn test_import_page_materialises_inherited_attributes() {
        let mut source = Document::new();
        let root = source.pages_root_ref().unwrap();
        {
            let pages = source.get_mut(root).unwrap().as_dict_mut().unwrap();
            pages.insert(
                "MediaBox",
                Rectangle::from_position_and_size(0.0, 0.0, 800.0, 600.0).to_array(),
            );
            pages.insert("Rotate", 270i64);
        }
        source.add_page(PdfDictionary::new()).unwrap();

        let mut dest = Document::new();
        let pages = source.pages().unwrap();
        let imported = import_pages(&mut dest, &source, &pages).unwrap();

        let dict = dest.resolve(imported[0]).unwrap().as_dict().unwrap();
        assert_eq!(dict.get("Rotate").unwrap().as_integer(), Some(270));
        assert_eq!(
            dict.get("Parent").unwrap().as_reference(),
            Some(dest.pages_root_ref().unwrap())
        );

        let page = dest.page_at(1).unwrap();
        assert_eq!(page.orientation, Orientation::Landscape);
        assert_eq!(page.rotate, 270);
    }

    #[test]
    fn test_links_to_unselected_pages_become_null() {
        let mut source = source_with_shared_font(2);
        let pages = source.pages().unwrap();
        let (first, second) = (pages[0].reference, pages[1].reference);

        // An annotation on page 1 linking to page 2
        let mut link = PdfDictionary::new();
        link.insert("Type", PdfObject::name("Annot"));
        link.insert("Subtype", PdfObject::name("Link"));
        link.insert("Dest", PdfArray(vec![second.into(), PdfObject::name("Fit")]));
        link.insert("P", first);
        let link = source.add_object(link);
        source
            .get_mut(first)
            .unwrap()
            .as_dict_mut()
            .unwrap()
            .insert("Annots", PdfArray(vec![link.into()]));

        let only_first = vec![source.page_at(1).unwrap()];
        let mut dest = Document::new();
        let imported = import_pages(&mut dest, &source, &only_first).unwrap();

        assert_eq!(dest.page_count(), 1);
        let page = dest.resolve(imported[0]).unwrap().as_dict().unwrap();
        let annots = page.get("Annots").unwrap().as_array().unwrap();
        let annot_ref = annots.get(0).unwrap().as_reference().unwrap();
        let annot = dest.resolve(annot_ref).unwrap().as_dict().unwrap();

        let dest_array = annot.get("Dest").unwrap().as_array().unwrap();
        assert!(dest_array.get(0).unwrap().is_null());
        // The back link to the imported page itself is kept
        assert_eq!(annot.get("P").unwrap().as_reference(), Some(imported[0]));
    }

    #[test]
    fn test_import_pages_rejects_duplicates() {
        let source = source_with_shared_font(1);
        let page = source.page_at(1).unwrap();
        let mut dest = Document::new();
        assert!(matches!(
            import_pages(&mut dest, &source, &[page.clone(), page]),
            Err(PdfError::InvalidPageRange(_))
        ));
    }
}
