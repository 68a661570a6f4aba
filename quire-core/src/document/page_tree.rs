//! Page tree traversal
//!
//! Pages are the leaves of the tree rooted at the catalog's `/Pages` entry.
//! Their order is the in-order walk of the `/Kids` arrays, not their object
//! numbers. `Resources`, `MediaBox`, `CropBox` and `Rotate` may be set on any
//! intermediate node and apply to every page below it unless overridden.

use super::Document;
use crate::error::{PdfError, Result};
use crate::geometry::{Orientation, Rectangle};
use crate::parser::objects::{ObjectRef, PdfDictionary, PdfObject};
use std::collections::HashSet;

/// A page together with its effective (inherited) attributes
#[derive(Debug, Clone, PartialEq)]
pub struct PageNode {
    /// The page object in its document
    pub reference: ObjectRef,
    /// The page dictionary as stored, without inherited entries
    pub dict: PdfDictionary,
    /// Effective MediaBox; US Letter when no node defines one
    pub media_box: Rectangle,
    pub crop_box: Option<Rectangle>,
    /// Effective rotation in degrees: 0, 90, 180 or 270
    pub rotate: i32,
    /// Effective `/Resources`, either a dictionary or a reference to one
    pub resources: Option<PdfObject>,
    /// Presentation hint derived from the MediaBox
    pub orientation: Orientation,
}

impl PageNode {
    pub fn width(&self) -> f64 {
        self.media_box.width()
    }

    pub fn height(&self) -> f64 {
        self.media_box.height()
    }

    /// Contents entry of the page: a stream reference or an array of them
    pub fn contents(&self) -> Option<&PdfObject> {
        self.dict.get("Contents")
    }
}

/// Result of walking a page tree
#[derive(Debug, Clone, Default)]
pub struct PageTree {
    /// Leaves in document order
    pub pages: Vec<PageNode>,
    /// Every node of the tree, intermediate `Pages` nodes and leaves alike
    pub nodes: HashSet<ObjectRef>,
}

/// Attributes handed down from ancestors
#[derive(Debug, Clone, Default)]
struct Inherited {
    media_box: Option<Rectangle>,
    crop_box: Option<Rectangle>,
    rotate: Option<i32>,
    resources: Option<PdfObject>,
}

impl Inherited {
    /// Overlay the inheritable entries defined on `node`
    fn overlay(&self, doc: &Document, node: &PdfDictionary) -> Result<Self> {
        let mut next = self.clone();
        if let Some(rect) = read_rectangle(doc, node, "MediaBox")? {
            next.media_box = Some(rect);
        }
        if let Some(rect) = read_rectangle(doc, node, "CropBox")? {
            next.crop_box = Some(rect);
        }
        if let Some(value) = node.get("Rotate") {
            if let Some(degrees) = doc.dereference(value)?.as_integer() {
                next.rotate = Some(normalize_rotation(degrees));
            }
        }
        if let Some(resources) = node.get("Resources") {
            next.resources = Some(resources.clone());
        }
        Ok(next)
    }
}

/// Reduce a `/Rotate` value to 0, 90, 180 or 270.
///
/// Values that are not multiples of 90 are ignored and read as 0.
pub fn normalize_rotation(degrees: i64) -> i32 {
    let normalized = degrees.rem_euclid(360);
    if normalized % 90 == 0 {
        normalized as i32
    } else {
        tracing::debug!("Ignoring /Rotate {} (not a multiple of 90)", degrees);
        0
    }
}

fn read_rectangle(doc: &Document, node: &PdfDictionary, key: &str) -> Result<Option<Rectangle>> {
    let Some(value) = node.get(key) else {
        return Ok(None);
    };
    let rect = doc
        .dereference(value)?
        .as_array()
        .and_then(Rectangle::from_array);
    if rect.is_none() {
        tracing::debug!("Ignoring malformed /{} {:?}", key, value);
    }
    Ok(rect)
}

enum NodeKind {
    Pages,
    Page,
}

fn node_kind(reference: ObjectRef, dict: &PdfDictionary) -> Result<NodeKind> {
    match dict.get_type() {
        Some("Pages") => Ok(NodeKind::Pages),
        Some("Page") => Ok(NodeKind::Page),
        // Untyped nodes are classified by shape
        None if dict.contains_key("Kids") => Ok(NodeKind::Pages),
        None => Ok(NodeKind::Page),
        Some(other) => Err(PdfError::MalformedDocument(format!(
            "page tree node {reference} has type /{other}"
        ))),
    }
}

/// Walk the page tree rooted at `root`.
///
/// A node reached twice (a cycle, or a node shared between two parents) makes
/// the tree malformed.
pub fn walk(doc: &Document, root: ObjectRef) -> Result<PageTree> {
    let mut tree = PageTree::default();
    let mut stack = vec![(root, Inherited::default())];

    while let Some((reference, inherited)) = stack.pop() {
        if !tree.nodes.insert(reference) {
            return Err(PdfError::MalformedDocument(format!(
                "page tree node {reference} is reachable twice"
            )));
        }

        let dict = doc.resolve(reference)?.as_dict().ok_or_else(|| {
            PdfError::MalformedDocument(format!("page tree node {reference} is not a dictionary"))
        })?;
        let attributes = inherited.overlay(doc, dict)?;

        match node_kind(reference, dict)? {
            NodeKind::Pages => {
                let kids = match dict.get("Kids") {
                    Some(kids) => doc.dereference(kids)?.as_array().ok_or_else(|| {
                        PdfError::MalformedDocument(format!("/Kids of {reference} is not an array"))
                    })?,
                    None => {
                        return Err(PdfError::MalformedDocument(format!(
                            "pages node {reference} has no /Kids"
                        )))
                    }
                };
                // Reverse so the first kid is popped first
                for kid in kids.iter().rev() {
                    let kid_ref = kid.as_reference().ok_or_else(|| {
                        PdfError::MalformedDocument(format!(
                            "/Kids of {reference} holds a {} instead of a reference",
                            kid.type_name()
                        ))
                    })?;
                    stack.push((kid_ref, attributes.clone()));
                }
            }
            NodeKind::Page => {
                let media_box = attributes.media_box.unwrap_or_else(Rectangle::us_letter);
                tree.pages.push(PageNode {
                    reference,
                    dict: dict.clone(),
                    media_box,
                    crop_box: attributes.crop_box,
                    rotate: attributes.rotate.unwrap_or(0),
                    resources: attributes.resources,
                    orientation: media_box.orientation(),
                });
            }
        }
    }

    tracing::debug!(
        "Page tree at {} has {} pages in {} nodes",
        root,
        tree.pages.len(),
        tree.nodes.len()
    );
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::objects::PdfArray;

    fn rect_array(w: i64, h: i64) -> PdfObject {
        PdfObject::Array(PdfArray(vec![
            PdfObject::Integer(0),
            PdfObject::Integer(0),
            PdfObject::Integer(w),
            PdfObject::Integer(h),
        ]))
    }

    #[test]
    fn test_normalize_rotation() {
        assert_eq!(normalize_rotation(0), 0);
        assert_eq!(normalize_rotation(450), 90);
        assert_eq!(normalize_rotation(-90), 270);
        assert_eq!(normalize_rotation(45), 0);
    }

    #[test]
    fn test_inherited_attributes() {
        let mut doc = Document::new();
        let root = doc.pages_root_ref().unwrap();
        {
            let pages = doc.get_mut(root).unwrap().as_dict_mut().unwrap();
            pages.insert("MediaBox", rect_array(800, 600));
            pages.insert("Rotate", 90i64);
        }
        let mut page = PdfDictionary::new();
        page.insert("Rotate", 180i64);
        doc.add_page(page).unwrap();

        let pages = doc.pages().unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].width(), 800.0);
        assert_eq!(pages[0].rotate, 180);
        assert_eq!(pages[0].orientation, Orientation::Landscape);
        assert!(pages[0].crop_box.is_none());
    }

    #[test]
    fn test_nested_tree_order() {
        let mut doc = Document::new();
        let root = doc.pages_root_ref().unwrap();

        let leaf = |doc: &mut Document, parent: ObjectRef| {
            let mut page = PdfDictionary::new();
            page.insert("Type", PdfObject::name("Page"));
            page.insert("Parent", parent);
            doc.add_object(page)
        };

        let inner = doc.reserve();
        let first = leaf(&mut doc, root);
        let second = leaf(&mut doc, inner);
        let third = leaf(&mut doc, inner);

        let mut inner_dict = PdfDictionary::new();
        inner_dict.insert("Type", PdfObject::name("Pages"));
        inner_dict.insert("Parent", root);
        inner_dict.insert("Kids", PdfArray(vec![second.into(), third.into()]));
        inner_dict.insert("Count", 2i64);
        doc.set_object(inner, inner_dict);

        let root_dict = doc.get_mut(root).unwrap().as_dict_mut().unwrap();
        root_dict.insert("Kids", PdfArray(vec![first.into(), inner.into()]));
        root_dict.insert("Count", 3i64);

        let tree = walk(&doc, root).unwrap();
        let order: Vec<_> = tree.pages.iter().map(|p| p.reference).collect();
        assert_eq!(order, vec![first, second, third]);
        assert_eq!(tree.nodes.len(), 5);
    }

    #[test]
    fn test_cycle_is_malformed() {
        let mut doc = Document::new();
        let root = doc.pages_root_ref().unwrap();
        let root_dict = doc.get_mut(root).unwrap().as_dict_mut().unwrap();
        root_dict.insert("Kids", PdfArray(vec![root.into()]));
        root_dict.insert("Count", 1i64);

        assert!(matches!(
            walk(&doc, root),
            Err(PdfError::MalformedDocument(_))
        ));
        assert_eq!(doc.page_count(), 0);
    }

    #[test]
    fn test_missing_kid_is_dangling() {
        let mut doc = Document::new();
        let root = doc.pages_root_ref().unwrap();
        let root_dict = doc.get_mut(root).unwrap().as_dict_mut().unwrap();
        root_dict.insert("Kids", PdfArray(vec![ObjectRef::new(99, 0).into()]));

        assert!(matches!(
            walk(&doc, root),
            Err(PdfError::DanglingReference(r)) if r == ObjectRef::new(99, 0)
        ));
    }

    #[test]
    fn test_default_media_box() {
        let mut doc = Document::new();
        doc.add_page(PdfDictionary::new()).unwrap();
        let page = doc.page_at(1).unwrap();
        assert_eq!(page.media_box, Rectangle::us_letter());
        assert_eq!(page.orientation, Orientation::Portrait);
        assert_eq!(page.rotate, 0);
    }
}
