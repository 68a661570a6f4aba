//! Document builders shared by the operation tests

use crate::document::Document;
use crate::geometry::Rectangle;
use crate::parser::objects::{PdfDictionary, PdfObject, PdfStream, PdfString};

/// A document with one page per `(width, height)`, each with its own content
/// stream reading `<label> page <n>` and a shared font resource
pub(crate) fn document_with_sizes(label: &str, sizes: &[(f64, f64)]) -> Document {
    let mut doc = Document::new();

    let mut font = PdfDictionary::new();
    font.insert("Type", PdfObject::name("Font"));
    font.insert("Subtype", PdfObject::name("Type1"));
    font.insert("BaseFont", PdfObject::name("Helvetica"));
    let font = doc.add_object(font);

    for (i, (width, height)) in sizes.iter().enumerate() {
        let content = doc.add_object(PdfStream::new(
            PdfDictionary::new(),
            page_content(label, i + 1),
        ));

        let mut fonts = PdfDictionary::new();
        fonts.insert("F1", font);
        let mut resources = PdfDictionary::new();
        resources.insert("Font", fonts);

        let mut page = PdfDictionary::new();
        page.insert(
            "MediaBox",
            Rectangle::from_position_and_size(0.0, 0.0, *width, *height).to_array(),
        );
        page.insert("Contents", content);
        page.insert("Resources", resources);
        doc.add_page(page).expect("skeleton has a page tree");
    }

    doc.set_info_entry("Title", PdfString::from(label));
    doc
}

/// A document of `pages` US Letter pages
pub(crate) fn letter_document(label: &str, pages: usize) -> Document {
    document_with_sizes(label, &vec![(612.0, 792.0); pages])
}

pub(crate) fn page_content(label: &str, number: usize) -> Vec<u8> {
    format!("BT /F1 12 Tf 72 720 Td ({label} page {number}) Tj ET").into_bytes()
}

/// Content stream bytes of every page, in order
pub(crate) fn contents(doc: &Document) -> Vec<Vec<u8>> {
    doc.pages()
        .expect("readable page tree")
        .iter()
        .map(|page| {
            let contents = page.contents().expect("page has contents");
            let stream = doc.dereference(contents).expect("contents resolve");
            stream.as_stream().expect("contents is a stream").data.clone()
        })
        .collect()
}

/// Serialize and parse back
pub(crate) fn round_trip(doc: &Document) -> Document {
    let bytes = doc.to_bytes().expect("serializes");
    Document::from_bytes(&bytes).expect("parses back")
}
