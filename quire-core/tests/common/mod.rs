//! Shared helpers for integration tests

#![allow(dead_code)]

use quire::parser::{PdfDictionary, PdfObject, PdfStream, PdfString};
use quire::{Document, Rectangle};

/// A document with one page per `(width, height)`. Page `n` carries a
/// content stream reading `<label>:<n>` and every page shares one font.
pub fn sample_document(label: &str, sizes: &[(f64, f64)]) -> Document {
    let mut doc = Document::new();

    let mut font = PdfDictionary::new();
    font.insert("Type", PdfObject::name("Font"));
    font.insert("Subtype", PdfObject::name("Type1"));
    font.insert("BaseFont", PdfObject::name("Courier"));
    let font = doc.add_object(font);

    for (i, (width, height)) in sizes.iter().enumerate() {
        let content = doc.add_object(PdfStream::new(
            PdfDictionary::new(),
            page_text(label, i + 1),
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
        doc.add_page(page).unwrap();
    }

    doc.set_info_entry("Title", PdfString::from(label));
    doc
}

pub fn letter_pages(label: &str, count: usize) -> Document {
    sample_document(label, &vec![(612.0, 792.0); count])
}

pub fn page_text(label: &str, number: usize) -> Vec<u8> {
    format!("{label}:{number}").into_bytes()
}

/// Content bytes of every page, in page order
pub fn page_texts(doc: &Document) -> Vec<Vec<u8>> {
    doc.pages()
        .unwrap()
        .iter()
        .map(|page| {
            let contents = doc.dereference(page.contents().unwrap()).unwrap();
            contents.as_stream().unwrap().data.clone()
        })
        .collect()
}

pub fn media_boxes(doc: &Document) -> Vec<(f64, f64)> {
    doc.pages()
        .unwrap()
        .iter()
        .map(|page| (page.width(), page.height()))
        .collect()
}

pub fn rotations(doc: &Document) -> Vec<i32> {
    doc.pages().unwrap().iter().map(|page| page.rotate).collect()
}

pub fn round_trip(doc: &Document) -> Document {
    Document::from_bytes(&doc.to_bytes().unwrap()).unwrap()
}
