//! Tests for the PDF reader

use super::objects::{ObjectRef, PdfObject};
use super::reader::PdfReader;
use super::test_helpers::*;
use super::{ParseError, ParseOptions, PdfVersion};

fn find(data: &[u8], needle: &[u8]) -> usize {
    data.windows(needle.len())
        .position(|w| w == needle)
        .expect("needle present")
}

#[test]
fn test_parse_minimal_pdf() {
    let parsed = PdfReader::parse(&create_minimal_pdf()).unwrap();

    assert_eq!(parsed.version, PdfVersion::new(1, 4));
    assert_eq!(parsed.objects.len(), 2);
    assert_eq!(parsed.trailer.root().unwrap(), ObjectRef::new(1, 0));
    assert!(!parsed.recovered);
}

#[test]
fn test_parse_two_page_pdf() {
    let parsed = PdfReader::parse(&create_two_page_pdf()).unwrap();

    assert_eq!(parsed.objects.len(), 8);
    assert_eq!(parsed.trailer.info(), Some(ObjectRef::new(8, 0)));

    let content = parsed.objects[&ObjectRef::new(6, 0)].as_stream().unwrap();
    assert_eq!(content.data, b"second page!");

    let page = parsed.objects[&ObjectRef::new(4, 0)].as_dict().unwrap();
    assert_eq!(page.get("Rotate"), Some(&PdfObject::Integer(90)));
}

#[test]
fn test_reader_accessors() {
    let data = create_two_page_pdf();
    let mut reader = PdfReader::new(&data).unwrap();

    assert_eq!(reader.version(), PdfVersion::new(1, 4));
    assert_eq!(reader.xref().in_use().count(), 8);
    assert!(!reader.was_recovered());

    let (reference, object) = reader.get_object(7).unwrap();
    assert_eq!(reference, ObjectRef::new(7, 0));
    assert_eq!(object.as_dict().unwrap().get_type(), Some("Font"));

    assert!(matches!(
        reader.get_object(42),
        Err(ParseError::DanglingReference(r)) if r == ObjectRef::new(42, 0)
    ));
}

#[test]
fn test_missing_header() {
    assert!(matches!(
        PdfReader::parse(b"1 0 obj << >> endobj"),
        Err(ParseError::InvalidHeader)
    ));
    assert!(matches!(PdfReader::parse(b""), Err(ParseError::EmptyFile)));
}

#[test]
fn test_broken_xref_is_recovered() {
    let data = create_pdf_with_broken_xref();

    let parsed = PdfReader::parse_with_options(&data, ParseOptions::lenient()).unwrap();
    assert!(parsed.recovered);
    assert_eq!(parsed.objects.len(), 8);
    assert_eq!(parsed.trailer.root().unwrap(), ObjectRef::new(1, 0));

    assert!(PdfReader::parse_with_options(&data, ParseOptions::strict()).is_err());
}

#[test]
fn test_dangling_reference_is_rejected() {
    let data = build_pdf(
        "1.4",
        &[(1, "<< /Type /Catalog /Pages 9 0 R >>")],
        "/Root 1 0 R",
    );

    for options in [ParseOptions::strict(), ParseOptions::lenient()] {
        assert!(matches!(
            PdfReader::parse_with_options(&data, options),
            Err(ParseError::DanglingReference(r)) if r == ObjectRef::new(9, 0)
        ));
    }
}

#[test]
fn test_dangling_info_is_dropped() {
    let data = build_pdf(
        "1.5",
        &[
            (1, "<< /Type /Catalog /Pages 2 0 R >>"),
            (2, "<< /Type /Pages /Kids [] /Count 0 >>"),
        ],
        "/Root 1 0 R /Info 7 0 R",
    );

    let parsed = PdfReader::parse(&data).unwrap();
    assert_eq!(parsed.trailer.info(), None);
}

#[test]
fn test_indirect_stream_length() {
    let data = build_pdf(
        "1.4",
        &[
            (1, "<< /Type /Catalog /Pages 2 0 R >>"),
            (
                2,
                "<< /Type /Pages /Kids [3 0 R] /Count 1 >>",
            ),
            (3, "<< /Type /Page /Parent 2 0 R /Contents 4 0 R >>"),
            (4, "<< /Length 5 0 R >>\nstream\nendstream inside\nendstream"),
            (5, "16"),
        ],
        "/Root 1 0 R",
    );

    let parsed = PdfReader::parse(&data).unwrap();
    let stream = parsed.objects[&ObjectRef::new(4, 0)].as_stream().unwrap();
    assert_eq!(stream.data, b"endstream inside");
}

#[test]
fn test_incremental_update_overrides_objects() {
    let mut data = create_minimal_pdf();
    let prev = find(&data, b"\nxref\n") + 1;

    let page_offset = data.len();
    data.extend_from_slice(b"3 0 obj\n<< /Type /Page /Parent 2 0 R >>\nendobj\n");
    let pages_offset = data.len();
    data.extend_from_slice(b"2 0 obj\n<< /Type /Pages /Kids [3 0 R] /Count 1 >>\nendobj\n");

    let xref_offset = data.len();
    data.extend_from_slice(
        format!(
            "xref\n0 1\n0000000000 65535 f \n2 2\n{pages_offset:010} 00000 n \n{page_offset:010} 00000 n \n\
             trailer\n<< /Size 4 /Root 1 0 R /Prev {prev} >>\nstartxref\n{xref_offset}\n%%EOF\n"
        )
        .as_bytes(),
    );

    let parsed = PdfReader::parse(&data).unwrap();
    assert!(!parsed.recovered);
    assert_eq!(parsed.objects.len(), 3);

    let pages = parsed.objects[&ObjectRef::new(2, 0)].as_dict().unwrap();
    assert_eq!(pages.get("Count"), Some(&PdfObject::Integer(1)));
}

#[test]
fn test_xref_missing_live_object_is_rebuilt() {
    let mut data = build_pdf(
        "1.4",
        &[
            (1, "<< /Type /Catalog /Pages 2 0 R >>"),
            (2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>"),
            (3, "<< /Type /Page /Parent 2 0 R >>"),
        ],
        "/Root 1 0 R",
    );

    // Declare object 3 free although the page tree uses it
    let offset = find(&data, b"3 0 obj");
    let entry = format!("{offset:010} 00000 n");
    let at = find(&data, entry.as_bytes());
    data[at..at + entry.len()].copy_from_slice(b"0000000000 00000 f");

    let lenient = PdfReader::parse(&data).unwrap();
    assert!(lenient.recovered);
    assert!(lenient.objects.contains_key(&ObjectRef::new(3, 0)));

    assert!(matches!(
        PdfReader::parse_with_options(&data, ParseOptions::strict()),
        Err(ParseError::DanglingReference(r)) if r == ObjectRef::new(3, 0)
    ));
}
