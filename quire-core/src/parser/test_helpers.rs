//! Helper functions for creating test PDFs with correct offsets

/// Assemble a PDF from `(number, body)` pairs, writing a classic xref table
/// with the real offset of every object. `trailer` is the trailer dictionary
/// body without `/Size`.
pub fn build_pdf(version: &str, objects: &[(u32, &str)], trailer: &str) -> Vec<u8> {
    let mut content = format!("%PDF-{version}\n").into_bytes();
    let mut offsets = Vec::new();

    for (number, body) in objects {
        offsets.push((*number, content.len()));
        content.extend_from_slice(format!("{number} 0 obj\n{body}\nendobj\n").as_bytes());
    }

    let size = objects.iter().map(|(n, _)| n + 1).max().unwrap_or(1);
    let xref_start = content.len();
    let mut xref = format!("xref\n0 {size}\n0000000000 65535 f \n");
    for number in 1..size {
        match offsets.iter().find(|(n, _)| *n == number) {
            Some((_, offset)) => xref.push_str(&format!("{offset:010} 00000 n \n")),
            None => xref.push_str("0000000000 00000 f \n"),
        }
    }
    xref.push_str(&format!(
        "trailer\n<< /Size {size} {trailer} >>\nstartxref\n{xref_start}\n%%EOF\n"
    ));
    content.extend_from_slice(xref.as_bytes());
    content
}

/// Catalog and an empty page tree
pub fn create_minimal_pdf() -> Vec<u8> {
    build_pdf(
        "1.4",
        &[
            (1, "<< /Type /Catalog /Pages 2 0 R >>"),
            (2, "<< /Type /Pages /Kids [] /Count 0 >>"),
        ],
        "/Root 1 0 R",
    )
}

/// Two pages sharing a font, with an info dictionary
pub fn create_two_page_pdf() -> Vec<u8> {
    build_pdf(
        "1.4",
        &[
            (1, "<< /Type /Catalog /Pages 2 0 R >>"),
            (
                2,
                "<< /Type /Pages /Kids [3 0 R 4 0 R] /Count 2 /MediaBox [0 0 612 792] >>",
            ),
            (
                3,
                "<< /Type /Page /Parent 2 0 R /Contents 5 0 R /Resources << /Font << /F1 7 0 R >> >> >>",
            ),
            (
                4,
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 842 595] /Rotate 90 /Contents 6 0 R /Resources << /Font << /F1 7 0 R >> >> >>",
            ),
            (5, "<< /Length 11 >>\nstream\nfirst page!\nendstream"),
            (6, "<< /Length 12 >>\nstream\nsecond page!\nendstream"),
            (7, "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>"),
            (8, "<< /Title (Two Pages) /Producer (hand written) >>"),
        ],
        "/Root 1 0 R /Info 8 0 R",
    )
}

/// A PDF whose startxref points nowhere
pub fn create_pdf_with_broken_xref() -> Vec<u8> {
    let mut data = create_two_page_pdf();
    let marker = data
        .windows(9)
        .rposition(|w| w == b"startxref")
        .expect("startxref present");
    data.truncate(marker);
    data.extend_from_slice(b"startxref\n999999\n%%EOF\n");
    data
}
