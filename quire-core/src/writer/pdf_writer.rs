use crate::document::Document;
use crate::error::Result;
use crate::operations::import::ObjectImporter;
use crate::parser::objects::{ObjectRef, PdfDictionary, PdfObject, PdfString};
use crate::parser::PdfTrailer;
use chrono::{DateTime, Utc};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Options applied when serializing a document
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct WriterOptions {
    /// Drop unreachable objects and renumber the rest densely from 1
    pub compact: bool,
    /// Value written to `/Producer` in the information dictionary
    pub producer: Option<String>,
    /// Write `/ModDate` with the current time
    pub stamp_modification_date: bool,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            compact: true,
            producer: Some(format!("quire v{}", env!("CARGO_PKG_VERSION"))),
            stamp_modification_date: true,
        }
    }
}

impl WriterOptions {
    /// Write the object table exactly as it is, without touching metadata
    pub fn verbatim() -> Self {
        Self {
            compact: false,
            producer: None,
            stamp_modification_date: false,
        }
    }

    pub fn with_compact(mut self, compact: bool) -> Self {
        self.compact = compact;
        self
    }

    pub fn with_producer(mut self, producer: impl Into<String>) -> Self {
        self.producer = Some(producer.into());
        self
    }

    pub fn with_modification_date(mut self, stamp: bool) -> Self {
        self.stamp_modification_date = stamp;
        self
    }
}

pub struct PdfWriter<W: Write> {
    writer: W,
    options: WriterOptions,
    /// Offset and generation of every written object, by object number
    xref_positions: BTreeMap<u32, (u64, u16)>,
    current_position: u64,
}

impl<W: Write> PdfWriter<W> {
    pub fn new_with_writer(writer: W) -> Self {
        Self::with_options(writer, WriterOptions::default())
    }

    pub fn with_options(writer: W, options: WriterOptions) -> Self {
        Self {
            writer,
            options,
            xref_positions: BTreeMap::new(),
            current_position: 0,
        }
    }

    /// Write a complete file: header, objects, xref table and trailer
    pub fn write_document(&mut self, document: &Document) -> Result<()> {
        let document = self.prepare(document)?;

        self.write_header(&document)?;
        for (reference, object) in document.objects() {
            self.write_object(*reference, object)?;
        }

        let xref_position = self.current_position;
        self.write_xref()?;
        self.write_trailer(document.trailer(), xref_position)?;

        self.writer.flush()?;
        tracing::debug!(
            "Wrote {} objects, {} bytes",
            self.xref_positions.len(),
            self.current_position
        );
        Ok(())
    }

    /// Apply compaction and metadata options, copying only when needed
    fn prepare<'d>(&self, document: &'d Document) -> Result<Cow<'d, Document>> {
        let mut prepared = Cow::Borrowed(document);

        if self.options.compact {
            prepared = Cow::Owned(compact(document)?);
        }
        if let Some(producer) = &self.options.producer {
            prepared
                .to_mut()
                .set_info_entry("Producer", PdfString::from(producer.as_str()));
        }
        if self.options.stamp_modification_date {
            let date = format_pdf_date(Utc::now());
            prepared
                .to_mut()
                .set_info_entry("ModDate", PdfString::from(date.as_str()));
        }

        Ok(prepared)
    }

    fn write_header(&mut self, document: &Document) -> Result<()> {
        self.write_bytes(format!("%PDF-{}\n", document.version()).as_bytes())?;
        // Binary comment to ensure file is treated as binary
        self.write_bytes(&[b'%', 0xE2, 0xE3, 0xCF, 0xD3, b'\n'])?;
        Ok(())
    }

    fn write_object(&mut self, reference: ObjectRef, object: &PdfObject) -> Result<()> {
        self.xref_positions
            .insert(reference.number, (self.current_position, reference.generation));

        let header = format!("{} {} obj\n", reference.number, reference.generation);
        self.write_bytes(header.as_bytes())?;

        self.write_object_value(object)?;

        self.write_bytes(b"\nendobj\n")?;
        Ok(())
    }

    fn write_object_value(&mut self, object: &PdfObject) -> Result<()> {
        match object {
            PdfObject::Null => self.write_bytes(b"null")?,
            PdfObject::Boolean(b) => self.write_bytes(if *b { b"true" } else { b"false" })?,
            PdfObject::Integer(i) => self.write_bytes(i.to_string().as_bytes())?,
            PdfObject::Real(f) => self.write_bytes(format_real(*f).as_bytes())?,
            PdfObject::String(s) => self.write_bytes(&encode_string(s.as_bytes()))?,
            PdfObject::Name(n) => self.write_bytes(&encode_name(n.as_str()))?,
            PdfObject::Array(arr) => {
                self.write_bytes(b"[")?;
                for (i, obj) in arr.iter().enumerate() {
                    if i > 0 {
                        self.write_bytes(b" ")?;
                    }
                    self.write_object_value(obj)?;
                }
                self.write_bytes(b"]")?;
            }
            PdfObject::Dictionary(dict) => self.write_dictionary(dict)?,
            PdfObject::Stream(stream) => {
                // The payload is written as stored, so /Length must match it
                let mut dict = stream.dict.clone();
                dict.insert("Length", stream.data.len() as i64);
                self.write_dictionary(&dict)?;
                self.write_bytes(b"\nstream\n")?;
                self.write_bytes(&stream.data)?;
                self.write_bytes(b"\nendstream")?;
            }
            PdfObject::Reference(r) => {
                let ref_str = format!("{} {} R", r.number, r.generation);
                self.write_bytes(ref_str.as_bytes())?;
            }
        }
        Ok(())
    }

    fn write_dictionary(&mut self, dict: &PdfDictionary) -> Result<()> {
        self.write_bytes(b"<<")?;
        for (key, value) in dict.iter() {
            self.write_bytes(b"\n")?;
            self.write_bytes(&encode_name(key.as_str()))?;
            self.write_bytes(b" ")?;
            self.write_object_value(value)?;
        }
        self.write_bytes(b"\n>>")?;
        Ok(())
    }

    fn write_xref(&mut self) -> Result<()> {
        self.write_bytes(b"xref\n")?;

        let max_obj_num = self.xref_positions.keys().next_back().copied().unwrap_or(0);

        // One subsection covering 0..=max
        self.write_bytes(format!("0 {}\n", max_obj_num + 1).as_bytes())?;
        self.write_bytes(b"0000000000 65535 f \n")?;

        for obj_num in 1..=max_obj_num {
            let entry = match self.xref_positions.get(&obj_num) {
                Some((position, generation)) => format!("{position:010} {generation:05} n \n"),
                // Free entry for gap
                None => "0000000000 00000 f \n".to_string(),
            };
            self.write_bytes(entry.as_bytes())?;
        }

        Ok(())
    }

    fn write_trailer(&mut self, source: &PdfTrailer, xref_position: u64) -> Result<()> {
        let max_obj_num = self.xref_positions.keys().next_back().copied().unwrap_or(0);

        let mut trailer = PdfDictionary::new();
        trailer.insert("Size", i64::from(max_obj_num) + 1);
        trailer.insert("Root", source.root()?);
        if let Some(info) = source.info() {
            trailer.insert("Info", info);
        }
        if let Some(id) = source.id() {
            trailer.insert("ID", id.clone());
        }

        self.write_bytes(b"trailer\n")?;
        self.write_dictionary(&trailer)?;
        self.write_bytes(b"\nstartxref\n")?;
        self.write_bytes(xref_position.to_string().as_bytes())?;
        self.write_bytes(b"\n%%EOF\n")?;

        Ok(())
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data)?;
        self.current_position += data.len() as u64;
        Ok(())
    }
}

impl PdfWriter<BufWriter<std::fs::File>> {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new_with_writer(BufWriter::new(file)))
    }
}

/// Copy everything reachable from the trailer into a fresh, densely
/// numbered document
fn compact(document: &Document) -> Result<Document> {
    let mut compacted = Document::bare(document.version());
    let mut importer = ObjectImporter::new();

    let root = importer.import_object(document, document.root_ref()?, &mut compacted)?;
    let info = match document.trailer().info() {
        Some(info) => Some(importer.import_object(document, info, &mut compacted)?),
        None => None,
    };

    let mut trailer = PdfTrailer::for_root(root, compacted.max_object_number() + 1);
    if let Some(info) = info {
        trailer.dict.insert("Info", info);
    }
    compacted.set_trailer(trailer);

    let dropped = document
        .objects()
        .len()
        .saturating_sub(compacted.objects().len());
    if dropped > 0 {
        tracing::debug!("Compaction dropped {} unreachable objects", dropped);
    }
    Ok(compacted)
}

fn format_real(value: f64) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let formatted = format!("{value:.6}");
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "-0" | "" => "0".to_string(),
        other => other.to_string(),
    }
}

/// Encode a name with `#xx` escapes for delimiters, whitespace and
/// non-printable bytes
fn encode_name(name: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(name.len() + 1);
    out.push(b'/');
    for &byte in &name_bytes(name) {
        let needs_escape = !(0x21..=0x7E).contains(&byte)
            || matches!(
                byte,
                b'#' | b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
            );
        if needs_escape {
            out.extend_from_slice(format!("#{byte:02X}").as_bytes());
        } else {
            out.push(byte);
        }
    }
    out
}

/// Raw bytes of a name. The lexer maps each name byte to the char with the
/// same code point, so chars up to U+00FF map back to a single byte; anything
/// above is written as its UTF-8 sequence.
fn name_bytes(name: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(name.len());
    for ch in name.chars() {
        match u8::try_from(u32::from(ch)) {
            Ok(byte) => bytes.push(byte),
            Err(_) => {
                let mut buffer = [0u8; 4];
                bytes.extend_from_slice(ch.encode_utf8(&mut buffer).as_bytes());
            }
        }
    }
    bytes
}

/// Encode a string literally when it is printable text, as hex otherwise
fn encode_string(bytes: &[u8]) -> Vec<u8> {
    let printable = bytes
        .iter()
        .all(|&b| (0x20..=0x7E).contains(&b) || matches!(b, b'\n' | b'\r' | b'\t'));

    if !printable {
        let mut out = Vec::with_capacity(bytes.len() * 2 + 2);
        out.push(b'<');
        for byte in bytes {
            out.extend_from_slice(format!("{byte:02X}").as_bytes());
        }
        out.push(b'>');
        return out;
    }

    let mut out = Vec::with_capacity(bytes.len() + 2);
    out.push(b'(');
    for &byte in bytes {
        match byte {
            b'(' | b')' | b'\\' => {
                out.push(b'\\');
                out.push(byte);
            }
            b'\r' => out.extend_from_slice(b"\\r"),
            _ => out.push(byte),
        }
    }
    out.push(b')');
    out
}

/// Format a DateTime as a PDF date string (D:YYYYMMDDHHmmSSOHH'mm)
pub fn format_pdf_date(date: DateTime<Utc>) -> String {
    let formatted = date.format("D:%Y%m%d%H%M%S");

    // For UTC, the offset is always +00'00
    format!("{formatted}+00'00")
}
