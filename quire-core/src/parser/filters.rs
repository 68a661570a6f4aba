//! PDF Stream Filters
//!
//! Decodes the structural streams the reader needs to look inside
//! (cross-reference streams and object streams) according to ISO 32000-1
//! Section 7.4. Page content streams are never decoded.

use super::lexer::hex_digit_value;
use super::objects::{PdfDictionary, PdfObject};
use super::{ParseError, ParseResult};

#[cfg(feature = "compression")]
use flate2::read::ZlibDecoder;
#[cfg(feature = "compression")]
use std::io::Read;

/// Supported PDF filters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    /// ASCII hex decode
    ASCIIHexDecode,

    /// ASCII 85 decode
    ASCII85Decode,

    /// Flate decode (zlib/deflate compression)
    FlateDecode,
}

impl Filter {
    /// Parse filter from name, accepting the abbreviated inline-image forms
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ASCIIHexDecode" | "AHx" => Some(Filter::ASCIIHexDecode),
            "ASCII85Decode" | "A85" => Some(Filter::ASCII85Decode),
            "FlateDecode" | "Fl" => Some(Filter::FlateDecode),
            _ => None,
        }
    }
}

/// Predictor parameters from `/DecodeParms`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeParams {
    /// Predictor algorithm (1 = none, 2 = TIFF, 10-15 = PNG)
    pub predictor: i64,
    /// Number of samples per row
    pub columns: usize,
    /// Number of color components per sample
    pub colors: usize,
    pub bits_per_component: usize,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            columns: 1,
            colors: 1,
            bits_per_component: 8,
        }
    }
}

impl DecodeParams {
    /// Read parameters from a `/DecodeParms` dictionary
    pub fn from_dict(dict: &PdfDictionary) -> Self {
        let field = |key: &str, default: i64| {
            dict.get(key)
                .and_then(|obj| obj.as_integer())
                .unwrap_or(default)
        };
        Self {
            predictor: field("Predictor", 1),
            columns: usize::try_from(field("Columns", 1)).unwrap_or(1).max(1),
            colors: usize::try_from(field("Colors", 1)).unwrap_or(1).max(1),
            bits_per_component: usize::try_from(field("BitsPerComponent", 8))
                .unwrap_or(8)
                .max(1),
        }
    }

    /// Bytes of sample data per row, excluding a PNG tag byte
    fn row_bytes(&self) -> usize {
        self.columns
            .saturating_mul(self.colors)
            .saturating_mul(self.bits_per_component)
            .div_ceil(8)
    }

    /// Bytes per complete pixel, at least one
    fn pixel_bytes(&self) -> usize {
        self.colors
            .saturating_mul(self.bits_per_component)
            .div_ceil(8)
            .max(1)
    }
}

/// Decode stream data according to specified filters
pub fn decode_stream(data: &[u8], dict: &PdfDictionary) -> ParseResult<Vec<u8>> {
    let filters: Vec<&str> = match dict.get("Filter") {
        None | Some(PdfObject::Null) => return Ok(data.to_vec()),
        Some(PdfObject::Name(name)) => vec![name.as_str()],
        Some(PdfObject::Array(array)) => array
            .iter()
            .map(|obj| {
                obj.as_name().map(|n| n.as_str()).ok_or_else(|| {
                    ParseError::StreamDecodeError("Invalid filter in array".to_string())
                })
            })
            .collect::<ParseResult<_>>()?,
        Some(other) => {
            return Err(ParseError::StreamDecodeError(format!(
                "Invalid Filter type: {}",
                other.type_name()
            )))
        }
    };

    // DecodeParms is either a single dictionary or one entry per filter
    let params_for = |i: usize| -> Option<DecodeParams> {
        match dict.get("DecodeParms").or_else(|| dict.get("DP")) {
            Some(PdfObject::Dictionary(d)) if i == 0 => Some(DecodeParams::from_dict(d)),
            Some(PdfObject::Array(a)) => a
                .get(i)
                .and_then(|p| p.as_dict())
                .map(DecodeParams::from_dict),
            _ => None,
        }
    };

    let mut result = data.to_vec();
    for (i, filter_name) in filters.into_iter().enumerate() {
        let filter = Filter::from_name(filter_name).ok_or_else(|| {
            ParseError::StreamDecodeError(format!("Unsupported filter: {filter_name}"))
        })?;

        result = apply_filter(&result, filter)?;
        if let Some(params) = params_for(i) {
            result = apply_predictor(&result, &params)?;
        }
    }

    Ok(result)
}

/// Apply a single filter to data
fn apply_filter(data: &[u8], filter: Filter) -> ParseResult<Vec<u8>> {
    match filter {
        Filter::FlateDecode => decode_flate(data),
        Filter::ASCIIHexDecode => decode_ascii_hex(data),
        Filter::ASCII85Decode => decode_ascii85(data),
    }
}

/// Decode FlateDecode (zlib/deflate) compressed data
#[cfg(feature = "compression")]
fn decode_flate(data: &[u8]) -> ParseResult<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut result = Vec::new();
    decoder
        .read_to_end(&mut result)
        .map_err(|e| ParseError::StreamDecodeError(format!("Flate decode error: {e}")))?;
    Ok(result)
}

#[cfg(not(feature = "compression"))]
fn decode_flate(_data: &[u8]) -> ParseResult<Vec<u8>> {
    Err(ParseError::StreamDecodeError(
        "FlateDecode requires 'compression' feature".to_string(),
    ))
}

/// Decode ASCIIHexDecode data
fn decode_ascii_hex(data: &[u8]) -> ParseResult<Vec<u8>> {
    let mut digits = Vec::new();
    for &ch in data.iter().filter(|b| !b.is_ascii_whitespace()) {
        if ch == b'>' {
            break;
        }
        let value = hex_digit_value(ch).ok_or_else(|| {
            ParseError::StreamDecodeError(format!("Invalid hex digit: {}", ch as char))
        })?;
        digits.push(value);
    }

    // Odd number of digits, pad with 0
    if digits.len() % 2 != 0 {
        digits.push(0);
    }

    Ok(digits
        .chunks(2)
        .map(|pair| (pair[0] << 4) | pair[1])
        .collect())
}

/// Decode ASCII85Decode data
fn decode_ascii85(data: &[u8]) -> ParseResult<Vec<u8>> {
    let mut result = Vec::new();
    let mut group: Vec<u8> = Vec::with_capacity(5);

    let mut body: Vec<u8> = data
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    if body.starts_with(b"<~") {
        body.drain(..2);
    }

    let mut chars = body.into_iter();
    while let Some(c) = chars.next() {
        match c {
            b'~' => {
                if chars.next() == Some(b'>') {
                    break;
                }
                return Err(ParseError::StreamDecodeError(
                    "Invalid ASCII85 end marker".to_string(),
                ));
            }
            // Special case: 'z' represents four zero bytes
            b'z' if group.is_empty() => result.extend_from_slice(&[0, 0, 0, 0]),
            b'!'..=b'u' => {
                group.push(c);
                if group.len() == 5 {
                    result.extend_from_slice(&ascii85_group_value(&group)?.to_be_bytes());
                    group.clear();
                }
            }
            _ => {
                return Err(ParseError::StreamDecodeError(format!(
                    "Invalid ASCII85 character: {}",
                    c as char
                )));
            }
        }
    }

    // Handle incomplete final group, padded with 'u'
    if !group.is_empty() {
        let output_bytes = group.len() - 1;
        group.resize(5, b'u');
        let value = ascii85_group_value(&group)?;
        result.extend_from_slice(&value.to_be_bytes()[..output_bytes]);
    }

    Ok(result)
}

fn ascii85_group_value(group: &[u8]) -> ParseResult<u32> {
    let value = group
        .iter()
        .fold(0u64, |acc, &ch| acc * 85 + u64::from(ch - b'!'));
    u32::try_from(value)
        .map_err(|_| ParseError::StreamDecodeError("ASCII85 group overflow".to_string()))
}

/// Reverse a TIFF or PNG predictor applied before compression
pub fn apply_predictor(data: &[u8], params: &DecodeParams) -> ParseResult<Vec<u8>> {
    match params.predictor {
        1 => Ok(data.to_vec()),
        2 => decode_tiff_predictor(data, params),
        10..=15 => decode_png_predictor(data, params),
        other => Err(ParseError::StreamDecodeError(format!(
            "Unsupported predictor: {other}"
        ))),
    }
}

/// TIFF Predictor 2: each sample is the difference from its left neighbour
fn decode_tiff_predictor(data: &[u8], params: &DecodeParams) -> ParseResult<Vec<u8>> {
    if params.bits_per_component != 8 {
        return Err(ParseError::StreamDecodeError(format!(
            "TIFF predictor with {} bits per component",
            params.bits_per_component
        )));
    }
    let row_bytes = params.row_bytes();
    let colors = params.colors;
    let mut output = Vec::with_capacity(data.len());

    for row in data.chunks(row_bytes) {
        let row_start = output.len();
        for (i, &byte) in row.iter().enumerate() {
            let left = if i >= colors {
                output[row_start + i - colors]
            } else {
                0
            };
            output.push(byte.wrapping_add(left));
        }
    }

    Ok(output)
}

/// PNG predictors: every row starts with a tag byte naming its algorithm
fn decode_png_predictor(data: &[u8], params: &DecodeParams) -> ParseResult<Vec<u8>> {
    // A row longer than the data decodes as one short row
    let row_bytes = params.row_bytes().min(data.len());
    let bpp = params.pixel_bytes();
    let mut output: Vec<u8> = Vec::with_capacity(data.len());
    let mut previous = vec![0u8; row_bytes];

    for row in data.chunks(row_bytes + 1) {
        // A short trailing row is decoded as far as it goes
        let (tag, encoded) = match row.split_first() {
            Some(split) => split,
            None => break,
        };
        let mut current = vec![0u8; encoded.len()];

        for i in 0..encoded.len() {
            let left = if i >= bpp { current[i - bpp] } else { 0 };
            let up = previous[i];
            let up_left = if i >= bpp { previous[i - bpp] } else { 0 };

            let predicted = match *tag {
                0 => 0,
                1 => left,
                2 => up,
                3 => ((u16::from(left) + u16::from(up)) / 2) as u8,
                4 => paeth(left, up, up_left),
                _ => {
                    return Err(ParseError::StreamDecodeError(format!(
                        "Invalid PNG predictor tag: {tag}"
                    )))
                }
            };
            current[i] = encoded[i].wrapping_add(predicted);
        }

        output.extend_from_slice(&current);
        previous[..current.len()].copy_from_slice(&current);
    }

    Ok(output)
}

fn paeth(left: u8, up: u8, up_left: u8) -> u8 {
    let p = i16::from(left) + i16::from(up) - i16::from(up_left);
    let pa = (p - i16::from(left)).abs();
    let pb = (p - i16::from(up)).abs();
    let pc = (p - i16::from(up_left)).abs();
    if pa <= pb && pa <= pc {
        left
    } else if pb <= pc {
        up
    } else {
        up_left
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::objects::PdfArray;

    #[test]
    fn test_filter_from_name() {
        assert_eq!(Filter::from_name("FlateDecode"), Some(Filter::FlateDecode));
        assert_eq!(Filter::from_name("AHx"), Some(Filter::ASCIIHexDecode));
        assert_eq!(Filter::from_name("A85"), Some(Filter::ASCII85Decode));
        assert_eq!(Filter::from_name("DCTDecode"), None);
    }

    #[test]
    fn test_decode_stream_no_filter() {
        let dict = PdfDictionary::new();
        assert_eq!(decode_stream(b"raw", &dict).unwrap(), b"raw");
    }

    #[test]
    fn test_ascii_hex_decode() {
        assert_eq!(decode_ascii_hex(b"48 65 6C 6C 6F>").unwrap(), b"Hello");
        assert_eq!(decode_ascii_hex(b"486>").unwrap(), vec![0x48, 0x60]);
        assert!(decode_ascii_hex(b"4G>").is_err());
    }

    #[test]
    fn test_ascii85_decode() {
        assert_eq!(decode_ascii85(b"<~87cURDZ~>").unwrap(), b"Hello");
        assert_eq!(decode_ascii85(b"z~>").unwrap(), vec![0, 0, 0, 0]);
        assert!(decode_ascii85(b"abc~x").is_err());
    }

    #[test]
    fn test_decode_stream_filter_array() {
        let mut dict = PdfDictionary::new();
        dict.insert(
            "Filter",
            PdfArray(vec![
                PdfObject::name("ASCIIHexDecode"),
                PdfObject::name("ASCIIHexDecode"),
            ]),
        );
        // "3438" decodes to "48", which decodes to 0x48
        assert_eq!(decode_stream(b"3438>", &dict).unwrap(), vec![0x48]);
    }

    #[test]
    fn test_decode_stream_unsupported_filter() {
        let mut dict = PdfDictionary::new();
        dict.insert("Filter", PdfObject::name("JBIG2Decode"));
        assert!(matches!(
            decode_stream(b"", &dict),
            Err(ParseError::StreamDecodeError(_))
        ));

        let mut dict = PdfDictionary::new();
        dict.insert("Filter", 5i64);
        assert!(decode_stream(b"", &dict).is_err());
    }

    #[cfg(feature = "compression")]
    #[test]
    fn test_flate_decode() {
        use flate2::write::ZlibEncoder;
        use flate2::Compression;
        use std::io::Write;

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"xref stream payload").unwrap();
        let compressed = encoder.finish().unwrap();

        let mut dict = PdfDictionary::new();
        dict.insert("Filter", PdfObject::name("FlateDecode"));
        assert_eq!(
            decode_stream(&compressed, &dict).unwrap(),
            b"xref stream payload"
        );
        assert!(decode_flate(b"not zlib").is_err());
    }

    #[test]
    fn test_png_up_predictor() {
        let params = DecodeParams {
            predictor: 12,
            columns: 3,
            ..Default::default()
        };
        // Row 1: tag 2 (Up) over zeros; row 2: tag 2 adds to row 1
        let data = [2, 1, 2, 3, 2, 1, 1, 1];
        assert_eq!(
            apply_predictor(&data, &params).unwrap(),
            vec![1, 2, 3, 2, 3, 4]
        );
    }

    #[test]
    fn test_png_sub_and_paeth_rows() {
        let params = DecodeParams {
            predictor: 15,
            columns: 3,
            ..Default::default()
        };
        let data = [1, 5, 1, 1, 4, 0, 0, 0];
        // Sub: 5, 6, 7; Paeth over zero deltas copies the row above
        assert_eq!(
            apply_predictor(&data, &params).unwrap(),
            vec![5, 6, 7, 5, 6, 7]
        );
    }

    #[test]
    fn test_png_invalid_tag() {
        let params = DecodeParams {
            predictor: 12,
            columns: 1,
            ..Default::default()
        };
        assert!(apply_predictor(&[9, 1], &params).is_err());
    }

    #[test]
    fn test_png_predictor_with_huge_columns() {
        let params = DecodeParams {
            predictor: 12,
            columns: usize::MAX,
            colors: 4,
            ..Default::default()
        };
        // The whole payload is a single short row
        assert_eq!(apply_predictor(&[0, 7, 8], &params).unwrap(), vec![7, 8]);
    }

    #[test]
    fn test_tiff_predictor() {
        let params = DecodeParams {
            predictor: 2,
            columns: 4,
            ..Default::default()
        };
        assert_eq!(
            apply_predictor(&[1, 1, 1, 1], &params).unwrap(),
            vec![1, 2, 3, 4]
        );
    }

    #[test]
    fn test_decode_params_from_dict() {
        let mut dict = PdfDictionary::new();
        dict.insert("Predictor", 12i64);
        dict.insert("Columns", 5i64);
        let params = DecodeParams::from_dict(&dict);
        assert_eq!(params.predictor, 12);
        assert_eq!(params.columns, 5);
        assert_eq!(params.colors, 1);
        assert_eq!(params.bits_per_component, 8);
    }
}
