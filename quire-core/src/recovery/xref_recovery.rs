//! XRef recovery for corrupted PDF files
//!
//! Rebuilds a cross-reference table from the objects an [`ObjectScanner`]
//! finds, and picks or synthesizes the trailer that goes with it.

use super::scanner::{ObjectScanner, ObjectType, ScanResult};
use crate::parser::object_stream::ObjectStream;
use crate::parser::objects::{ObjectRef, PdfDictionary, PdfObject};
use crate::parser::xref::{XRefEntry, XRefTable};
use crate::parser::{ParseError, ParseResult};

/// Trailer keys that carry over from a recovered trailer or xref stream
const TRAILER_KEYS: &[&str] = &["Root", "Info", "ID", "Encrypt"];

/// Recovery statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryStats {
    /// Objects located directly in the file
    pub objects_found: usize,
    /// Objects located inside object streams
    pub compressed_objects: usize,
    /// Whether an existing trailer was reused
    pub trailer_found: bool,
}

/// XRef recovery engine
pub struct XRefRecovery {
    scan: ScanResult,
    max_depth: usize,
    stats: RecoveryStats,
}

/// Rebuild the cross-reference table of `data` by scanning for objects
pub fn rebuild_xref(data: &[u8], max_depth: usize) -> ParseResult<XRefTable> {
    let mut recovery = XRefRecovery::scan(data, max_depth);
    let table = recovery.build_xref_table()?;
    tracing::warn!(
        "Rebuilt cross-reference table: {} objects, {} compressed, trailer {}",
        recovery.stats.objects_found,
        recovery.stats.compressed_objects,
        if recovery.stats.trailer_found {
            "recovered"
        } else {
            "synthesized"
        }
    );
    Ok(table)
}

impl XRefRecovery {
    /// Scan a file for PDF objects
    pub fn scan(data: &[u8], max_depth: usize) -> Self {
        Self {
            scan: ObjectScanner::new(max_depth).scan(data),
            max_depth,
            stats: RecoveryStats::default(),
        }
    }

    pub fn stats(&self) -> &RecoveryStats {
        &self.stats
    }

    /// Build XRef table from found objects
    pub fn build_xref_table(&mut self) -> ParseResult<XRefTable> {
        let mut table = XRefTable::new();

        for object in self.scan.objects.values() {
            if object.object_type == ObjectType::Unreadable {
                continue;
            }
            table.insert(
                object.number,
                XRefEntry::InUse {
                    offset: object.offset,
                    generation: object.generation,
                },
            );
            self.stats.objects_found += 1;
        }

        // Objects defined directly in the file shadow compressed copies
        let mut compressed_catalogs = Vec::new();
        for object in self.scan.objects.values() {
            let Some(PdfObject::Stream(stream)) = &object.value else {
                continue;
            };
            if object.object_type != ObjectType::ObjStm {
                continue;
            }
            let object_stream = match ObjectStream::parse(stream, self.max_depth) {
                Ok(object_stream) => object_stream,
                Err(e) => {
                    tracing::debug!("Object stream {} unreadable: {}", object.number, e);
                    continue;
                }
            };
            for (index, (number, value)) in object_stream.objects().iter().enumerate() {
                if table.get_entry(*number).is_some() {
                    continue;
                }
                table.insert(
                    *number,
                    XRefEntry::Compressed {
                        stream_number: object.number,
                        index: index as u32,
                    },
                );
                self.stats.compressed_objects += 1;
                if value.as_dict().and_then(|d| d.get_type()) == Some("Catalog") {
                    compressed_catalogs.push(ObjectRef::new(*number, 0));
                }
            }
        }

        let trailer = self.find_trailer(&table, &compressed_catalogs)?;
        table.set_trailer(trailer);
        Ok(table)
    }

    /// Pick the last trailer whose root is live, else synthesize one
    fn find_trailer(
        &mut self,
        table: &XRefTable,
        compressed_catalogs: &[ObjectRef],
    ) -> ParseResult<PdfDictionary> {
        let size = table
            .iter()
            .map(|(number, _)| *number)
            .max()
            .map_or(1, |max| i64::from(max) + 1);

        let root_is_live = |dict: &PdfDictionary| {
            dict.get("Root")
                .and_then(|r| r.as_reference())
                .is_some_and(|r| table.get_entry(r.number).is_some_and(|e| e.is_in_use()))
        };

        let xref_stream_dicts = self.scan.objects.values().filter_map(|object| {
            match (&object.object_type, &object.value) {
                (ObjectType::XRef, Some(value)) => value.as_dict(),
                _ => None,
            }
        });

        let candidate = self
            .scan
            .trailers
            .iter()
            .rev()
            .chain(xref_stream_dicts.collect::<Vec<_>>().into_iter().rev())
            .find(|dict| root_is_live(dict));

        let mut trailer = PdfDictionary::new();
        trailer.insert("Size", size);

        if let Some(found) = candidate {
            for key in TRAILER_KEYS {
                if let Some(value) = found.get(key) {
                    trailer.insert(*key, value.clone());
                }
            }
            self.stats.trailer_found = true;
            return Ok(trailer);
        }

        let catalog = self
            .scan
            .objects
            .values()
            .filter(|object| object.object_type == ObjectType::Catalog)
            .map(|object| ObjectRef::new(object.number, object.generation))
            .chain(compressed_catalogs.iter().copied())
            .last()
            .ok_or_else(|| ParseError::InvalidTrailer("no document catalog found".to_string()))?;

        tracing::debug!("Synthesized trailer rooted at {}", catalog);
        trailer.insert("Root", catalog);
        Ok(trailer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rebuild_without_trailer_synthesizes_root() {
        let data = b"%PDF-1.4\n\
            1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n\
            2 0 obj << /Type /Pages /Kids [] /Count 0 >> endobj\n";
        let table = rebuild_xref(data, 256).unwrap();

        assert_eq!(table.len(), 2);
        let trailer = table.trailer().unwrap();
        assert_eq!(
            trailer.get("Root").unwrap().as_reference(),
            Some(ObjectRef::new(1, 0))
        );
        assert_eq!(trailer.get("Size").unwrap().as_integer(), Some(3));
    }

    #[test]
    fn test_rebuild_prefers_last_valid_trailer() {
        let data = b"%PDF-1.4\n\
            1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n\
            2 0 obj << /Type /Pages /Kids [] /Count 0 >> endobj\n\
            3 0 obj << /Producer (x) >> endobj\n\
            trailer << /Size 4 /Root 1 0 R /Info 3 0 R >>\n\
            trailer << /Size 4 /Root 9 0 R >>\n";
        let mut recovery = XRefRecovery::scan(data, 256);
        let table = recovery.build_xref_table().unwrap();
        let trailer = table.trailer().unwrap();

        // The last trailer names a missing root and is skipped
        assert_eq!(
            trailer.get("Info").unwrap().as_reference(),
            Some(ObjectRef::new(3, 0))
        );
        assert!(recovery.stats().trailer_found);
    }

    #[test]
    fn test_rebuild_expands_object_streams() {
        let header = "1 0 2 40 ";
        let body = format!(
            "{:<40}{}",
            "<< /Type /Catalog /Pages 2 0 R >>", "<< /Type /Pages /Kids [] /Count 0 >>"
        );
        let payload = format!("{header}{body}");
        let data = format!(
            "%PDF-1.5\n5 0 obj << /Type /ObjStm /N 2 /First {} /Length {} >>\nstream\n{}\nendstream\nendobj\n",
            header.len(),
            payload.len(),
            payload
        );

        let mut recovery = XRefRecovery::scan(data.as_bytes(), 256);
        let table = recovery.build_xref_table().unwrap();

        assert_eq!(
            table.get_entry(2),
            Some(&XRefEntry::Compressed {
                stream_number: 5,
                index: 1
            })
        );
        assert_eq!(recovery.stats().compressed_objects, 2);
        assert_eq!(
            table.trailer().unwrap().get("Root").unwrap().as_reference(),
            Some(ObjectRef::new(1, 0))
        );
    }

    #[test]
    fn test_rebuild_without_catalog_fails() {
        let data = b"%PDF-1.4\n1 0 obj << /Type /Pages >> endobj\n";
        assert!(matches!(
            rebuild_xref(data, 256),
            Err(ParseError::InvalidTrailer(_))
        ));
    }
}
