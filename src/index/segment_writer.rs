//! Builds one immutable segment in memory and flushes it to a directory.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use ahash::AHashMap;
use log::debug;

use crate::analysis::{Analyzer, KeywordAnalyzer, StandardAnalyzer};
use crate::document::document::validate_field;
use crate::document::field::Field;
use crate::document::field_value::{FieldKind, FieldValue, NumericValue};
use crate::document::Document;
use crate::error::{Result, TesseraError};
use crate::index::dictionary::{Term, TermDictionary, TermInfo};
use crate::index::directory::Directory;
use crate::index::doc_values::DocValuesWriter;
use crate::index::numeric::{encode_f64, encode_i64};
use crate::index::postings::{Posting, encode_postings};
use crate::index::segment::{
    DICT_EXTENSION, DOC_VALUES_EXTENSION, POSTINGS_EXTENSION, STORED_EXTENSION, SegmentMeta,
};
use crate::index::stored::write_stored;
use crate::index::{DocId, TERMINATED};
use crate::spatial::{cell_field, cell_terms};

/// Everything a document contributes, computed before the writer is touched.
struct AnalyzedDocument {
    terms: Vec<Term>,
    kinds: Vec<(String, FieldKind)>,
    doc_values: Vec<(String, NumericValue)>,
    boosts: BTreeMap<String, f32>,
    stored: Vec<Field>,
}

/// Accumulates documents for a single segment.
///
/// A rejected document leaves the writer untouched and does not consume a
/// doc id. `flush` consumes the writer.
pub struct SegmentWriter {
    name: String,
    spatial_levels: Vec<usize>,
    postings: AHashMap<Term, Vec<Posting>>,
    stored: Vec<Vec<Field>>,
    doc_values: DocValuesWriter,
    fields: BTreeMap<String, FieldKind>,
    text_analyzer: StandardAnalyzer,
    keyword_analyzer: KeywordAnalyzer,
}

impl std::fmt::Debug for SegmentWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentWriter")
            .field("name", &self.name)
            .field("num_docs", &self.stored.len())
            .field("num_terms", &self.postings.len())
            .field("fields", &self.fields)
            .finish()
    }
}

impl SegmentWriter {
    /// Start a segment. Geo fields are indexed at each of `spatial_levels`.
    pub fn new<S: Into<String>>(name: S, spatial_levels: Vec<usize>) -> Self {
        SegmentWriter {
            name: name.into(),
            spatial_levels,
            postings: AHashMap::new(),
            stored: Vec::new(),
            doc_values: DocValuesWriter::new(),
            fields: BTreeMap::new(),
            text_analyzer: StandardAnalyzer::new(),
            keyword_analyzer: KeywordAnalyzer::new(),
        }
    }

    /// Segment name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Documents buffered so far.
    pub fn num_docs(&self) -> u32 {
        self.stored.len() as u32
    }

    /// Check if no document was added.
    pub fn is_empty(&self) -> bool {
        self.stored.is_empty()
    }

    /// Kind registered for an indexed field.
    pub fn field_kind(&self, field: &str) -> Option<FieldKind> {
        self.fields.get(field).copied()
    }

    /// Add a document and return its segment-local doc id.
    pub fn add_document(&mut self, doc: &Document) -> Result<DocId> {
        let doc_id = self.stored.len() as DocId;
        if doc_id >= TERMINATED - 1 {
            return Err(TesseraError::index(format!(
                "segment {} is full",
                self.name
            )));
        }

        let analyzed = self.analyze(doc)?;

        for (field, kind) in analyzed.kinds {
            self.fields.entry(field).or_insert(kind);
        }
        for term in analyzed.terms {
            let postings = self.postings.entry(term).or_default();
            match postings.last_mut() {
                Some(last) if last.doc_id == doc_id => last.term_freq += 1,
                _ => postings.push(Posting::new(doc_id, 1)),
            }
        }
        for (field, value) in analyzed.doc_values {
            self.doc_values.add_value(doc_id, &field, value);
        }
        for (field, boost) in analyzed.boosts {
            if boost != 1.0 {
                self.doc_values.set_boost(doc_id, &field, boost);
            }
        }
        self.stored.push(analyzed.stored);

        Ok(doc_id)
    }

    /// Validate a document against the segment and compute its contribution.
    fn analyze(&self, doc: &Document) -> Result<AnalyzedDocument> {
        let mut analyzed = AnalyzedDocument {
            terms: Vec::new(),
            kinds: Vec::new(),
            doc_values: Vec::new(),
            boosts: BTreeMap::new(),
            stored: Vec::new(),
        };

        for field in doc.fields() {
            validate_field(field)?;
            let kind = field.value.kind();

            if field.options.indexed {
                let registered = self.fields.get(&field.name).copied().or_else(|| {
                    analyzed
                        .kinds
                        .iter()
                        .find(|(name, _)| name == &field.name)
                        .map(|&(_, kind)| kind)
                });
                match registered {
                    Some(existing) if existing != kind => {
                        return Err(TesseraError::validation(format!(
                            "field '{}' is {existing} in this segment, got {kind}",
                            field.name
                        )));
                    }
                    Some(_) => {}
                    None => analyzed.kinds.push((field.name.clone(), kind)),
                }

                self.field_terms(field, &mut analyzed.terms)?;
                *analyzed.boosts.entry(field.name.clone()).or_insert(1.0) *= field.boost;
            }

            if field.options.doc_value {
                let value = field.value.as_numeric().ok_or_else(|| {
                    TesseraError::validation(format!(
                        "doc value field '{}' must be numeric",
                        field.name
                    ))
                })?;
                if analyzed.doc_values.iter().any(|(name, _)| name == &field.name) {
                    return Err(TesseraError::validation(format!(
                        "field '{}' has more than one doc value",
                        field.name
                    )));
                }
                if let Some(is_float) = self.doc_values.column_is_float(&field.name) {
                    if is_float != value.is_float() {
                        return Err(TesseraError::validation(format!(
                            "doc value field '{}' mixes integer and floating point values",
                            field.name
                        )));
                    }
                }
                analyzed.doc_values.push((field.name.clone(), value));
            }

            if field.options.stored {
                analyzed.stored.push(field.clone());
            }
        }

        Ok(analyzed)
    }

    /// Terms produced by one indexed field.
    fn field_terms(&self, field: &Field, terms: &mut Vec<Term>) -> Result<()> {
        match &field.value {
            FieldValue::Text(text) => {
                let analyzer: &dyn Analyzer = if field.options.tokenized {
                    &self.text_analyzer
                } else {
                    &self.keyword_analyzer
                };
                terms.extend(
                    analyzer
                        .analyze(text)?
                        .map(|token| Term::new(field.name.as_str(), token.text)),
                );
            }
            FieldValue::Int32(v) => terms.push(Term::new(field.name.as_str(), encode_i64(*v as i64))),
            FieldValue::Int64(v) => terms.push(Term::new(field.name.as_str(), encode_i64(*v))),
            FieldValue::Double(v) => terms.push(Term::new(field.name.as_str(), encode_f64(*v))),
            FieldValue::Bytes(bytes) => {
                let mut hex = String::with_capacity(bytes.len() * 2);
                for byte in bytes {
                    let _ = write!(hex, "{byte:02x}");
                }
                terms.push(Term::new(field.name.as_str(), hex));
            }
            FieldValue::Geo(point) => {
                let namespace = cell_field(&field.name);
                for cell in cell_terms(point, &self.spatial_levels)? {
                    terms.push(Term::new(namespace.as_str(), cell));
                }
            }
        }
        Ok(())
    }

    /// Write the segment's four files and return its descriptor.
    pub fn flush(self, directory: &Directory) -> Result<SegmentMeta> {
        let meta = SegmentMeta {
            name: self.name,
            doc_count: self.stored.len() as u32,
            fields: self.fields,
        };

        let mut terms: Vec<(Term, Vec<Posting>)> = self.postings.into_iter().collect();
        terms.sort_unstable_by(|a, b| a.0.cmp(&b.0));

        let mut entries = Vec::with_capacity(terms.len());
        directory.write_file(&meta.file_name(POSTINGS_EXTENSION), |writer| {
            for (term, postings) in &terms {
                let offset = writer.position();
                encode_postings(postings, writer)?;
                entries.push((
                    term.clone(),
                    TermInfo {
                        doc_freq: postings.len() as u32,
                        offset,
                        length: writer.position() - offset,
                    },
                ));
            }
            Ok(())
        })?;

        let dictionary = TermDictionary::from_sorted(entries)?;
        directory.write_file(&meta.file_name(DICT_EXTENSION), |writer| {
            dictionary.write(writer)
        })?;
        directory.write_file(&meta.file_name(STORED_EXTENSION), |writer| {
            write_stored(&self.stored, writer)
        })?;
        directory.write_file(&meta.file_name(DOC_VALUES_EXTENSION), |writer| {
            self.doc_values.write(meta.doc_count, writer)
        })?;

        debug!(
            "flushed segment {} ({} docs, {} terms)",
            meta.name,
            meta.doc_count,
            dictionary.len()
        );
        Ok(meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::field::Store;
    use crate::spatial::GeoPoint;
    use crate::storage::memory::MemoryStorage;
    use crate::storage::traits::Storage;
    use std::sync::Arc;

    fn doc(fields: Vec<Field>) -> Document {
        Document::builder().add_all(fields).build().unwrap()
    }

    #[test]
    fn test_term_frequencies_accumulate() {
        let mut writer = SegmentWriter::new("seg_00000000", vec![4]);
        writer
            .add_document(&doc(vec![Field::text("body", "Hello hello world", Store::No)]))
            .unwrap();
        writer
            .add_document(&doc(vec![Field::text("body", "world", Store::No)]))
            .unwrap();

        let hello = &writer.postings[&Term::new("body", "hello")];
        assert_eq!(hello, &vec![Posting::new(0, 2)]);
        let world = &writer.postings[&Term::new("body", "world")];
        assert_eq!(world, &vec![Posting::new(0, 1), Posting::new(1, 1)]);
    }

    #[test]
    fn test_rejected_document_leaves_writer_unchanged() {
        let mut writer = SegmentWriter::new("seg_00000000", vec![4]);
        writer
            .add_document(&doc(vec![Field::int32("n", 1, Store::No)]))
            .unwrap();

        let bad = doc(vec![
            Field::text("other", "fresh", Store::No),
            Field::text("n", "one", Store::No),
        ]);
        let err = writer.add_document(&bad).unwrap_err();
        assert!(matches!(err, TesseraError::Validation(_)));
        assert_eq!(writer.num_docs(), 1);
        assert!(writer.field_kind("other").is_none());
        assert!(!writer.postings.contains_key(&Term::new("other", "fresh")));

        let id = writer
            .add_document(&doc(vec![Field::int32("n", 2, Store::No)]))
            .unwrap();
        assert_eq!(id, 1);
    }

    #[test]
    fn test_doc_value_int_float_mix_rejected() {
        let mut writer = SegmentWriter::new("seg_00000000", vec![4]);
        writer
            .add_document(&doc(vec![Field::numeric_doc_value("rank", 3)]))
            .unwrap();
        assert!(
            writer
                .add_document(&doc(vec![Field::numeric_doc_value("rank", 0.5)]))
                .is_err()
        );
    }

    #[test]
    fn test_geo_cells_use_reserved_namespace() {
        let mut writer = SegmentWriter::new("seg_00000000", vec![1, 2, 3]);
        let point = GeoPoint::new(1.0, 1.0).unwrap();
        writer
            .add_document(&doc(vec![Field::geo_point("loc", point, Store::No)]))
            .unwrap();

        for cell in ["s", "s0", "s00"] {
            assert!(writer.postings.contains_key(&Term::new("$geo:loc", cell)));
        }
        assert_eq!(writer.field_kind("loc"), Some(FieldKind::Geo));
    }

    #[test]
    fn test_flush_writes_four_files() {
        let storage = Arc::new(MemoryStorage::new_default());
        let directory = Directory::create_or_open(storage.clone());

        let mut writer = SegmentWriter::new("seg_00000007", vec![4]);
        writer
            .add_document(&doc(vec![
                Field::string("id", "a", Store::Yes),
                Field::text("title", "Rust search", Store::Yes).with_boost(2.0),
            ]))
            .unwrap();
        let meta = writer.flush(&directory).unwrap();

        assert_eq!(meta.doc_count, 1);
        assert_eq!(meta.fields.get("title"), Some(&FieldKind::Text));
        let mut files = meta.files();
        files.sort();
        assert_eq!(storage.list_files().unwrap(), files);
    }
}
