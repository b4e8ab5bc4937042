//! Read-only view over one flushed segment.

use log::debug;

use crate::document::field::Field;
use crate::document::field_value::{FieldKind, NumericValue};
use crate::error::{Result, TesseraError};
use crate::index::DocId;
use crate::index::dictionary::{TermDictionary, TermInfo};
use crate::index::directory::Directory;
use crate::index::doc_values::{DocValuesColumn, DocValuesReader};
use crate::index::postings::{SegmentPostings, decode_postings};
use crate::index::segment::{
    DICT_EXTENSION, DOC_VALUES_EXTENSION, POSTINGS_EXTENSION, STORED_EXTENSION, SegmentMeta,
};
use crate::index::stored::StoredFieldsReader;

/// A segment loaded from its four verified files.
#[derive(Debug)]
pub struct SegmentReader {
    meta: SegmentMeta,
    dictionary: TermDictionary,
    postings: Vec<u8>,
    stored: StoredFieldsReader,
    doc_values: DocValuesReader,
}

impl SegmentReader {
    /// Open a segment, verifying the checksum of every file.
    pub fn open(directory: &Directory, meta: SegmentMeta) -> Result<Self> {
        let postings = directory.read_verified(&meta.file_name(POSTINGS_EXTENSION))?;
        let dictionary_body = directory.read_verified(&meta.file_name(DICT_EXTENSION))?;
        let dictionary = TermDictionary::read(&dictionary_body, postings.len() as u64)?;

        let stored_body = directory.read_verified(&meta.file_name(STORED_EXTENSION))?;
        let stored = StoredFieldsReader::open(stored_body, meta.doc_count)?;

        let doc_values_body = directory.read_verified(&meta.file_name(DOC_VALUES_EXTENSION))?;
        let doc_values = DocValuesReader::open(&doc_values_body, meta.doc_count)?;

        debug!(
            "opened segment {} ({} docs, {} terms)",
            meta.name,
            meta.doc_count,
            dictionary.len()
        );

        Ok(SegmentReader {
            meta,
            dictionary,
            postings,
            stored,
            doc_values,
        })
    }

    /// The segment's descriptor.
    pub fn meta(&self) -> &SegmentMeta {
        &self.meta
    }

    /// Number of documents in the segment.
    pub fn doc_count(&self) -> u32 {
        self.meta.doc_count
    }

    /// Kind of an indexed field, if the segment has it.
    pub fn field_kind(&self, field: &str) -> Option<FieldKind> {
        self.meta.fields.get(field).copied()
    }

    /// The term dictionary.
    pub fn dictionary(&self) -> &TermDictionary {
        &self.dictionary
    }

    /// Number of documents in the segment containing a term.
    pub fn doc_freq(&self, field: &str, token: &str) -> u32 {
        self.dictionary.get(field, token).map_or(0, |info| info.doc_freq)
    }

    /// Postings of a term, shifted by `doc_base`.
    pub fn postings(&self, field: &str, token: &str, doc_base: DocId) -> Result<Option<SegmentPostings>> {
        match self.dictionary.get(field, token) {
            Some(info) => self.postings_for(info, doc_base).map(Some),
            None => Ok(None),
        }
    }

    /// Decode the posting list a dictionary entry points at.
    pub fn postings_for(&self, info: &TermInfo, doc_base: DocId) -> Result<SegmentPostings> {
        let start = info.offset as usize;
        let end = start + info.length as usize;
        let postings = decode_postings(&self.postings[start..end])?;

        if postings.len() != info.doc_freq as usize {
            return Err(TesseraError::corruption(format!(
                "segment {}: posting list holds {} docs, dictionary says {}",
                self.meta.name,
                postings.len(),
                info.doc_freq
            )));
        }
        if postings.last().is_some_and(|p| p.doc_id >= self.meta.doc_count) {
            return Err(TesseraError::corruption(format!(
                "segment {}: posting beyond doc count {}",
                self.meta.name, self.meta.doc_count
            )));
        }

        Ok(SegmentPostings::new(postings, doc_base))
    }

    /// Stored fields of a segment-local doc id.
    pub fn stored_fields(&self, doc: DocId) -> Result<Vec<Field>> {
        self.stored.document(doc)
    }

    /// Doc-value of a segment-local doc id.
    pub fn doc_value(&self, field: &str, doc: DocId) -> Option<NumericValue> {
        self.doc_values.get(field, doc)
    }

    /// The doc-value column of a field.
    pub fn doc_values_column(&self, field: &str) -> Option<&DocValuesColumn> {
        self.doc_values.column(field)
    }

    /// Index-time boost of a field in a segment-local doc id.
    pub fn field_boost(&self, field: &str, doc: DocId) -> f32 {
        self.doc_values.boost(field, doc)
    }
}
