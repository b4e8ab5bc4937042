//! Sorted term dictionary.
//!
//! Terms are ordered by `(field, token)` using byte-wise string order. The
//! dictionary of a segment is loaded whole and searched by binary search;
//! each entry points at a posting list in the segment's `.post` file.

use std::io::Write;
use std::ops::Bound;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TesseraError};
use crate::storage::structured::{StructReader, StructWriter};

/// A term: a field name and a token within it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Term {
    pub field: String,
    pub token: String,
}

impl Term {
    /// Create a new term.
    pub fn new<F: Into<String>, T: Into<String>>(field: F, token: T) -> Self {
        Term {
            field: field.into(),
            token: token.into(),
        }
    }
}

impl std::fmt::Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.field, self.token)
    }
}

/// Where a term's posting list lives and how many documents it covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TermInfo {
    /// Number of documents containing the term in this segment.
    pub doc_freq: u32,
    /// Byte offset of the posting list in the postings body.
    pub offset: u64,
    /// Byte length of the posting list.
    pub length: u64,
}

/// A sorted, immutable term dictionary.
#[derive(Debug, Clone, Default)]
pub struct TermDictionary {
    entries: Vec<(Term, TermInfo)>,
}

impl TermDictionary {
    /// Build from entries already sorted by term.
    pub fn from_sorted(entries: Vec<(Term, TermInfo)>) -> Result<Self> {
        if let Some(pair) = entries.windows(2).find(|pair| pair[0].0 >= pair[1].0) {
            return Err(TesseraError::corruption(format!(
                "term dictionary out of order at '{}'",
                pair[1].0
            )));
        }
        Ok(TermDictionary { entries })
    }

    /// Number of terms.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the dictionary is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up one term.
    pub fn get(&self, field: &str, token: &str) -> Option<&TermInfo> {
        self.entries
            .binary_search_by(|(term, _)| {
                term.field
                    .as_str()
                    .cmp(field)
                    .then_with(|| term.token.as_str().cmp(token))
            })
            .ok()
            .map(|index| &self.entries[index].1)
    }

    /// All terms of a field, in token order.
    pub fn field_terms(&self, field: &str) -> &[(Term, TermInfo)] {
        let start = self
            .entries
            .partition_point(|(term, _)| term.field.as_str() < field);
        let end = start
            + self.entries[start..].partition_point(|(term, _)| term.field.as_str() == field);
        &self.entries[start..end]
    }

    /// Terms of a field whose tokens fall within the given bounds.
    pub fn range(&self, field: &str, lower: Bound<&str>, upper: Bound<&str>) -> &[(Term, TermInfo)] {
        let terms = self.field_terms(field);

        let start = match lower {
            Bound::Included(low) => terms.partition_point(|(t, _)| t.token.as_str() < low),
            Bound::Excluded(low) => terms.partition_point(|(t, _)| t.token.as_str() <= low),
            Bound::Unbounded => 0,
        };
        let end = match upper {
            Bound::Included(high) => terms.partition_point(|(t, _)| t.token.as_str() <= high),
            Bound::Excluded(high) => terms.partition_point(|(t, _)| t.token.as_str() < high),
            Bound::Unbounded => terms.len(),
        };

        if start >= end { &[] } else { &terms[start..end] }
    }

    /// Whether the field has any term at all.
    pub fn has_field(&self, field: &str) -> bool {
        !self.field_terms(field).is_empty()
    }

    /// Iterate over all entries in order.
    pub fn iter(&self) -> impl Iterator<Item = &(Term, TermInfo)> {
        self.entries.iter()
    }

    /// Serialize the dictionary.
    pub fn write<W: Write>(&self, writer: &mut StructWriter<W>) -> Result<()> {
        writer.write_varint(self.entries.len() as u64)?;
        for (term, info) in &self.entries {
            writer.write_string(&term.field)?;
            writer.write_string(&term.token)?;
            writer.write_varint(info.doc_freq as u64)?;
            writer.write_varint(info.offset)?;
            writer.write_varint(info.length)?;
        }
        Ok(())
    }

    /// Deserialize a dictionary, checking order and that every posting list
    /// lies inside a postings body of `postings_len` bytes.
    pub fn read(body: &[u8], postings_len: u64) -> Result<Self> {
        let mut reader = StructReader::new(body);
        let count = reader.read_varint()? as usize;
        let mut entries = Vec::with_capacity(count.min(body.len()));

        for _ in 0..count {
            let field = reader.read_string()?;
            let token = reader.read_string()?;
            let doc_freq = reader.read_varint()?;
            let offset = reader.read_varint()?;
            let length = reader.read_varint()?;

            if doc_freq == 0 || doc_freq > u32::MAX as u64 {
                return Err(TesseraError::corruption(format!(
                    "term {field}:{token} has invalid doc frequency {doc_freq}"
                )));
            }
            if offset.checked_add(length).is_none_or(|end| end > postings_len) {
                return Err(TesseraError::corruption(format!(
                    "term {field}:{token} points outside the postings file"
                )));
            }

            entries.push((
                Term { field, token },
                TermInfo {
                    doc_freq: doc_freq as u32,
                    offset,
                    length,
                },
            ));
        }

        if reader.position() != body.len() as u64 {
            return Err(TesseraError::corruption("trailing bytes after term dictionary"));
        }

        Self::from_sorted(entries)
    }
}
