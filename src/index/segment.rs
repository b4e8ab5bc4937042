//! Segment descriptors and file naming.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::document::field_value::FieldKind;

/// Extension of the term dictionary file.
pub const DICT_EXTENSION: &str = "dict";
/// Extension of the postings file.
pub const POSTINGS_EXTENSION: &str = "post";
/// Extension of the stored-field file.
pub const STORED_EXTENSION: &str = "stor";
/// Extension of the doc-values file.
pub const DOC_VALUES_EXTENSION: &str = "dv";

const EXTENSIONS: [&str; 4] = [
    DICT_EXTENSION,
    POSTINGS_EXTENSION,
    STORED_EXTENSION,
    DOC_VALUES_EXTENSION,
];

/// Immutable description of a flushed segment, as recorded in a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentMeta {
    /// Segment name; file names derive from it.
    pub name: String,
    /// Number of documents in the segment.
    pub doc_count: u32,
    /// Kind of every indexed field in the segment.
    pub fields: BTreeMap<String, FieldKind>,
}

impl SegmentMeta {
    /// Name of the file with the given extension.
    pub fn file_name(&self, extension: &str) -> String {
        segment_file_name(&self.name, extension)
    }

    /// All files making up the segment.
    pub fn files(&self) -> Vec<String> {
        EXTENSIONS.iter().map(|ext| self.file_name(ext)).collect()
    }
}

/// Name for the segment with the given counter value.
pub fn segment_name(counter: u64) -> String {
    format!("seg_{counter:08}")
}

/// Name of a segment file.
pub fn segment_file_name(segment: &str, extension: &str) -> String {
    format!("{segment}.{extension}")
}

/// Segment name a file belongs to, if it is a segment file.
pub fn segment_of_file(file: &str) -> Option<&str> {
    let (stem, extension) = file.rsplit_once('.')?;
    (stem.starts_with("seg_") && EXTENSIONS.contains(&extension)).then_some(stem)
}
