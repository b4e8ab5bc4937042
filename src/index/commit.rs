//! Commit descriptors.
//!
//! A commit (generation) is a JSON document naming the segments that make up
//! the index at that point. It carries its own checksum over the serialized
//! segment list, and the file it is written to ends with the usual CRC32
//! trailer. The `CURRENT` pointer names the generation that is live.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TesseraError};
use crate::index::segment::SegmentMeta;

/// Name of the pointer file naming the current generation.
pub const CURRENT_FILE: &str = "CURRENT";

const COMMIT_PREFIX: &str = "commit_";

/// An immutable, numbered set of segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitDescriptor {
    /// Generation number, strictly increasing across commits.
    pub generation: u64,
    /// Segments in doc-base order.
    pub segments: Vec<SegmentMeta>,
    /// Counter the next new segment name is drawn from.
    pub next_segment: u64,
    /// Wall-clock time of the commit.
    pub committed_at: DateTime<Utc>,
    /// CRC32 over the JSON encoding of `segments`.
    pub checksum: u32,
}

impl CommitDescriptor {
    /// Build a descriptor, computing its checksum.
    pub fn new(generation: u64, segments: Vec<SegmentMeta>, next_segment: u64) -> Result<Self> {
        let checksum = segments_checksum(&segments)?;
        Ok(CommitDescriptor {
            generation,
            segments,
            next_segment,
            committed_at: Utc::now(),
            checksum,
        })
    }

    /// Total number of documents across all segments.
    pub fn doc_count(&self) -> u64 {
        self.segments.iter().map(|s| s.doc_count as u64).sum()
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Parse from JSON and check the segment-list checksum and generation.
    pub fn from_json(name: &str, expected_generation: u64, body: &[u8]) -> Result<Self> {
        let descriptor: CommitDescriptor = serde_json::from_slice(body)
            .map_err(|e| TesseraError::corruption(format!("{name}: malformed descriptor: {e}")))?;

        let actual = segments_checksum(&descriptor.segments)?;
        if actual != descriptor.checksum {
            return Err(TesseraError::corruption(format!(
                "{name}: segment list checksum mismatch (stored {:08x}, computed {actual:08x})",
                descriptor.checksum
            )));
        }
        if descriptor.generation != expected_generation {
            return Err(TesseraError::corruption(format!(
                "{name}: descriptor claims generation {}",
                descriptor.generation
            )));
        }

        Ok(descriptor)
    }
}

fn segments_checksum(segments: &[SegmentMeta]) -> Result<u32> {
    Ok(crc32fast::hash(&serde_json::to_vec(segments)?))
}

/// File name of the descriptor for a generation.
pub fn commit_file_name(generation: u64) -> String {
    format!("{COMMIT_PREFIX}{generation}")
}

/// Generation named by a descriptor file name.
pub fn parse_commit_file_name(name: &str) -> Option<u64> {
    let digits = name.strip_prefix(COMMIT_PREFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn segment(name: &str, docs: u32) -> SegmentMeta {
        SegmentMeta {
            name: name.to_string(),
            doc_count: docs,
            fields: BTreeMap::new(),
        }
    }

    #[test]
    fn test_json_roundtrip() {
        let descriptor =
            CommitDescriptor::new(3, vec![segment("seg_00000000", 2), segment("seg_00000001", 5)], 2)
                .unwrap();
        assert_eq!(descriptor.doc_count(), 7);

        let json = descriptor.to_json().unwrap();
        let parsed = CommitDescriptor::from_json("commit_3", 3, &json).unwrap();
        assert_eq!(parsed, descriptor);
    }

    #[test]
    fn test_tampered_segment_list_detected() {
        let mut descriptor = CommitDescriptor::new(1, vec![segment("seg_00000000", 2)], 1).unwrap();
        descriptor.segments[0].doc_count = 3;
        let json = descriptor.to_json().unwrap();

        let err = CommitDescriptor::from_json("commit_1", 1, &json).unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn test_generation_mismatch_detected() {
        let descriptor = CommitDescriptor::new(2, Vec::new(), 0).unwrap();
        let json = descriptor.to_json().unwrap();
        assert!(CommitDescriptor::from_json("commit_5", 5, &json).unwrap_err().is_corruption());
    }

    #[test]
    fn test_file_names() {
        assert_eq!(commit_file_name(12), "commit_12");
        assert_eq!(parse_commit_file_name("commit_12"), Some(12));
        assert_eq!(parse_commit_file_name("commit_12.tmp"), None);
        assert_eq!(parse_commit_file_name("commit_"), None);
        assert_eq!(parse_commit_file_name("CURRENT"), None);
    }
}
