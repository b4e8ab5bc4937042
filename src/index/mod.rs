//! Inverted index: segment formats, the commit protocol, the writer and reader.
//!
//! A directory holds immutable segments and numbered commits naming sets of
//! them. [`IndexWriter`] buffers documents into new segments and publishes
//! commits; [`IndexReader`] opens one commit as a snapshot.

pub mod commit;
pub mod dictionary;
pub mod directory;
pub mod doc_values;
pub mod numeric;
pub mod postings;
pub mod reader;
pub mod segment;
pub mod segment_reader;
pub mod segment_writer;
pub mod stored;
pub mod writer;

/// Document identifier.
///
/// Segment-local ids count from 0 in add order; a global id adds the doc
/// base of its segment within a snapshot.
pub type DocId = u32;

/// Doc id of an exhausted iterator.
pub const TERMINATED: DocId = u32::MAX;

pub use commit::CommitDescriptor;
pub use dictionary::{Term, TermDictionary, TermInfo};
pub use directory::{Directory, GenerationGuard};
pub use postings::{Posting, PostingsIterator};
pub use reader::IndexReader;
pub use segment::SegmentMeta;
pub use segment_reader::SegmentReader;
pub use segment_writer::SegmentWriter;
pub use writer::IndexWriter;
