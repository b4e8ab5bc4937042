//! Posting lists: encoding, decoding and iteration.
//!
//! On disk a posting list is a varint count followed by `(doc delta, term
//! frequency)` varint pairs. The first delta is taken from zero; every later
//! delta must be non-zero, which is how strictly increasing doc ids are
//! enforced when a list is decoded.

use std::io::Write;
use std::sync::Arc;

use crate::error::{Result, TesseraError};
use crate::index::{DocId, TERMINATED};
use crate::storage::structured::{StructReader, StructWriter};

/// A single posting in a posting list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Posting {
    /// Document ID.
    pub doc_id: DocId,
    /// Term frequency in the document.
    pub term_freq: u32,
}

impl Posting {
    /// Create a posting with frequency.
    pub fn new(doc_id: DocId, term_freq: u32) -> Self {
        Posting { doc_id, term_freq }
    }
}

/// Append a posting list to `writer`.
///
/// The caller guarantees ascending, duplicate-free doc ids.
pub fn encode_postings<W: Write>(postings: &[Posting], writer: &mut StructWriter<W>) -> Result<()> {
    writer.write_varint(postings.len() as u64)?;

    let mut previous = 0;
    for (i, posting) in postings.iter().enumerate() {
        debug_assert!(i == 0 || posting.doc_id > previous);
        writer.write_varint((posting.doc_id - previous) as u64)?;
        writer.write_varint(posting.term_freq as u64)?;
        previous = posting.doc_id;
    }

    Ok(())
}

/// Decode a posting list, rejecting out-of-order or duplicate doc ids.
pub fn decode_postings(bytes: &[u8]) -> Result<Vec<Posting>> {
    let mut reader = StructReader::new(bytes);
    let count = reader.read_varint()? as usize;
    // Every posting takes at least two bytes.
    if count > bytes.len() / 2 {
        return Err(TesseraError::corruption(format!(
            "posting count {count} exceeds list size {}",
            bytes.len()
        )));
    }

    let mut postings = Vec::with_capacity(count);
    let mut previous: u64 = 0;

    for i in 0..count {
        let delta = reader.read_varint()?;
        if i > 0 && delta == 0 {
            return Err(TesseraError::corruption(format!(
                "posting list repeats doc id {previous}"
            )));
        }
        let doc_id = previous + delta;
        if doc_id >= TERMINATED as u64 {
            return Err(TesseraError::corruption(format!(
                "doc id {doc_id} out of range"
            )));
        }
        let term_freq = reader.read_varint()?;
        if term_freq == 0 || term_freq > u32::MAX as u64 {
            return Err(TesseraError::corruption(format!(
                "invalid term frequency {term_freq} for doc {doc_id}"
            )));
        }

        postings.push(Posting::new(doc_id as DocId, term_freq as u32));
        previous = doc_id;
    }

    Ok(postings)
}

/// Ascending enumeration of `(doc id, term frequency)` pairs.
///
/// An iterator starts positioned on its first posting (or on
/// [`TERMINATED`] when empty). Iterators are restarted by looking the term
/// up again.
pub trait PostingsIterator: Send {
    /// Current doc id, or [`TERMINATED`] once exhausted.
    fn doc_id(&self) -> DocId;

    /// Term frequency at the current doc id.
    fn term_freq(&self) -> u32;

    /// Move to the next posting. Returns false once exhausted.
    fn next(&mut self) -> bool;

    /// Move to the first posting with doc id `>= target`.
    ///
    /// Never moves backwards: if the current doc id is already at or past
    /// `target` this is a no-op. Returns false once exhausted.
    fn advance_to(&mut self, target: DocId) -> bool;

    /// Number of postings in the whole list.
    fn len(&self) -> usize;

    /// Whether the list has no postings at all.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the iterator has moved past its last posting.
    fn is_exhausted(&self) -> bool {
        self.doc_id() == TERMINATED
    }
}

/// Postings of one term within one segment, offset by the segment's doc base.
#[derive(Debug, Clone)]
pub struct SegmentPostings {
    postings: Arc<[Posting]>,
    index: usize,
    doc_base: DocId,
}

impl SegmentPostings {
    /// Wrap decoded postings.
    pub fn new(postings: Vec<Posting>, doc_base: DocId) -> Self {
        SegmentPostings {
            postings: postings.into(),
            index: 0,
            doc_base,
        }
    }
}

impl PostingsIterator for SegmentPostings {
    fn doc_id(&self) -> DocId {
        match self.postings.get(self.index) {
            Some(posting) => posting.doc_id + self.doc_base,
            None => TERMINATED,
        }
    }

    fn term_freq(&self) -> u32 {
        self.postings.get(self.index).map_or(0, |p| p.term_freq)
    }

    fn next(&mut self) -> bool {
        if self.index < self.postings.len() {
            self.index += 1;
        }
        self.index < self.postings.len()
    }

    fn advance_to(&mut self, target: DocId) -> bool {
        if self.doc_id() >= target {
            return !self.is_exhausted();
        }
        let local = target.saturating_sub(self.doc_base);
        let rest = &self.postings[self.index..];
        self.index += rest.partition_point(|p| p.doc_id < local);
        self.index < self.postings.len()
    }

    fn len(&self) -> usize {
        self.postings.len()
    }
}

/// Concatenation of per-segment iterators with increasing doc bases.
pub struct ChainedPostings {
    parts: Vec<SegmentPostings>,
    current: usize,
    len: usize,
}

impl ChainedPostings {
    /// Chain segment iterators; empty parts are skipped.
    pub fn new(parts: Vec<SegmentPostings>) -> Self {
        let parts: Vec<SegmentPostings> = parts.into_iter().filter(|p| !p.is_empty()).collect();
        let len = parts.iter().map(|p| p.len()).sum();
        ChainedPostings {
            parts,
            current: 0,
            len,
        }
    }

    fn settle(&mut self) {
        while self.current < self.parts.len() && self.parts[self.current].is_exhausted() {
            self.current += 1;
        }
    }
}

impl PostingsIterator for ChainedPostings {
    fn doc_id(&self) -> DocId {
        self.parts
            .get(self.current)
            .map_or(TERMINATED, |part| part.doc_id())
    }

    fn term_freq(&self) -> u32 {
        self.parts
            .get(self.current)
            .map_or(0, |part| part.term_freq())
    }

    fn next(&mut self) -> bool {
        if let Some(part) = self.parts.get_mut(self.current) {
            part.next();
            self.settle();
        }
        !self.is_exhausted()
    }

    fn advance_to(&mut self, target: DocId) -> bool {
        while let Some(part) = self.parts.get_mut(self.current) {
            if part.advance_to(target) {
                return true;
            }
            self.current += 1;
        }
        false
    }

    fn len(&self) -> usize {
        self.len
    }
}
