//! Point-in-time snapshot over a committed generation.

use std::sync::Arc;

use log::debug;

use crate::document::Document;
use crate::document::field_value::{FieldKind, NumericValue};
use crate::error::{Result, TesseraError};
use crate::index::DocId;
use crate::index::directory::{Directory, GenerationGuard};
use crate::index::postings::{ChainedPostings, PostingsIterator};
use crate::index::segment_reader::SegmentReader;

/// A read-only snapshot of one generation.
///
/// The generation is registered with the directory for as long as the
/// reader lives, so it cannot be deleted underneath it. Later commits are
/// not visible; call [`IndexReader::reload`] for a newer snapshot.
#[derive(Debug)]
pub struct IndexReader {
    directory: Directory,
    generation: u64,
    segments: Vec<Arc<SegmentReader>>,
    doc_bases: Vec<DocId>,
    num_docs: u64,
    _guard: Option<GenerationGuard>,
}

impl IndexReader {
    /// Open the current generation, or an empty snapshot if nothing was committed.
    pub fn open(directory: &Directory) -> Result<Self> {
        match Self::acquire_current(directory)? {
            Some(guard) => Self::load(directory, guard, &[]),
            None => Ok(Self::empty(directory)),
        }
    }

    /// Open a specific published generation.
    ///
    /// Fails for a generation that was deleted or never became current.
    pub fn open_generation(directory: &Directory, generation: u64) -> Result<Self> {
        let guard = directory.acquire(generation);
        if !directory.list_generations()?.contains(&generation) {
            return Err(TesseraError::index(format!(
                "generation {generation} is not a published generation"
            )));
        }
        Self::load(directory, guard, &[])
    }

    /// Snapshot of the directory's current generation.
    ///
    /// Returns a reader of the same generation when nothing new was
    /// committed. Segments shared with this snapshot are not re-read.
    pub fn reload(&self) -> Result<Self> {
        match Self::acquire_current(&self.directory)? {
            Some(guard) => Self::load(&self.directory, guard, &self.segments),
            None => Ok(Self::empty(&self.directory)),
        }
    }

    /// Register the current generation.
    ///
    /// A commit may supersede and delete the generation between reading
    /// `CURRENT` and registering it, so the pointer is read again once the
    /// guard is held and the registration is retried when it moved.
    fn acquire_current(directory: &Directory) -> Result<Option<GenerationGuard>> {
        let Some(mut generation) = directory.current_generation()? else {
            return Ok(None);
        };
        loop {
            let guard = directory.acquire(generation);
            match directory.current_generation()? {
                Some(current) if current == generation => return Ok(Some(guard)),
                Some(current) => {
                    debug!("generation {generation} was superseded by {current} while opening");
                    generation = current;
                }
                None => {
                    return Err(TesseraError::corruption("CURRENT disappeared"));
                }
            }
        }
    }

    fn empty(directory: &Directory) -> Self {
        IndexReader {
            directory: directory.clone(),
            generation: 0,
            segments: Vec::new(),
            doc_bases: Vec::new(),
            num_docs: 0,
            _guard: None,
        }
    }

    fn load(
        directory: &Directory,
        guard: GenerationGuard,
        previous: &[Arc<SegmentReader>],
    ) -> Result<Self> {
        let generation = guard.generation();
        let descriptor = directory.read_commit(generation)?;

        let mut segments = Vec::with_capacity(descriptor.segments.len());
        let mut doc_bases = Vec::with_capacity(descriptor.segments.len());
        let mut num_docs: u64 = 0;

        for meta in descriptor.segments {
            if num_docs + meta.doc_count as u64 >= DocId::MAX as u64 {
                return Err(TesseraError::corruption(format!(
                    "generation {generation} holds more documents than doc ids"
                )));
            }
            doc_bases.push(num_docs as DocId);
            num_docs += meta.doc_count as u64;

            let reused = previous.iter().find(|segment| segment.meta() == &meta);
            let segment = match reused {
                Some(segment) => Arc::clone(segment),
                None => Arc::new(SegmentReader::open(directory, meta)?),
            };
            segments.push(segment);
        }

        debug!(
            "opened generation {generation} ({} segments, {num_docs} docs)",
            segments.len()
        );

        Ok(IndexReader {
            directory: directory.clone(),
            generation,
            segments,
            doc_bases,
            num_docs,
            _guard: Some(guard),
        })
    }

    /// The snapshot's generation (0 for an empty directory).
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Total number of documents.
    pub fn num_docs(&self) -> u64 {
        self.num_docs
    }

    /// The directory the snapshot was read from.
    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    /// Segments in doc-base order.
    pub fn segments(&self) -> &[Arc<SegmentReader>] {
        &self.segments
    }

    /// First global doc id of a segment.
    pub fn doc_base(&self, segment: usize) -> DocId {
        self.doc_bases[segment]
    }

    /// Segment index and local id of a global doc id.
    pub fn locate(&self, doc: DocId) -> Option<(usize, DocId)> {
        if doc as u64 >= self.num_docs {
            return None;
        }
        let segment = self.doc_bases.partition_point(|&base| base <= doc) - 1;
        Some((segment, doc - self.doc_bases[segment]))
    }

    /// Kind of an indexed field, taken from the first segment that has it.
    pub fn field_kind(&self, field: &str) -> Option<FieldKind> {
        self.segments.iter().find_map(|s| s.field_kind(field))
    }

    /// Postings of a term across all segments, in global doc ids.
    pub fn lookup_term(&self, field: &str, token: &str) -> Result<Option<Box<dyn PostingsIterator>>> {
        let mut parts = Vec::new();
        for (segment, &base) in self.segments.iter().zip(&self.doc_bases) {
            if let Some(postings) = segment.postings(field, token, base)? {
                parts.push(postings);
            }
        }
        if parts.is_empty() {
            return Ok(None);
        }
        Ok(Some(Box::new(ChainedPostings::new(parts))))
    }

    /// Number of documents containing a term.
    pub fn doc_freq(&self, field: &str, token: &str) -> u64 {
        self.segments
            .iter()
            .map(|segment| segment.doc_freq(field, token) as u64)
            .sum()
    }

    /// Stored fields of a document.
    pub fn stored_fields(&self, doc: DocId) -> Result<Document> {
        let (segment, local) = self
            .locate(doc)
            .ok_or_else(|| TesseraError::index(format!("doc id {doc} out of range")))?;
        let fields = self.segments[segment].stored_fields(local)?;
        Ok(Document::from_fields(fields))
    }

    /// Doc-value of a document.
    pub fn doc_value(&self, field: &str, doc: DocId) -> Option<NumericValue> {
        let (segment, local) = self.locate(doc)?;
        self.segments[segment].doc_value(field, local)
    }
}
