//! Base query trait and the per-segment evaluation context.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::error::{Result, TesseraError};
use crate::index::DocId;
use crate::index::dictionary::TermInfo;
use crate::index::reader::IndexReader;
use crate::index::segment_reader::SegmentReader;
use crate::query::matcher::{Matcher, PostingMatcher};

/// Trait for search queries.
///
/// A query is a description; evaluating it never changes it or the reader,
/// so one query may be run concurrently against any number of snapshots.
pub trait Query: Send + Sync + Debug {
    /// Check the query tree. Runs before any index access.
    fn validate(&self) -> Result<()>;

    /// Create a matcher over the segment `ctx` points at.
    fn matcher(&self, ctx: &SearchContext<'_>) -> Result<Box<dyn Matcher>>;

    /// Get the boost factor for this query.
    fn boost(&self) -> f32;

    /// Set the boost factor for this query.
    fn set_boost(&mut self, boost: f32);

    /// Get a human-readable description of this query.
    fn description(&self) -> String;

    /// Clone this query.
    fn clone_box(&self) -> Box<dyn Query>;

    /// Get the field name this query searches in, if applicable.
    /// Returns None for queries that don't target a specific field (e.g., BooleanQuery).
    fn field(&self) -> Option<&str> {
        None
    }
}

impl Clone for Box<dyn Query> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Boost and field checks shared by the query types.
pub(crate) fn validate_common(field: Option<&str>, boost: f32) -> Result<()> {
    if field.is_some_and(str::is_empty) {
        return Err(TesseraError::query_parse("field name must not be empty"));
    }
    if !boost.is_finite() || boost < 0.0 {
        return Err(TesseraError::query_parse(format!("invalid boost {boost}")));
    }
    Ok(())
}

/// State shared by the segment contexts of one search.
#[derive(Debug, Default)]
pub struct SearchState {
    visits: Arc<AtomicU64>,
    expansions: Mutex<HashMap<String, Arc<[String]>>>,
}

impl SearchState {
    /// Fresh state for a new search.
    pub fn new() -> Self {
        Self::default()
    }

    /// Postings visited so far.
    pub fn visited(&self) -> u64 {
        self.visits.load(Ordering::Relaxed)
    }
}

/// Everything a query needs to build the matcher of one segment.
#[derive(Debug, Clone)]
pub struct SearchContext<'a> {
    reader: &'a IndexReader,
    segment: usize,
    state: Arc<SearchState>,
}

impl<'a> SearchContext<'a> {
    /// Context for segment `segment` of `reader`.
    pub fn new(reader: &'a IndexReader, segment: usize, state: Arc<SearchState>) -> Self {
        SearchContext {
            reader,
            segment,
            state,
        }
    }

    /// The snapshot being searched.
    pub fn reader(&self) -> &'a IndexReader {
        self.reader
    }

    /// The segment being searched.
    pub fn segment(&self) -> &Arc<SegmentReader> {
        &self.reader.segments()[self.segment]
    }

    /// Global doc id of the segment's first document.
    pub fn doc_base(&self) -> DocId {
        self.reader.doc_base(self.segment)
    }

    /// Shared counter of postings visited by the search.
    pub fn visits(&self) -> &Arc<AtomicU64> {
        &self.state.visits
    }

    /// Postings visited so far.
    pub fn visited(&self) -> u64 {
        self.state.visited()
    }

    /// Snapshot-wide term expansion stored under `key`.
    ///
    /// `expand` runs for the first segment that asks; every other segment
    /// of the same search gets the stored terms.
    pub fn expansion<F>(&self, key: &str, expand: F) -> Arc<[String]>
    where
        F: FnOnce() -> Vec<String>,
    {
        let mut expansions = self.state.expansions.lock();
        Arc::clone(
            expansions
                .entry(key.to_string())
                .or_insert_with(|| expand().into()),
        )
    }

    /// `ln(1 + N / df)` over the whole snapshot; 0 for an absent term.
    pub fn idf(&self, field: &str, token: &str) -> f32 {
        let doc_freq = self.reader.doc_freq(field, token);
        if doc_freq == 0 {
            return 0.0;
        }
        (1.0 + self.reader.num_docs() as f64 / doc_freq as f64).ln() as f32
    }

    /// Matcher over one dictionary entry of the segment.
    ///
    /// Scores with the snapshot idf of `field:token` times `boost`, and the
    /// index-time boosts recorded for `boost_field`.
    pub fn posting_matcher(
        &self,
        field: &str,
        token: &str,
        info: &TermInfo,
        boost_field: &str,
        boost: f32,
    ) -> Result<Box<dyn Matcher>> {
        let segment = self.segment();
        let postings = segment.postings_for(info, self.doc_base())?;
        Ok(Box::new(PostingMatcher::new(
            postings,
            self.idf(field, token) * boost,
            Arc::clone(segment),
            boost_field,
            self.doc_base(),
            Arc::clone(&self.state.visits),
        )))
    }
}
