//! Query execution over a snapshot.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use log::{debug, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::SearchConfig;
use crate::document::Document;
use crate::error::Result;
use crate::index::{DocId, IndexReader, TERMINATED};
use crate::query::{Query, SearchContext, SearchState};
use crate::search::collector::{SearchHit, TopDocsCollector};

/// Documents between two deadline checks.
const DEADLINE_CHECK_INTERVAL: u32 = 256;

/// Limits for a single search.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Stop evaluating once this instant has passed.
    pub deadline: Option<Instant>,

    /// Stop once more postings than this have been visited. Falls back to
    /// [`SearchConfig::max_postings`] when unset.
    pub max_postings: Option<u64>,
}

impl SearchOptions {
    /// Stop after `timeout` from now.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Stop at `deadline`.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Cap the number of postings visited.
    pub fn with_max_postings(mut self, max_postings: u64) -> Self {
        self.max_postings = Some(max_postings);
        self
    }
}

/// Result of a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopDocs {
    /// Best hits, highest score first, ties by ascending doc id.
    pub hits: Vec<SearchHit>,

    /// Matches seen during evaluation.
    pub total_hits: u64,

    /// False when a deadline or budget stopped evaluation early; `hits` then
    /// only reflects the documents seen before the stop.
    pub complete: bool,
}

/// Why evaluation of a segment stopped before exhausting its matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    Deadline,
    Budget,
}

/// Executes queries against one [`IndexReader`] snapshot.
#[derive(Debug, Clone)]
pub struct IndexSearcher {
    reader: Arc<IndexReader>,
    config: SearchConfig,
}

impl IndexSearcher {
    /// Create a searcher over `reader`.
    pub fn new(reader: Arc<IndexReader>, config: SearchConfig) -> Self {
        IndexSearcher { reader, config }
    }

    /// The searched snapshot.
    pub fn reader(&self) -> &Arc<IndexReader> {
        &self.reader
    }

    /// The searcher's configuration.
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Search with the configured default top-K and no deadline.
    pub fn search_default(&self, query: &dyn Query) -> Result<TopDocs> {
        self.search(query, self.config.default_top_k, &SearchOptions::default())
    }

    /// Evaluate `query` and return its `top_k` best hits.
    ///
    /// The query is validated before any index access. Deadline and budget
    /// interruptions are not errors: the partial result comes back with
    /// `complete` set to false.
    pub fn search(&self, query: &dyn Query, top_k: usize, options: &SearchOptions) -> Result<TopDocs> {
        query.validate()?;

        let budget = options.max_postings.or(self.config.max_postings);
        let state = Arc::new(SearchState::new());
        let stop = AtomicBool::new(false);
        let segments = self.reader.segments().len();

        let run = |segment: usize| {
            self.search_segment(query, segment, top_k, options.deadline, budget, &state, &stop)
        };

        let outcomes: Vec<(TopDocsCollector, Option<Interrupt>)> = if self.config.parallel {
            (0..segments).into_par_iter().map(run).collect::<Result<_>>()?
        } else {
            (0..segments).map(run).collect::<Result<_>>()?
        };

        let mut collector = TopDocsCollector::new(top_k);
        let mut interrupt = None;
        for (segment_collector, segment_interrupt) in outcomes {
            collector.merge(segment_collector);
            interrupt = interrupt.or(segment_interrupt);
        }

        match interrupt {
            Some(Interrupt::Deadline) => warn!(
                "search for {} stopped at its deadline after {} hits",
                query.description(),
                collector.total_hits()
            ),
            Some(Interrupt::Budget) => warn!(
                "search for {} stopped after visiting {} postings (budget {})",
                query.description(),
                state.visited(),
                budget.unwrap_or_default()
            ),
            None => debug!(
                "search for {} matched {} documents in generation {}",
                query.description(),
                collector.total_hits(),
                self.reader.generation()
            ),
        }

        Ok(TopDocs {
            total_hits: collector.total_hits(),
            hits: collector.into_sorted(),
            complete: interrupt.is_none(),
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn search_segment(
        &self,
        query: &dyn Query,
        segment: usize,
        top_k: usize,
        deadline: Option<Instant>,
        budget: Option<u64>,
        state: &Arc<SearchState>,
        stop: &AtomicBool,
    ) -> Result<(TopDocsCollector, Option<Interrupt>)> {
        let expired = || deadline.is_some_and(|d| Instant::now() >= d);
        // Another segment's interruption stops this one with the same cause.
        let stopped_elsewhere = || {
            if expired() {
                Interrupt::Deadline
            } else {
                Interrupt::Budget
            }
        };

        let mut collector = TopDocsCollector::new(top_k);
        if stop.load(Ordering::Relaxed) {
            return Ok((collector, Some(stopped_elsewhere())));
        }

        let ctx = SearchContext::new(&self.reader, segment, Arc::clone(state));
        let mut matcher = query.matcher(&ctx)?;
        let mut since_check = 0u32;

        while matcher.doc_id() != TERMINATED {
            if since_check % DEADLINE_CHECK_INTERVAL == 0 && expired() {
                stop.store(true, Ordering::Relaxed);
                return Ok((collector, Some(Interrupt::Deadline)));
            }
            if budget.is_some_and(|max| ctx.visited() > max) {
                stop.store(true, Ordering::Relaxed);
                return Ok((collector, Some(Interrupt::Budget)));
            }
            if stop.load(Ordering::Relaxed) {
                return Ok((collector, Some(stopped_elsewhere())));
            }

            collector.collect(matcher.doc_id(), matcher.score());
            since_check = since_check.wrapping_add(1);

            if !matcher.next()? {
                break;
            }
        }

        Ok((collector, None))
    }

    /// Stored fields of a hit.
    pub fn doc(&self, doc_id: DocId) -> Result<Document> {
        self.reader.stored_fields(doc_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WriterConfig;
    use crate::document::{Field, Store};
    use crate::index::{Directory, IndexWriter};
    use crate::query::TermQuery;
    use crate::storage::memory::MemoryStorage;

    fn reader_with(bodies: &[&str]) -> Arc<IndexReader> {
        let directory = Directory::create_or_open(Arc::new(MemoryStorage::new_default()));
        let mut writer = IndexWriter::open(directory.clone(), WriterConfig::default()).unwrap();
        for body in bodies {
            let doc = Document::builder()
                .add(Field::text("body", *body, Store::No))
                .build()
                .unwrap();
            writer.add_document(&doc).unwrap();
        }
        writer.commit().unwrap();
        Arc::new(IndexReader::open(&directory).unwrap())
    }

    #[test]
    fn test_search_orders_hits() {
        let reader = reader_with(&["rust rust rust", "rust", "java", "rust rust"]);
        let searcher = IndexSearcher::new(reader, SearchConfig::default());

        let top = searcher
            .search(&TermQuery::new("body", "rust"), 10, &SearchOptions::default())
            .unwrap();
        assert!(top.complete);
        assert_eq!(top.total_hits, 3);
        let ids: Vec<DocId> = top.hits.iter().map(|h| h.doc_id).collect();
        assert_eq!(ids, vec![0, 3, 1]);
    }

    #[test]
    fn test_interrupted_search_is_incomplete() {
        let bodies: Vec<String> = (0..50).map(|i| format!("common doc{i}")).collect();
        let bodies: Vec<&str> = bodies.iter().map(String::as_str).collect();
        let searcher = IndexSearcher::new(reader_with(&bodies), SearchConfig::default());

        let expired = SearchOptions::default().with_deadline(Instant::now());
        let top = searcher.search(&TermQuery::new("body", "common"), 5, &expired).unwrap();
        assert!(!top.complete);
        assert_eq!(top.total_hits, 0);

        let limited = SearchOptions::default().with_max_postings(10);
        let top = searcher.search(&TermQuery::new("body", "common"), 5, &limited).unwrap();
        assert!(!top.complete);
        assert!(top.total_hits < 50);
        assert!(top.hits.len() <= 5);

        let top = searcher
            .search(&TermQuery::new("body", "common"), 5, &SearchOptions::default())
            .unwrap();
        assert!(top.complete);
        assert_eq!(top.total_hits, 50);
    }

    #[test]
    fn test_invalid_query_rejected_before_search() {
        let searcher = IndexSearcher::new(reader_with(&["a"]), SearchConfig::default());
        let err = searcher
            .search(&TermQuery::new("", "a"), 5, &SearchOptions::default())
            .unwrap_err();
        assert!(matches!(err, crate::error::TesseraError::QueryParse(_)));
    }
}
