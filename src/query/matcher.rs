//! Matchers: scored, forward-only cursors over the documents a query matches.
//!
//! A matcher is positioned on its first match as soon as it is built, and
//! reports [`TERMINATED`] once exhausted. Doc ids are global (segment doc
//! base applied). Every implementation yields strictly ascending doc ids.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt::Debug;
use std::ops::Bound;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use crate::document::field_value::NumericValue;
use crate::error::Result;
use crate::index::postings::{PostingsIterator, SegmentPostings};
use crate::index::segment_reader::SegmentReader;
use crate::index::{DocId, TERMINATED};

/// Trait for document matchers.
pub trait Matcher: Send + Debug {
    /// Current document, or [`TERMINATED`].
    fn doc_id(&self) -> DocId;

    /// Move to the next matching document.
    fn next(&mut self) -> Result<bool>;

    /// Move to the first match at or after `target`; never moves backwards.
    fn skip_to(&mut self, target: DocId) -> Result<bool>;

    /// Frequency of the matched term(s) in the current document.
    fn term_freq(&self) -> u32;

    /// Score of the current document.
    fn score(&self) -> f32;

    /// Upper bound on the number of documents this matcher can produce.
    fn cost(&self) -> u64;

    /// Check if this matcher is exhausted.
    fn is_exhausted(&self) -> bool {
        self.doc_id() == TERMINATED
    }
}

/// A matcher that matches no documents.
#[derive(Debug, Default)]
pub struct EmptyMatcher;

impl EmptyMatcher {
    /// Create a new empty matcher.
    pub fn new() -> Self {
        EmptyMatcher
    }

    /// Boxed empty matcher.
    pub fn boxed() -> Box<dyn Matcher> {
        Box::new(EmptyMatcher)
    }
}

impl Matcher for EmptyMatcher {
    fn doc_id(&self) -> DocId {
        TERMINATED
    }

    fn next(&mut self) -> Result<bool> {
        Ok(false)
    }

    fn skip_to(&mut self, _target: DocId) -> Result<bool> {
        Ok(false)
    }

    fn term_freq(&self) -> u32 {
        0
    }

    fn score(&self) -> f32 {
        0.0
    }

    fn cost(&self) -> u64 {
        0
    }
}

/// Matches the postings of one term in one segment.
///
/// Scores `tf * weight * field boost`, where the weight folds idf and the
/// query boost together.
#[derive(Debug)]
pub struct PostingMatcher {
    postings: SegmentPostings,
    weight: f32,
    segment: Arc<SegmentReader>,
    boost_field: String,
    doc_base: DocId,
    visits: Arc<AtomicU64>,
}

impl PostingMatcher {
    /// Create a new posting matcher. `boost_field` names the field whose
    /// index-time boosts apply.
    pub fn new(
        postings: SegmentPostings,
        weight: f32,
        segment: Arc<SegmentReader>,
        boost_field: &str,
        doc_base: DocId,
        visits: Arc<AtomicU64>,
    ) -> Self {
        if !postings.is_exhausted() {
            visits.fetch_add(1, AtomicOrdering::Relaxed);
        }
        PostingMatcher {
            postings,
            weight,
            segment,
            boost_field: boost_field.to_string(),
            doc_base,
            visits,
        }
    }

    fn visited(&self, found: bool) -> bool {
        if found {
            self.visits.fetch_add(1, AtomicOrdering::Relaxed);
        }
        found
    }
}

impl Matcher for PostingMatcher {
    fn doc_id(&self) -> DocId {
        self.postings.doc_id()
    }

    fn next(&mut self) -> Result<bool> {
        let found = self.postings.next();
        Ok(self.visited(found))
    }

    fn skip_to(&mut self, target: DocId) -> Result<bool> {
        if self.postings.doc_id() >= target {
            return Ok(!self.postings.is_exhausted());
        }
        let found = self.postings.advance_to(target);
        Ok(self.visited(found))
    }

    fn term_freq(&self) -> u32 {
        self.postings.term_freq()
    }

    fn score(&self) -> f32 {
        let doc = self.doc_id();
        if doc == TERMINATED {
            return 0.0;
        }
        let field_boost = self.segment.field_boost(&self.boost_field, doc - self.doc_base);
        self.postings.term_freq() as f32 * self.weight * field_boost
    }

    fn cost(&self) -> u64 {
        self.postings.len() as u64
    }
}

/// How a disjunction combines the matchers positioned on the same document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combine {
    /// Add scores and frequencies (boolean SHOULD).
    Sum,
    /// Keep the best score and the highest frequency (multi-term expansions).
    Max,
}

/// Heap entry ordered so the lowest doc id is on top.
#[derive(Debug)]
struct MatcherEntry {
    matcher: Box<dyn Matcher>,
}

impl PartialEq for MatcherEntry {
    fn eq(&self, other: &Self) -> bool {
        self.matcher.doc_id() == other.matcher.doc_id()
    }
}

impl Eq for MatcherEntry {}

impl PartialOrd for MatcherEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MatcherEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap: lower doc IDs come first
        other.matcher.doc_id().cmp(&self.matcher.doc_id())
    }
}

/// Union of matchers, driven by a min-heap of cursors.
///
/// Matchers sitting on the current document are kept out of the heap so the
/// current document can be scored without scanning it.
#[derive(Debug)]
pub struct DisjunctionMatcher {
    heap: BinaryHeap<MatcherEntry>,
    current: Vec<MatcherEntry>,
    combine: Combine,
    cost: u64,
}

impl DisjunctionMatcher {
    /// Create a new disjunction over `matchers`.
    pub fn new(matchers: Vec<Box<dyn Matcher>>, combine: Combine) -> Self {
        let cost = matchers.iter().map(|m| m.cost()).sum();
        let heap = matchers
            .into_iter()
            .filter(|matcher| !matcher.is_exhausted())
            .map(|matcher| MatcherEntry { matcher })
            .collect();

        let mut disjunction = DisjunctionMatcher {
            heap,
            current: Vec::new(),
            combine,
            cost,
        };
        disjunction.settle();
        disjunction
    }

    /// Pull every matcher on the lowest document into `current`.
    fn settle(&mut self) {
        let Some(top) = self.heap.pop() else {
            return;
        };
        let doc = top.matcher.doc_id();
        self.current.push(top);
        while self.heap.peek().is_some_and(|e| e.matcher.doc_id() == doc) {
            if let Some(entry) = self.heap.pop() {
                self.current.push(entry);
            }
        }
    }
}

impl Matcher for DisjunctionMatcher {
    fn doc_id(&self) -> DocId {
        self.current
            .first()
            .map_or(TERMINATED, |entry| entry.matcher.doc_id())
    }

    fn next(&mut self) -> Result<bool> {
        for mut entry in std::mem::take(&mut self.current) {
            if entry.matcher.next()? {
                self.heap.push(entry);
            }
        }
        self.settle();
        Ok(!self.is_exhausted())
    }

    fn skip_to(&mut self, target: DocId) -> Result<bool> {
        if self.doc_id() >= target {
            return Ok(!self.is_exhausted());
        }

        for mut entry in std::mem::take(&mut self.current) {
            if entry.matcher.skip_to(target)? {
                self.heap.push(entry);
            }
        }
        while self.heap.peek().is_some_and(|e| e.matcher.doc_id() < target) {
            if let Some(mut entry) = self.heap.pop() {
                if entry.matcher.skip_to(target)? {
                    self.heap.push(entry);
                }
            }
        }
        self.settle();
        Ok(!self.is_exhausted())
    }

    fn term_freq(&self) -> u32 {
        let freqs = self.current.iter().map(|e| e.matcher.term_freq());
        match self.combine {
            Combine::Sum => freqs.sum(),
            Combine::Max => freqs.max().unwrap_or(0),
        }
    }

    fn score(&self) -> f32 {
        let scores = self.current.iter().map(|e| e.matcher.score());
        match self.combine {
            Combine::Sum => scores.sum(),
            Combine::Max => scores.fold(0.0, f32::max),
        }
    }

    fn cost(&self) -> u64 {
        self.cost
    }
}

/// Intersection of matchers by leap-frogging `skip_to`, cheapest first.
#[derive(Debug)]
pub struct ConjunctionMatcher {
    matchers: Vec<Box<dyn Matcher>>,
    exhausted: bool,
}

impl ConjunctionMatcher {
    /// Create a new conjunction. An empty list matches nothing.
    pub fn new(mut matchers: Vec<Box<dyn Matcher>>) -> Result<Self> {
        matchers.sort_by_key(|m| m.cost());
        let mut conjunction = ConjunctionMatcher {
            exhausted: matchers.is_empty(),
            matchers,
        };
        conjunction.align()?;
        Ok(conjunction)
    }

    /// Advance until every matcher sits on the same document.
    fn align(&mut self) -> Result<bool> {
        if self.exhausted {
            return Ok(false);
        }

        'outer: loop {
            let target = self.matchers[0].doc_id();
            if target == TERMINATED {
                self.exhausted = true;
                return Ok(false);
            }

            for i in 1..self.matchers.len() {
                let matcher = &mut self.matchers[i];
                if matcher.doc_id() < target {
                    matcher.skip_to(target)?;
                }
                let doc = matcher.doc_id();
                if doc == TERMINATED {
                    self.exhausted = true;
                    return Ok(false);
                }
                if doc > target {
                    self.matchers[0].skip_to(doc)?;
                    continue 'outer;
                }
            }
            return Ok(true);
        }
    }
}

impl Matcher for ConjunctionMatcher {
    fn doc_id(&self) -> DocId {
        if self.exhausted {
            TERMINATED
        } else {
            self.matchers[0].doc_id()
        }
    }

    fn next(&mut self) -> Result<bool> {
        if self.exhausted {
            return Ok(false);
        }
        self.matchers[0].next()?;
        self.align()
    }

    fn skip_to(&mut self, target: DocId) -> Result<bool> {
        if self.exhausted {
            return Ok(false);
        }
        if self.doc_id() >= target {
            return Ok(true);
        }
        self.matchers[0].skip_to(target)?;
        self.align()
    }

    fn term_freq(&self) -> u32 {
        self.matchers.iter().map(|m| m.term_freq()).sum()
    }

    fn score(&self) -> f32 {
        self.matchers.iter().map(|m| m.score()).sum()
    }

    fn cost(&self) -> u64 {
        self.matchers.first().map_or(0, |m| m.cost())
    }
}

/// Documents of `include` that `exclude` does not match.
#[derive(Debug)]
pub struct ExclusionMatcher {
    include: Box<dyn Matcher>,
    exclude: Box<dyn Matcher>,
}

impl ExclusionMatcher {
    /// Create a new exclusion.
    pub fn new(include: Box<dyn Matcher>, exclude: Box<dyn Matcher>) -> Result<Self> {
        let mut exclusion = ExclusionMatcher { include, exclude };
        exclusion.settle()?;
        Ok(exclusion)
    }

    fn settle(&mut self) -> Result<bool> {
        loop {
            let doc = self.include.doc_id();
            if doc == TERMINATED {
                return Ok(false);
            }
            if self.exclude.doc_id() < doc {
                self.exclude.skip_to(doc)?;
            }
            if self.exclude.doc_id() != doc {
                return Ok(true);
            }
            self.include.next()?;
        }
    }
}

impl Matcher for ExclusionMatcher {
    fn doc_id(&self) -> DocId {
        self.include.doc_id()
    }

    fn next(&mut self) -> Result<bool> {
        if self.include.next()? {
            self.settle()
        } else {
            Ok(false)
        }
    }

    fn skip_to(&mut self, target: DocId) -> Result<bool> {
        if self.include.skip_to(target)? {
            self.settle()
        } else {
            Ok(false)
        }
    }

    fn term_freq(&self) -> u32 {
        self.include.term_freq()
    }

    fn score(&self) -> f32 {
        self.include.score()
    }

    fn cost(&self) -> u64 {
        self.include.cost()
    }
}

/// Documents of `required`, with `optional` adding to the score where it matches too.
#[derive(Debug)]
pub struct ReqOptMatcher {
    required: Box<dyn Matcher>,
    optional: Box<dyn Matcher>,
}

impl ReqOptMatcher {
    /// Create a new required/optional pair.
    pub fn new(required: Box<dyn Matcher>, optional: Box<dyn Matcher>) -> Result<Self> {
        let mut matcher = ReqOptMatcher { required, optional };
        matcher.sync_optional()?;
        Ok(matcher)
    }

    fn sync_optional(&mut self) -> Result<()> {
        let doc = self.required.doc_id();
        if doc != TERMINATED && self.optional.doc_id() < doc {
            self.optional.skip_to(doc)?;
        }
        Ok(())
    }

    fn optional_matches(&self) -> bool {
        let doc = self.required.doc_id();
        doc != TERMINATED && self.optional.doc_id() == doc
    }
}

impl Matcher for ReqOptMatcher {
    fn doc_id(&self) -> DocId {
        self.required.doc_id()
    }

    fn next(&mut self) -> Result<bool> {
        let found = self.required.next()?;
        self.sync_optional()?;
        Ok(found)
    }

    fn skip_to(&mut self, target: DocId) -> Result<bool> {
        let found = self.required.skip_to(target)?;
        self.sync_optional()?;
        Ok(found)
    }

    fn term_freq(&self) -> u32 {
        let optional = if self.optional_matches() {
            self.optional.term_freq()
        } else {
            0
        };
        self.required.term_freq() + optional
    }

    fn score(&self) -> f32 {
        let optional = if self.optional_matches() {
            self.optional.score()
        } else {
            0.0
        };
        self.required.score() + optional
    }

    fn cost(&self) -> u64 {
        self.required.cost()
    }
}

/// Multiplies the scores of another matcher.
#[derive(Debug)]
pub struct BoostMatcher {
    inner: Box<dyn Matcher>,
    boost: f32,
}

impl BoostMatcher {
    /// Wrap `inner`; a boost of 1.0 returns it unchanged.
    pub fn wrap(inner: Box<dyn Matcher>, boost: f32) -> Box<dyn Matcher> {
        if boost == 1.0 {
            inner
        } else {
            Box::new(BoostMatcher { inner, boost })
        }
    }
}

impl Matcher for BoostMatcher {
    fn doc_id(&self) -> DocId {
        self.inner.doc_id()
    }

    fn next(&mut self) -> Result<bool> {
        self.inner.next()
    }

    fn skip_to(&mut self, target: DocId) -> Result<bool> {
        self.inner.skip_to(target)
    }

    fn term_freq(&self) -> u32 {
        self.inner.term_freq()
    }

    fn score(&self) -> f32 {
        self.inner.score() * self.boost
    }

    fn cost(&self) -> u64 {
        self.inner.cost()
    }
}

/// Scans a segment's doc-value column for values inside a range.
///
/// Every match scores the constant query boost.
#[derive(Debug)]
pub struct DocValuesRangeMatcher {
    segment: Arc<SegmentReader>,
    field: String,
    lower: Bound<NumericValue>,
    upper: Bound<NumericValue>,
    doc_base: DocId,
    local: DocId,
    score: f32,
    visits: Arc<AtomicU64>,
}

impl DocValuesRangeMatcher {
    /// Create a new scan over `field` in `segment`.
    pub fn new(
        segment: Arc<SegmentReader>,
        field: &str,
        lower: Bound<NumericValue>,
        upper: Bound<NumericValue>,
        doc_base: DocId,
        score: f32,
        visits: Arc<AtomicU64>,
    ) -> Self {
        let mut matcher = DocValuesRangeMatcher {
            segment,
            field: field.to_string(),
            lower,
            upper,
            doc_base,
            local: 0,
            score,
            visits,
        };
        matcher.scan();
        matcher
    }

    fn in_range(&self, value: NumericValue) -> bool {
        let above = match self.lower {
            Bound::Included(low) => value.compare(&low).is_some_and(Ordering::is_ge),
            Bound::Excluded(low) => value.compare(&low).is_some_and(Ordering::is_gt),
            Bound::Unbounded => true,
        };
        let below = match self.upper {
            Bound::Included(high) => value.compare(&high).is_some_and(Ordering::is_le),
            Bound::Excluded(high) => value.compare(&high).is_some_and(Ordering::is_lt),
            Bound::Unbounded => true,
        };
        above && below
    }

    /// Move `local` forward to the next document whose value is in range.
    fn scan(&mut self) -> bool {
        let doc_count = self.segment.doc_count();
        while self.local < doc_count {
            self.visits.fetch_add(1, AtomicOrdering::Relaxed);
            if let Some(value) = self.segment.doc_value(&self.field, self.local) {
                if self.in_range(value) {
                    return true;
                }
            }
            self.local += 1;
        }
        false
    }
}

impl Matcher for DocValuesRangeMatcher {
    fn doc_id(&self) -> DocId {
        if self.local < self.segment.doc_count() {
            self.doc_base + self.local
        } else {
            TERMINATED
        }
    }

    fn next(&mut self) -> Result<bool> {
        if self.local < self.segment.doc_count() {
            self.local += 1;
        }
        Ok(self.scan())
    }

    fn skip_to(&mut self, target: DocId) -> Result<bool> {
        if self.doc_id() >= target {
            return Ok(!self.is_exhausted());
        }
        self.local = target.saturating_sub(self.doc_base).min(self.segment.doc_count());
        Ok(self.scan())
    }

    fn term_freq(&self) -> u32 {
        1
    }

    fn score(&self) -> f32 {
        if self.is_exhausted() { 0.0 } else { self.score }
    }

    fn cost(&self) -> u64 {
        self.segment.doc_count() as u64
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// In-memory matcher over fixed `(doc, score)` pairs.
    #[derive(Debug)]
    pub(crate) struct VecMatcher {
        docs: Vec<(DocId, f32)>,
        index: usize,
    }

    impl VecMatcher {
        pub(crate) fn boxed(docs: &[DocId]) -> Box<dyn Matcher> {
            Self::scored(&docs.iter().map(|&d| (d, 1.0)).collect::<Vec<_>>())
        }

        pub(crate) fn scored(docs: &[(DocId, f32)]) -> Box<dyn Matcher> {
            Box::new(VecMatcher {
                docs: docs.to_vec(),
                index: 0,
            })
        }
    }

    impl Matcher for VecMatcher {
        fn doc_id(&self) -> DocId {
            self.docs.get(self.index).map_or(TERMINATED, |d| d.0)
        }

        fn next(&mut self) -> Result<bool> {
            self.index = (self.index + 1).min(self.docs.len());
            Ok(self.index < self.docs.len())
        }

        fn skip_to(&mut self, target: DocId) -> Result<bool> {
            while self.doc_id() < target {
                self.index += 1;
            }
            Ok(!self.is_exhausted())
        }

        fn term_freq(&self) -> u32 {
            1
        }

        fn score(&self) -> f32 {
            self.docs.get(self.index).map_or(0.0, |d| d.1)
        }

        fn cost(&self) -> u64 {
            self.docs.len() as u64
        }
    }

    pub(crate) fn drain(matcher: &mut dyn Matcher) -> Vec<DocId> {
        let mut docs = Vec::new();
        while !matcher.is_exhausted() {
            docs.push(matcher.doc_id());
            matcher.next().unwrap();
        }
        docs
    }

    #[test]
    fn test_empty_matcher() {
        let mut matcher = EmptyMatcher::new();
        assert!(matcher.is_exhausted());
        assert!(!matcher.next().unwrap());
        assert!(!matcher.skip_to(5).unwrap());
    }

    #[test]
    fn test_disjunction_union_and_scores() {
        let mut sum = DisjunctionMatcher::new(
            vec![
                VecMatcher::scored(&[(1, 1.0), (4, 1.0)]),
                VecMatcher::scored(&[(1, 2.0), (3, 2.0)]),
                EmptyMatcher::boxed(),
            ],
            Combine::Sum,
        );
        assert_eq!(sum.doc_id(), 1);
        assert_eq!(sum.score(), 3.0);
        assert_eq!(sum.term_freq(), 2);
        assert_eq!(drain(&mut sum), vec![1, 3, 4]);

        let max = DisjunctionMatcher::new(
            vec![
                VecMatcher::scored(&[(1, 1.0)]),
                VecMatcher::scored(&[(1, 2.0)]),
            ],
            Combine::Max,
        );
        assert_eq!(max.score(), 2.0);
        assert_eq!(max.term_freq(), 1);
    }

    #[test]
    fn test_disjunction_skip_to() {
        let mut matcher = DisjunctionMatcher::new(
            vec![VecMatcher::boxed(&[1, 5, 9]), VecMatcher::boxed(&[2, 6])],
            Combine::Sum,
        );
        assert!(matcher.skip_to(6).unwrap());
        assert_eq!(matcher.doc_id(), 6);
        assert!(matcher.skip_to(3).unwrap());
        assert_eq!(matcher.doc_id(), 6);
        assert_eq!(drain(&mut matcher), vec![6, 9]);
    }

    #[test]
    fn test_conjunction_leapfrog() {
        let mut matcher = ConjunctionMatcher::new(vec![
            VecMatcher::boxed(&[1, 2, 5, 8, 9, 12]),
            VecMatcher::boxed(&[2, 3, 8, 12, 20]),
            VecMatcher::boxed(&[0, 2, 8, 9, 12]),
        ])
        .unwrap();
        assert_eq!(drain(&mut matcher), vec![2, 8, 12]);

        let mut empty =
            ConjunctionMatcher::new(vec![VecMatcher::boxed(&[1]), EmptyMatcher::boxed()]).unwrap();
        assert!(empty.is_exhausted());
        assert!(drain(&mut empty).is_empty());
    }

    #[test]
    fn test_exclusion() {
        let mut matcher =
            ExclusionMatcher::new(VecMatcher::boxed(&[1, 2, 3, 4, 5]), VecMatcher::boxed(&[1, 3, 4]))
                .unwrap();
        assert_eq!(drain(&mut matcher), vec![2, 5]);
    }

    #[test]
    fn test_req_opt_adds_score_only() {
        let mut matcher = ReqOptMatcher::new(
            VecMatcher::scored(&[(1, 1.0), (3, 1.0)]),
            VecMatcher::scored(&[(2, 5.0), (3, 5.0)]),
        )
        .unwrap();
        assert_eq!(matcher.doc_id(), 1);
        assert_eq!(matcher.score(), 1.0);
        assert!(matcher.next().unwrap());
        assert_eq!(matcher.doc_id(), 3);
        assert_eq!(matcher.score(), 6.0);
        assert!(!matcher.next().unwrap());
    }

    #[test]
    fn test_boost_matcher() {
        let matcher = BoostMatcher::wrap(VecMatcher::scored(&[(0, 2.0)]), 1.5);
        assert_eq!(matcher.score(), 3.0);
    }
}
