//! Top-K collection of scored documents.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};

use crate::index::DocId;

/// A matched document and its score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Global document id within the searched snapshot.
    pub doc_id: DocId,
    /// Relevance score.
    pub score: f32,
}

/// Heap entry ordered so that the worst hit is the greatest.
#[derive(Debug, Clone, Copy)]
struct Ranked(SearchHit);

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .0
            .score
            .total_cmp(&self.0.score)
            .then(self.0.doc_id.cmp(&other.0.doc_id))
    }
}

/// Keeps the `k` best hits: highest score first, ties by ascending doc id.
#[derive(Debug, Clone)]
pub struct TopDocsCollector {
    k: usize,
    heap: BinaryHeap<Ranked>,
    total_hits: u64,
}

impl TopDocsCollector {
    /// Create a collector for the `k` best hits.
    pub fn new(k: usize) -> Self {
        TopDocsCollector {
            k,
            heap: BinaryHeap::with_capacity(k.min(1024) + 1),
            total_hits: 0,
        }
    }

    /// Offer a matched document.
    pub fn collect(&mut self, doc_id: DocId, score: f32) {
        self.total_hits += 1;
        self.offer(Ranked(SearchHit { doc_id, score }));
    }

    fn offer(&mut self, hit: Ranked) {
        if self.k == 0 {
            return;
        }
        if self.heap.len() < self.k {
            self.heap.push(hit);
        } else if let Some(mut worst) = self.heap.peek_mut() {
            if hit < *worst {
                *worst = hit;
            }
        }
    }

    /// Number of documents offered so far.
    pub fn total_hits(&self) -> u64 {
        self.total_hits
    }

    /// Number of hits currently retained.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether no hit is retained.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Fold another collector's hits into this one.
    pub fn merge(&mut self, other: TopDocsCollector) {
        self.total_hits += other.total_hits;
        for hit in other.heap {
            self.offer(hit);
        }
    }

    /// Retained hits, best first.
    pub fn into_sorted(self) -> Vec<SearchHit> {
        self.heap.into_sorted_vec().into_iter().map(|r| r.0).collect()
    }
}
