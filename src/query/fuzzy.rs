//! Fuzzy query implementation for approximate string matching.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{Result, TesseraError};
use crate::query::matcher::{Combine, DisjunctionMatcher, EmptyMatcher, Matcher};
use crate::query::query::{Query, SearchContext, validate_common};
use crate::util::levenshtein::levenshtein_distance_threshold;

/// Largest supported edit distance.
pub const MAX_EDITS: u32 = 2;

/// Default cap on the number of dictionary terms a fuzzy query expands to.
pub const DEFAULT_MAX_EXPANSIONS: usize = 50;

/// Documents containing a term within a Levenshtein distance of the query term.
///
/// Expansion runs over the whole snapshot's dictionary, so every segment
/// uses the same set of terms. When more terms qualify than
/// `max_expansions`, the closest ones win, ties broken by term order.
#[derive(Debug, Clone)]
pub struct FuzzyQuery {
    field: String,
    term: String,
    max_edits: u32,
    prefix_length: usize,
    max_expansions: usize,
    boost: f32,
}

impl FuzzyQuery {
    /// Create a new fuzzy query.
    pub fn new<F: Into<String>, T: Into<String>>(field: F, term: T, max_edits: u32) -> Self {
        FuzzyQuery {
            field: field.into(),
            term: term.into(),
            max_edits,
            prefix_length: 0,
            max_expansions: DEFAULT_MAX_EXPANSIONS,
            boost: 1.0,
        }
    }

    /// Number of leading characters that must match exactly.
    pub fn prefix_length(mut self, prefix_length: usize) -> Self {
        self.prefix_length = prefix_length;
        self
    }

    /// Set the maximum number of terms to expand to.
    pub fn max_expansions(mut self, max_expansions: usize) -> Self {
        self.max_expansions = max_expansions;
        self
    }

    /// Set the boost factor for this query.
    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    /// Get the search term.
    pub fn term(&self) -> &str {
        &self.term
    }

    /// Get the maximum edit distance.
    pub fn max_edits(&self) -> u32 {
        self.max_edits
    }

    /// Dictionary terms the query expands to in a snapshot.
    pub fn expand(&self, ctx: &SearchContext<'_>) -> Vec<String> {
        let prefix: String = self.term.chars().take(self.prefix_length).collect();
        let mut candidates: BTreeMap<String, usize> = BTreeMap::new();

        for segment in ctx.reader().segments() {
            for (term, _) in segment.dictionary().field_terms(&self.field) {
                if candidates.contains_key(&term.token) || !term.token.starts_with(&prefix) {
                    continue;
                }
                if let Some(distance) =
                    levenshtein_distance_threshold(&self.term, &term.token, self.max_edits as usize)
                {
                    candidates.insert(term.token.clone(), distance);
                }
            }
        }

        let mut ranked: Vec<(usize, String)> =
            candidates.into_iter().map(|(token, d)| (d, token)).collect();
        ranked.sort();
        ranked.truncate(self.max_expansions);
        ranked.into_iter().map(|(_, token)| token).collect()
    }

    fn expansion_key(&self) -> String {
        format!(
            "fuzzy:{}:{}~{}/{}/{}",
            self.field, self.term, self.max_edits, self.prefix_length, self.max_expansions
        )
    }

    /// The expansion shared by all segments of the current search.
    fn shared_expansion(&self, ctx: &SearchContext<'_>) -> Arc<[String]> {
        ctx.expansion(&self.expansion_key(), || self.expand(ctx))
    }
}

impl Query for FuzzyQuery {
    fn validate(&self) -> Result<()> {
        validate_common(Some(&self.field), self.boost)?;
        if self.max_edits > MAX_EDITS {
            return Err(TesseraError::query_parse(format!(
                "fuzzy edit distance {} exceeds {MAX_EDITS}",
                self.max_edits
            )));
        }
        if self.max_expansions == 0 {
            return Err(TesseraError::query_parse("fuzzy max_expansions must be at least 1"));
        }
        Ok(())
    }

    fn matcher(&self, ctx: &SearchContext<'_>) -> Result<Box<dyn Matcher>> {
        let dictionary = ctx.segment().dictionary();

        let mut matchers = Vec::new();
        for token in self.shared_expansion(ctx).iter() {
            if let Some(info) = dictionary.get(&self.field, token) {
                matchers.push(ctx.posting_matcher(&self.field, token, info, &self.field, self.boost)?);
            }
        }

        Ok(match matchers.len() {
            0 => EmptyMatcher::boxed(),
            1 => matchers.remove(0),
            _ => Box::new(DisjunctionMatcher::new(matchers, Combine::Max)),
        })
    }

    fn boost(&self) -> f32 {
        self.boost
    }

    fn set_boost(&mut self, boost: f32) {
        self.boost = boost;
    }

    fn description(&self) -> String {
        format!("{}:{}~{}", self.field, self.term, self.max_edits)
    }

    fn clone_box(&self) -> Box<dyn Query> {
        Box::new(self.clone())
    }

    fn field(&self) -> Option<&str> {
        Some(&self.field)
    }
}
