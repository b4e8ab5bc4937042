//! Boolean query implementation for combining multiple queries.

use crate::error::{Result, TesseraError};
use crate::query::matcher::{
    BoostMatcher, Combine, ConjunctionMatcher, DisjunctionMatcher, EmptyMatcher, ExclusionMatcher,
    Matcher, ReqOptMatcher,
};
use crate::query::query::{Query, SearchContext, validate_common};

/// Occurrence requirements for boolean clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occur {
    /// The clause must match (equivalent to AND).
    Must,
    /// The clause should match (equivalent to OR).
    Should,
    /// The clause must not match (equivalent to NOT).
    MustNot,
}

/// A clause in a boolean query.
#[derive(Debug, Clone)]
pub struct BooleanClause {
    /// The query for this clause.
    pub query: Box<dyn Query>,
    /// The occurrence requirement.
    pub occur: Occur,
}

impl BooleanClause {
    /// Create a new boolean clause.
    pub fn new(query: Box<dyn Query>, occur: Occur) -> Self {
        BooleanClause { query, occur }
    }
}

/// A boolean query that combines multiple queries with boolean logic.
///
/// MUST clauses are intersected and MUST_NOT clauses subtracted. SHOULD
/// clauses form a union when there is no MUST clause; next to MUST clauses
/// they are optional and only add to the score, so `+a b` matches every
/// document with `a`, ranking those that also have `b` first.
#[derive(Debug, Clone)]
pub struct BooleanQuery {
    clauses: Vec<BooleanClause>,
    boost: f32,
}

impl BooleanQuery {
    /// Create a new empty boolean query.
    pub fn new() -> Self {
        BooleanQuery {
            clauses: Vec::new(),
            boost: 1.0,
        }
    }

    /// Start building a boolean query.
    pub fn builder() -> BooleanQueryBuilder {
        BooleanQueryBuilder::new()
    }

    /// Add a clause to this boolean query.
    pub fn add_clause(&mut self, clause: BooleanClause) {
        self.clauses.push(clause);
    }

    /// Add a MUST clause.
    pub fn add_must(&mut self, query: Box<dyn Query>) {
        self.add_clause(BooleanClause::new(query, Occur::Must));
    }

    /// Add a SHOULD clause.
    pub fn add_should(&mut self, query: Box<dyn Query>) {
        self.add_clause(BooleanClause::new(query, Occur::Should));
    }

    /// Add a MUST_NOT clause.
    pub fn add_must_not(&mut self, query: Box<dyn Query>) {
        self.add_clause(BooleanClause::new(query, Occur::MustNot));
    }

    /// Set the boost factor.
    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    /// Get the clauses.
    pub fn clauses(&self) -> &[BooleanClause] {
        &self.clauses
    }

    /// Check if this query is empty.
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    fn matchers(&self, ctx: &SearchContext<'_>, occur: Occur) -> Result<Vec<Box<dyn Matcher>>> {
        self.clauses
            .iter()
            .filter(|clause| clause.occur == occur)
            .map(|clause| clause.query.matcher(ctx))
            .collect()
    }
}

impl Default for BooleanQuery {
    fn default() -> Self {
        Self::new()
    }
}

fn union(mut matchers: Vec<Box<dyn Matcher>>) -> Box<dyn Matcher> {
    match matchers.len() {
        0 => EmptyMatcher::boxed(),
        1 => matchers.remove(0),
        _ => Box::new(DisjunctionMatcher::new(matchers, Combine::Sum)),
    }
}

impl Query for BooleanQuery {
    fn validate(&self) -> Result<()> {
        validate_common(None, self.boost)?;
        if self.clauses.is_empty() {
            return Err(TesseraError::query_parse("boolean query has no clauses"));
        }
        if self.clauses.iter().all(|c| c.occur == Occur::MustNot) {
            return Err(TesseraError::query_parse(
                "boolean query has only MUST_NOT clauses",
            ));
        }
        self.clauses.iter().try_for_each(|c| c.query.validate())
    }

    fn matcher(&self, ctx: &SearchContext<'_>) -> Result<Box<dyn Matcher>> {
        let mut musts = self.matchers(ctx, Occur::Must)?;
        let shoulds = self.matchers(ctx, Occur::Should)?;
        let must_nots = self.matchers(ctx, Occur::MustNot)?;

        let positive: Box<dyn Matcher> = if musts.is_empty() {
            union(shoulds)
        } else {
            let required: Box<dyn Matcher> = if musts.len() == 1 {
                musts.remove(0)
            } else {
                Box::new(ConjunctionMatcher::new(musts)?)
            };
            if shoulds.is_empty() {
                required
            } else {
                Box::new(ReqOptMatcher::new(required, union(shoulds))?)
            }
        };

        let matcher: Box<dyn Matcher> = if must_nots.is_empty() {
            positive
        } else {
            Box::new(ExclusionMatcher::new(positive, union(must_nots))?)
        };

        Ok(BoostMatcher::wrap(matcher, self.boost))
    }

    fn boost(&self) -> f32 {
        self.boost
    }

    fn set_boost(&mut self, boost: f32) {
        self.boost = boost;
    }

    fn description(&self) -> String {
        let clauses: Vec<String> = self
            .clauses
            .iter()
            .map(|clause| {
                let prefix = match clause.occur {
                    Occur::Must => "+",
                    Occur::Should => "",
                    Occur::MustNot => "-",
                };
                format!("{prefix}{}", clause.query.description())
            })
            .collect();

        if self.boost == 1.0 {
            format!("({})", clauses.join(" "))
        } else {
            format!("({})^{}", clauses.join(" "), self.boost)
        }
    }

    fn clone_box(&self) -> Box<dyn Query> {
        Box::new(self.clone())
    }
}

/// Builder for boolean queries.
#[derive(Debug, Default)]
pub struct BooleanQueryBuilder {
    query: BooleanQuery,
}

impl BooleanQueryBuilder {
    /// Create a new boolean query builder.
    pub fn new() -> Self {
        BooleanQueryBuilder {
            query: BooleanQuery::new(),
        }
    }

    /// Add a MUST clause.
    pub fn must<Q: Query + 'static>(mut self, query: Q) -> Self {
        self.query.add_must(Box::new(query));
        self
    }

    /// Add a SHOULD clause.
    pub fn should<Q: Query + 'static>(mut self, query: Q) -> Self {
        self.query.add_should(Box::new(query));
        self
    }

    /// Add a MUST_NOT clause.
    pub fn must_not<Q: Query + 'static>(mut self, query: Q) -> Self {
        self.query.add_must_not(Box::new(query));
        self
    }

    /// Set the boost factor.
    pub fn boost(mut self, boost: f32) -> Self {
        self.query = self.query.with_boost(boost);
        self
    }

    /// Build the boolean query.
    pub fn build(self) -> BooleanQuery {
        self.query
    }
}
