//! Term query implementation.

use crate::error::Result;
use crate::query::matcher::{EmptyMatcher, Matcher};
use crate::query::query::{Query, SearchContext, validate_common};

/// A query that matches documents containing a specific term.
///
/// The token is looked up as given: analyzed text fields index lowercase
/// tokens, keyword fields index their value whole.
#[derive(Debug, Clone)]
pub struct TermQuery {
    field: String,
    token: String,
    boost: f32,
}

impl TermQuery {
    /// Create a new term query.
    pub fn new<F: Into<String>, T: Into<String>>(field: F, token: T) -> Self {
        TermQuery {
            field: field.into(),
            token: token.into(),
            boost: 1.0,
        }
    }

    /// Set the boost for this query.
    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    /// Get the token.
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl Query for TermQuery {
    fn validate(&self) -> Result<()> {
        validate_common(Some(&self.field), self.boost)
    }

    fn matcher(&self, ctx: &SearchContext<'_>) -> Result<Box<dyn Matcher>> {
        match ctx.segment().dictionary().get(&self.field, &self.token) {
            Some(info) => {
                ctx.posting_matcher(&self.field, &self.token, info, &self.field, self.boost)
            }
            None => Ok(EmptyMatcher::boxed()),
        }
    }

    fn boost(&self) -> f32 {
        self.boost
    }

    fn set_boost(&mut self, boost: f32) {
        self.boost = boost;
    }

    fn description(&self) -> String {
        if self.boost == 1.0 {
            format!("{}:{}", self.field, self.token)
        } else {
            format!("{}:{}^{}", self.field, self.token, self.boost)
        }
    }

    fn clone_box(&self) -> Box<dyn Query> {
        Box::new(self.clone())
    }

    fn field(&self) -> Option<&str> {
        Some(&self.field)
    }
}
