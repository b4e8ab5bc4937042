//! Keyword analyzer that treats the entire input as a single token.
//!
//! Used for untokenized string fields: the value is indexed exactly as
//! given, case included.
//!
//! # Examples
//!
//! ```
//! use tessera::analysis::analyzer::{Analyzer, KeywordAnalyzer};
//!
//! let analyzer = KeywordAnalyzer::new();
//! let tokens: Vec<_> = analyzer.analyze("user-123-ABC").unwrap().collect();
//!
//! assert_eq!(tokens.len(), 1);
//! assert_eq!(tokens[0].text, "user-123-ABC");
//! ```

use std::sync::Arc;

use crate::analysis::analyzer::analyzer::Analyzer;
use crate::analysis::analyzer::pipeline::PipelineAnalyzer;
use crate::analysis::token::TokenStream;
use crate::analysis::tokenizer::WholeTokenizer;
use crate::error::Result;

/// A keyword analyzer that treats the entire input as a single token.
#[derive(Debug, Clone)]
pub struct KeywordAnalyzer {
    inner: PipelineAnalyzer,
}

impl KeywordAnalyzer {
    /// Create a new keyword analyzer.
    pub fn new() -> Self {
        KeywordAnalyzer {
            inner: PipelineAnalyzer::new(Arc::new(WholeTokenizer::new())).with_name("keyword"),
        }
    }
}

impl Default for KeywordAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer for KeywordAnalyzer {
    fn analyze(&self, text: &str) -> Result<TokenStream> {
        self.inner.analyze(text)
    }

    fn name(&self) -> &'static str {
        "keyword"
    }
}
