//! Analyzer implementations that combine tokenizers and filters.

#[allow(clippy::module_inception)]
mod analyzer;
mod keyword;
mod pipeline;
mod standard;

pub use analyzer::Analyzer;
pub use keyword::KeywordAnalyzer;
pub use pipeline::PipelineAnalyzer;
pub use standard::StandardAnalyzer;
