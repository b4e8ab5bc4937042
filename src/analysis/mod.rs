//! Text analysis module for Tessera.
//!
//! Turns raw field text into the token sequence the segment writer indexes.

pub mod analyzer;
pub mod token;
pub mod token_filter;
pub mod tokenizer;

// Re-export commonly used types
pub use analyzer::*;
pub use token::*;
pub use token_filter::*;
pub use tokenizer::*;
