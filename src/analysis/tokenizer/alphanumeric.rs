//! Tokenizer that splits on every non-alphanumeric character.

use super::Tokenizer;

use crate::analysis::token::{Token, TokenStream};
use crate::error::Result;

/// A tokenizer emitting maximal runs of alphanumeric characters.
///
/// "Alphanumeric" follows [`char::is_alphanumeric`], so letters and digits
/// of any script count. Everything else is a separator and never produces
/// an empty token.
#[derive(Clone, Debug, Default)]
pub struct AlphanumericTokenizer;

impl AlphanumericTokenizer {
    /// Create a new alphanumeric tokenizer.
    pub fn new() -> Self {
        AlphanumericTokenizer
    }
}

impl Tokenizer for AlphanumericTokenizer {
    fn tokenize(&self, text: &str) -> Result<TokenStream> {
        Ok(Box::new(AlphanumericTokens {
            text: text.to_string(),
            cursor: 0,
            position: 0,
        }))
    }

    fn name(&self) -> &'static str {
        "alphanumeric"
    }
}

struct AlphanumericTokens {
    text: String,
    cursor: usize,
    position: usize,
}

impl Iterator for AlphanumericTokens {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        let rest = &self.text[self.cursor..];

        let (skip, _) = rest.char_indices().find(|(_, c)| c.is_alphanumeric())?;
        let start = self.cursor + skip;

        let len = self.text[start..]
            .char_indices()
            .find(|(_, c)| !c.is_alphanumeric())
            .map(|(i, _)| i)
            .unwrap_or(self.text.len() - start);
        let end = start + len;

        let token = Token::with_offsets(&self.text[start..end], self.position, start, end);
        self.cursor = end;
        self.position += 1;
        Some(token)
    }
}
