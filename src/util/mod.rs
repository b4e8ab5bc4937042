//! Utility modules for Tessera.

pub mod levenshtein;
pub mod varint;
