//! Configuration for writers, searches and storage.
//!
//! Every struct has sensible defaults and deserializes from partial JSON, so
//! a configuration file only needs to name what it changes.
//!
//! ```
//! use tessera::config::IndexConfig;
//!
//! let config = IndexConfig::from_json_str(r#"{ "search": { "parallel": true } }"#).unwrap();
//! assert!(config.search.parallel);
//! assert_eq!(config.writer.spatial_levels.len(), 11);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TesseraError};
use crate::spatial::MAX_PRECISION;
use crate::storage::traits::StorageConfig;

/// Settings of an [`IndexWriter`](crate::index::IndexWriter).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Geohash precisions at which geo fields are indexed.
    pub spatial_levels: Vec<usize>,

    /// Documents buffered before the current segment is flushed.
    pub max_buffered_docs: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        WriterConfig {
            spatial_levels: (1..=11).collect(),
            max_buffered_docs: 10_000,
        }
    }
}

impl WriterConfig {
    /// Check the settings.
    pub fn validate(&self) -> Result<()> {
        if let Some(&level) = self
            .spatial_levels
            .iter()
            .find(|&&level| level == 0 || level > MAX_PRECISION)
        {
            return Err(TesseraError::invalid_config(format!(
                "spatial level {level} is outside 1..={MAX_PRECISION}"
            )));
        }
        if self.max_buffered_docs == 0 {
            return Err(TesseraError::invalid_config(
                "max_buffered_docs must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Settings of an [`IndexSearcher`](crate::search::IndexSearcher).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Number of hits returned when the caller does not say.
    pub default_top_k: usize,

    /// Search segments on the rayon thread pool.
    pub parallel: bool,

    /// Default cap on postings visited per search.
    pub max_postings: Option<u64>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            default_top_k: 10,
            parallel: false,
            max_postings: None,
        }
    }
}

/// Complete configuration of an index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub storage: StorageConfig,
    pub writer: WriterConfig,
    pub search: SearchConfig,
}

impl IndexConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: IndexConfig = serde_json::from_str(json)
            .map_err(|e| TesseraError::invalid_config(format!("malformed configuration: {e}")))?;
        config.writer.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = IndexConfig::default();
        assert_eq!(config.writer.spatial_levels, (1..=11).collect::<Vec<_>>());
        assert_eq!(config.search.default_top_k, 10);
        assert!(!config.search.parallel);
        assert!(config.writer.validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let config = IndexConfig::from_json_str(
            r#"{ "writer": { "spatial_levels": [4, 8] }, "search": { "max_postings": 100 } }"#,
        )
        .unwrap();
        assert_eq!(config.writer.spatial_levels, vec![4, 8]);
        assert_eq!(config.writer.max_buffered_docs, 10_000);
        assert_eq!(config.search.max_postings, Some(100));
    }

    #[test]
    fn test_invalid_levels_rejected() {
        assert!(IndexConfig::from_json_str(r#"{ "writer": { "spatial_levels": [13] } }"#).is_err());
        assert!(IndexConfig::from_json_str(r#"{ "writer": { "max_buffered_docs": 0 } }"#).is_err());
        assert!(IndexConfig::from_json_str("not json").is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        std::fs::write(&path, r#"{ "search": { "default_top_k": 3 } }"#).unwrap();
        assert_eq!(IndexConfig::from_json_file(&path).unwrap().search.default_top_k, 3);
    }
}
