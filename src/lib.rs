//! # Tessera
//!
//! An embeddable full-text and spatial search core.
//!
//! ## Features
//!
//! - Typed documents: text, keywords, integers, doubles, geo points, bytes
//! - Append-only segments published through atomic, checksummed commits
//! - Term, boolean, numeric range, fuzzy and geohash cell queries
//! - tf-idf scoring with index-time and query-time boosts
//! - Top-K collection with deadlines and postings budgets
//! - Pluggable storage: file system or memory
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use tessera::prelude::*;
//!
//! # fn main() -> tessera::error::Result<()> {
//! let directory = Directory::create_or_open(Arc::new(MemoryStorage::new_default()));
//!
//! let mut writer = IndexWriter::open(directory.clone(), WriterConfig::default())?;
//! for (id, content) in [("1", "Hello world"), ("2", "Hello world 2")] {
//!     let doc = Document::builder()
//!         .add(Field::string("id", id, Store::Yes))
//!         .add(Field::text("content", content, Store::Yes))
//!         .build()?;
//!     writer.add_document(&doc)?;
//! }
//! writer.commit()?;
//!
//! let reader = Arc::new(IndexReader::open(&directory)?);
//! let searcher = IndexSearcher::new(reader, SearchConfig::default());
//! let top = searcher.search(&TermQuery::new("content", "world"), 5, &SearchOptions::default())?;
//! assert_eq!(top.hits.len(), 2);
//! assert_eq!(top.hits[0].doc_id, 0);
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod config;
pub mod document;
pub mod error;
pub mod index;
pub mod query;
pub mod search;
pub mod spatial;
pub mod storage;
pub mod util;

pub mod prelude {
    pub use crate::config::{IndexConfig, SearchConfig, WriterConfig};
    pub use crate::document::{Document, Field, FieldValue, NumericValue, Store};
    pub use crate::error::{Result, TesseraError};
    pub use crate::index::{DocId, Directory, IndexReader, IndexWriter};
    pub use crate::query::{
        BooleanQuery, FuzzyQuery, NumericRangeQuery, Occur, Query, SpatialWithinQuery, TermQuery,
    };
    pub use crate::search::{IndexSearcher, SearchHit, SearchOptions, TopDocs};
    pub use crate::spatial::GeoPoint;
    pub use crate::storage::{FileStorage, MemoryStorage, Storage, StorageConfig};
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
