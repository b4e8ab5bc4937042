//! Search execution: evaluating queries and collecting the top hits.

pub mod collector;
pub mod searcher;

pub use self::collector::{SearchHit, TopDocsCollector};
pub use self::searcher::{IndexSearcher, SearchOptions, TopDocs};
