//! Query system for searching documents.

pub mod boolean;
pub mod fuzzy;
pub mod geo;
pub mod matcher;
#[allow(clippy::module_inception)]
pub mod query;
pub mod range;
pub mod term;

pub use self::boolean::{BooleanClause, BooleanQuery, BooleanQueryBuilder, Occur};
pub use self::fuzzy::FuzzyQuery;
pub use self::geo::SpatialWithinQuery;
pub use self::matcher::Matcher;
pub use self::query::{Query, SearchContext, SearchState};
pub use self::range::NumericRangeQuery;
pub use self::term::TermQuery;
