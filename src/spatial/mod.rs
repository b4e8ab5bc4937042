//! Spatial indexing: points and the geohash cell grid.

pub mod geohash;
pub mod point;

pub use geohash::{CellBounds, MAX_PRECISION, cell_field, cell_terms};
pub use point::GeoPoint;
