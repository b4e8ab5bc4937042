//! Spatial containment query over geohash cell terms.

use crate::error::{Result, TesseraError};
use crate::query::matcher::{EmptyMatcher, Matcher};
use crate::query::query::{Query, SearchContext, validate_common};
use crate::spatial::geohash::{self, MAX_PRECISION, cell_field};
use crate::spatial::{CellBounds, GeoPoint};

/// Documents whose geo field lies in the same grid cell as a point.
///
/// The cell is the one containing `point` at `precision`; the field must
/// have been indexed at that level for anything to match.
#[derive(Debug, Clone)]
pub struct SpatialWithinQuery {
    field: String,
    point: GeoPoint,
    precision: usize,
    boost: f32,
}

impl SpatialWithinQuery {
    /// Create a new spatial query.
    pub fn new<S: Into<String>>(field: S, point: GeoPoint, precision: usize) -> Self {
        SpatialWithinQuery {
            field: field.into(),
            point,
            precision,
            boost: 1.0,
        }
    }

    /// Set the boost factor for this query.
    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    /// The query point.
    pub fn point(&self) -> GeoPoint {
        self.point
    }

    /// The cell term the query looks up.
    pub fn cell(&self) -> Result<String> {
        geohash::encode(&self.point, self.precision)
            .map_err(|e| TesseraError::query_parse(e.to_string()))
    }

    /// Extent of the queried cell.
    pub fn cell_bounds(&self) -> Result<CellBounds> {
        geohash::decode_bounds(&self.cell()?)
    }
}

impl Query for SpatialWithinQuery {
    fn validate(&self) -> Result<()> {
        validate_common(Some(&self.field), self.boost)?;
        if self.precision == 0 || self.precision > MAX_PRECISION {
            return Err(TesseraError::query_parse(format!(
                "spatial precision {} is outside 1..={MAX_PRECISION}",
                self.precision
            )));
        }
        Ok(())
    }

    fn matcher(&self, ctx: &SearchContext<'_>) -> Result<Box<dyn Matcher>> {
        let namespace = cell_field(&self.field);
        let cell = self.cell()?;

        match ctx.segment().dictionary().get(&namespace, &cell) {
            Some(info) => ctx.posting_matcher(&namespace, &cell, info, &self.field, self.boost),
            None => Ok(EmptyMatcher::boxed()),
        }
    }

    fn boost(&self) -> f32 {
        self.boost
    }

    fn set_boost(&mut self, boost: f32) {
        self.boost = boost;
    }

    fn description(&self) -> String {
        format!("{}:within({}, {})", self.field, self.point, self.precision)
    }

    fn clone_box(&self) -> Box<dyn Query> {
        Box::new(self.clone())
    }

    fn field(&self) -> Option<&str> {
        Some(&self.field)
    }
}
