//! Field value types for documents.
//!
//! # Examples
//!
//! ```
//! use tessera::document::field_value::{FieldKind, FieldValue, NumericValue};
//!
//! let value = FieldValue::Int32(42);
//! assert_eq!(value.kind(), FieldKind::Int32);
//! assert_eq!(value.as_numeric(), Some(NumericValue::Int(42)));
//!
//! let text = FieldValue::Text("hello".to_string());
//! assert_eq!(text.as_text(), Some("hello"));
//! assert_eq!(text.as_numeric(), None);
//! ```

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::spatial::GeoPoint;

/// Represents a value for a field in a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    /// Text value, analyzed or indexed as a keyword depending on field options.
    Text(String),
    /// 32-bit signed integer.
    Int32(i32),
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit floating point number.
    Double(f64),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// Geographic point, indexed through the cell grid.
    Geo(GeoPoint),
}

/// The kind of a field value, used to detect conflicting declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FieldKind {
    Text,
    Int32,
    Int64,
    Double,
    Bytes,
    Geo,
}

impl FieldKind {
    /// Whether values of this kind are indexed as sortable numeric terms.
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldKind::Int32 | FieldKind::Int64 | FieldKind::Double)
    }

    /// Whether values of this kind are integers.
    pub fn is_integer(&self) -> bool {
        matches!(self, FieldKind::Int32 | FieldKind::Int64)
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FieldKind::Text => "Text",
            FieldKind::Int32 => "Int32",
            FieldKind::Int64 => "Int64",
            FieldKind::Double => "Double",
            FieldKind::Bytes => "Bytes",
            FieldKind::Geo => "Geo",
        };
        f.write_str(name)
    }
}

impl FieldValue {
    /// Get the kind of this value.
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Text(_) => FieldKind::Text,
            FieldValue::Int32(_) => FieldKind::Int32,
            FieldValue::Int64(_) => FieldKind::Int64,
            FieldValue::Double(_) => FieldKind::Double,
            FieldValue::Bytes(_) => FieldKind::Bytes,
            FieldValue::Geo(_) => FieldKind::Geo,
        }
    }

    /// Get the value as text, if it's a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get the value as a number, if it's numeric.
    pub fn as_numeric(&self) -> Option<NumericValue> {
        match self {
            FieldValue::Int32(v) => Some(NumericValue::Int(*v as i64)),
            FieldValue::Int64(v) => Some(NumericValue::Int(*v)),
            FieldValue::Double(v) => Some(NumericValue::Float(*v)),
            _ => None,
        }
    }

    /// Get the value as bytes, if it's a bytes value.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            FieldValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Get the value as a geo point, if it's a geo value.
    pub fn as_geo(&self) -> Option<&GeoPoint> {
        match self {
            FieldValue::Geo(p) => Some(p),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Int32(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int64(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Double(value)
    }
}

impl From<GeoPoint> for FieldValue {
    fn from(value: GeoPoint) -> Self {
        FieldValue::Geo(value)
    }
}

/// A single numeric value: what doc-values hold and range bounds are made of.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum NumericValue {
    Int(i64),
    Float(f64),
}

impl NumericValue {
    /// The value as f64 (lossy for very large integers).
    pub fn as_f64(&self) -> f64 {
        match self {
            NumericValue::Int(v) => *v as f64,
            NumericValue::Float(v) => *v,
        }
    }

    /// The value as i64 if it is an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            NumericValue::Int(v) => Some(*v),
            NumericValue::Float(_) => None,
        }
    }

    /// Whether this is a floating point value.
    pub fn is_float(&self) -> bool {
        matches!(self, NumericValue::Float(_))
    }

    /// Whether this is NaN.
    pub fn is_nan(&self) -> bool {
        matches!(self, NumericValue::Float(v) if v.is_nan())
    }

    /// Numeric comparison across integer and float values.
    ///
    /// Two integers compare exactly; anything involving a float compares as
    /// f64. Returns `None` only when NaN is involved.
    pub fn compare(&self, other: &NumericValue) -> Option<Ordering> {
        match (self, other) {
            (NumericValue::Int(a), NumericValue::Int(b)) => Some(a.cmp(b)),
            _ => self.as_f64().partial_cmp(&other.as_f64()),
        }
    }
}

impl PartialOrd for NumericValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.compare(other)
    }
}

impl std::fmt::Display for NumericValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NumericValue::Int(v) => write!(f, "{v}"),
            NumericValue::Float(v) => write!(f, "{v}"),
        }
    }
}

impl From<i32> for NumericValue {
    fn from(value: i32) -> Self {
        NumericValue::Int(value as i64)
    }
}

impl From<i64> for NumericValue {
    fn from(value: i64) -> Self {
        NumericValue::Int(value)
    }
}

impl From<f64> for NumericValue {
    fn from(value: f64) -> Self {
        NumericValue::Float(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(FieldValue::from("x").kind(), FieldKind::Text);
        assert_eq!(FieldValue::from(1i64).kind(), FieldKind::Int64);
        assert!(FieldKind::Double.is_numeric());
        assert!(!FieldKind::Double.is_integer());
        assert!(!FieldKind::Geo.is_numeric());
    }

    #[test]
    fn test_numeric_compare() {
        let a = NumericValue::Int(i64::MAX);
        let b = NumericValue::Int(i64::MAX - 1);
        assert_eq!(a.compare(&b), Some(Ordering::Greater));

        assert!(NumericValue::Int(3) < NumericValue::Float(3.5));
        assert!(NumericValue::Float(-0.5) < NumericValue::Int(0));
        assert_eq!(NumericValue::Float(f64::NAN).compare(&NumericValue::Int(0)), None);
    }
}
