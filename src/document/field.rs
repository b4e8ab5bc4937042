//! Fields: a named value plus the options saying how it is indexed.
//!
//! The constructors mirror the usual field flavours of an inverted index:
//!
//! | Constructor | Indexed | Tokenized | Stored | Doc value |
//! |---|---|---|---|---|
//! | [`Field::string`] | yes | no | per `Store` | no |
//! | [`Field::text`] | yes | yes | per `Store` | no |
//! | [`Field::int32`] / [`Field::int64`] / [`Field::double`] | yes | - | per `Store` | no |
//! | [`Field::numeric_doc_value`] | no | - | no | yes |
//! | [`Field::geo_point`] | yes (cell terms) | - | per `Store` | no |
//! | [`Field::bytes`] | no | - | yes | no |
//!
//! # Examples
//!
//! ```
//! use tessera::document::{Field, Store};
//!
//! let title = Field::text("title", "Hello world", Store::Yes).with_boost(2.0);
//! assert!(title.options.tokenized);
//! assert_eq!(title.boost, 2.0);
//!
//! let id = Field::string("id", "doc-1", Store::Yes);
//! assert!(!id.options.tokenized);
//! ```

use serde::{Deserialize, Serialize};

use crate::document::field_value::{FieldValue, NumericValue};
use crate::spatial::GeoPoint;

/// Whether a field's value is kept in the stored-field store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Store {
    Yes,
    No,
}

impl Store {
    fn is_yes(self) -> bool {
        self == Store::Yes
    }
}

/// Indexing options for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOptions {
    /// Keep the value for retrieval.
    pub stored: bool,
    /// Produce terms for the value.
    pub indexed: bool,
    /// Run text through the standard analyzer instead of indexing it whole.
    pub tokenized: bool,
    /// Record the value in the per-document numeric column.
    pub doc_value: bool,
}

impl FieldOptions {
    /// Options for a stored-only field.
    pub const STORED_ONLY: FieldOptions = FieldOptions {
        stored: true,
        indexed: false,
        tokenized: false,
        doc_value: false,
    };
}

/// A field combines a name, a value, indexing options and an index-time boost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// The field name.
    pub name: String,

    /// The field value.
    pub value: FieldValue,

    /// The field indexing options.
    pub options: FieldOptions,

    /// Index-time boost multiplied into the scores of this field's terms.
    pub boost: f32,
}

impl Field {
    /// Create a field with explicit options.
    pub fn new<S: Into<String>>(name: S, value: FieldValue, options: FieldOptions) -> Self {
        Field {
            name: name.into(),
            value,
            options,
            boost: 1.0,
        }
    }

    /// An untokenized string indexed as one exact term.
    pub fn string<S: Into<String>, V: Into<String>>(name: S, value: V, store: Store) -> Self {
        Self::new(
            name,
            FieldValue::Text(value.into()),
            FieldOptions {
                stored: store.is_yes(),
                indexed: true,
                tokenized: false,
                doc_value: false,
            },
        )
    }

    /// Analyzed full text.
    pub fn text<S: Into<String>, V: Into<String>>(name: S, value: V, store: Store) -> Self {
        Self::new(
            name,
            FieldValue::Text(value.into()),
            FieldOptions {
                stored: store.is_yes(),
                indexed: true,
                tokenized: true,
                doc_value: false,
            },
        )
    }

    /// An indexed 32-bit integer.
    pub fn int32<S: Into<String>>(name: S, value: i32, store: Store) -> Self {
        Self::numeric(name, FieldValue::Int32(value), store)
    }

    /// An indexed 64-bit integer.
    pub fn int64<S: Into<String>>(name: S, value: i64, store: Store) -> Self {
        Self::numeric(name, FieldValue::Int64(value), store)
    }

    /// An indexed double.
    pub fn double<S: Into<String>>(name: S, value: f64, store: Store) -> Self {
        Self::numeric(name, FieldValue::Double(value), store)
    }

    fn numeric<S: Into<String>>(name: S, value: FieldValue, store: Store) -> Self {
        Self::new(
            name,
            value,
            FieldOptions {
                stored: store.is_yes(),
                indexed: true,
                tokenized: false,
                doc_value: false,
            },
        )
    }

    /// A per-document numeric value that is neither indexed nor stored.
    pub fn numeric_doc_value<S: Into<String>, N: Into<NumericValue>>(name: S, value: N) -> Self {
        let value = match value.into() {
            NumericValue::Int(v) => FieldValue::Int64(v),
            NumericValue::Float(v) => FieldValue::Double(v),
        };
        Self::new(
            name,
            value,
            FieldOptions {
                stored: false,
                indexed: false,
                tokenized: false,
                doc_value: true,
            },
        )
    }

    /// A spatially indexed point.
    pub fn geo_point<S: Into<String>>(name: S, point: GeoPoint, store: Store) -> Self {
        Self::new(
            name,
            FieldValue::Geo(point),
            FieldOptions {
                stored: store.is_yes(),
                indexed: true,
                tokenized: false,
                doc_value: false,
            },
        )
    }

    /// Stored raw bytes.
    pub fn bytes<S: Into<String>>(name: S, value: Vec<u8>) -> Self {
        Self::new(name, FieldValue::Bytes(value), FieldOptions::STORED_ONLY)
    }

    /// Bind an index-time boost.
    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flavours() {
        let f = Field::int32("count", 7, Store::No);
        assert!(f.options.indexed);
        assert!(!f.options.stored);
        assert_eq!(f.value, FieldValue::Int32(7));

        let dv = Field::numeric_doc_value("price", 9.5);
        assert!(dv.options.doc_value);
        assert!(!dv.options.indexed);
        assert!(!dv.options.stored);
        assert_eq!(dv.value, FieldValue::Double(9.5));

        let dv = Field::numeric_doc_value("rank", 3);
        assert_eq!(dv.value, FieldValue::Int64(3));
    }
}
