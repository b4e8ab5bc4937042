//! Document model: typed fields and validated documents.

#[allow(clippy::module_inception)]
pub mod document;
pub mod field;
pub mod field_value;

// Re-export commonly used types
pub use document::{Document, DocumentBuilder};
pub use field::{Field, FieldOptions, Store};
pub use field_value::{FieldKind, FieldValue, NumericValue};
