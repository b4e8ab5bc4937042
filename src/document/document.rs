//! Documents and the validating document builder.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::document::field::Field;
use crate::document::field_value::{FieldKind, FieldValue};
use crate::error::{Result, TesseraError};
use crate::spatial::geohash::CELL_FIELD_PREFIX;

/// A document: an ordered sequence of fields.
///
/// Field order carries no meaning for indexing but is preserved for stored
/// retrieval. The same name may appear several times (multivalued fields).
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct Document {
    fields: Vec<Field>,
}

impl Document {
    /// Start building a document.
    pub fn builder() -> DocumentBuilder {
        DocumentBuilder::new()
    }

    /// Wrap fields that are already known to be valid (stored-field retrieval).
    pub(crate) fn from_fields(fields: Vec<Field>) -> Self {
        Document { fields }
    }

    /// All fields in insertion order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// The first value stored under `name`.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }

    /// Every value stored under `name`, in insertion order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FieldValue> + 'a {
        self.fields
            .iter()
            .filter(move |f| f.name == name)
            .map(|f| &f.value)
    }

    /// Check if the document has a field.
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    /// Distinct field names in first-seen order.
    pub fn field_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for field in &self.fields {
            if !names.contains(&field.name.as_str()) {
                names.push(&field.name);
            }
        }
        names
    }

    /// Number of fields, counting each value of a multivalued field.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the document is empty.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Builder for [`Document`] that rejects invalid field combinations.
///
/// The first problem found is remembered and reported by [`build`](Self::build),
/// so chained calls stay ergonomic.
///
/// # Examples
///
/// ```
/// use tessera::document::{Document, Field, Store};
///
/// let doc = Document::builder()
///     .add(Field::string("id", "1", Store::Yes))
///     .add(Field::int32("count", 3, Store::No))
///     .build()
///     .unwrap();
/// assert_eq!(doc.len(), 2);
///
/// let err = Document::builder()
///     .add(Field::int32("count", 3, Store::No))
///     .add(Field::text("count", "three", Store::No))
///     .build();
/// assert!(err.is_err());
/// ```
#[derive(Debug, Default)]
pub struct DocumentBuilder {
    fields: Vec<Field>,
    indexed_kinds: HashMap<String, FieldKind>,
    doc_values: HashMap<String, FieldKind>,
    error: Option<TesseraError>,
}

impl DocumentBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field.
    pub fn add(mut self, field: Field) -> Self {
        if self.error.is_none() {
            match self.check(&field) {
                Ok(()) => {
                    if field.options.indexed {
                        self.indexed_kinds
                            .insert(field.name.clone(), field.value.kind());
                    }
                    if field.options.doc_value {
                        self.doc_values.insert(field.name.clone(), field.value.kind());
                    }
                    self.fields.push(field);
                }
                Err(e) => self.error = Some(e),
            }
        }
        self
    }

    /// Add every field from an iterator.
    pub fn add_all<I: IntoIterator<Item = Field>>(self, fields: I) -> Self {
        fields.into_iter().fold(self, |builder, field| builder.add(field))
    }

    /// Build the final document, or report the first validation failure.
    pub fn build(self) -> Result<Document> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(Document {
                fields: self.fields,
            }),
        }
    }

    fn check(&self, field: &Field) -> Result<()> {
        validate_field(field)?;

        if field.options.indexed {
            if let Some(&kind) = self.indexed_kinds.get(&field.name) {
                if kind != field.value.kind() {
                    return Err(TesseraError::validation(format!(
                        "field '{}' declared as {kind} and {} in the same document",
                        field.name,
                        field.value.kind()
                    )));
                }
            }
        }

        if field.options.doc_value && self.doc_values.contains_key(&field.name) {
            return Err(TesseraError::validation(format!(
                "field '{}' has more than one doc value",
                field.name
            )));
        }

        Ok(())
    }
}

/// Checks that hold for a single field regardless of its document.
pub(crate) fn validate_field(field: &Field) -> Result<()> {
    if field.name.is_empty() {
        return Err(TesseraError::validation("field name must not be empty"));
    }
    if field.name.starts_with(CELL_FIELD_PREFIX) {
        return Err(TesseraError::validation(format!(
            "field name '{}' uses the reserved prefix '{CELL_FIELD_PREFIX}'",
            field.name
        )));
    }
    if !field.boost.is_finite() || field.boost <= 0.0 {
        return Err(TesseraError::validation(format!(
            "field '{}' has invalid boost {}",
            field.name, field.boost
        )));
    }

    let kind = field.value.kind();
    if field.options.doc_value && !kind.is_numeric() {
        return Err(TesseraError::validation(format!(
            "doc value field '{}' must be numeric, got {kind}",
            field.name
        )));
    }
    if let FieldValue::Double(v) = field.value {
        if v.is_nan() && (field.options.indexed || field.options.doc_value) {
            return Err(TesseraError::validation(format!(
                "field '{}' cannot index NaN",
                field.name
            )));
        }
    }
    if field.options.tokenized && kind != FieldKind::Text {
        return Err(TesseraError::validation(format!(
            "field '{}' is tokenized but holds {kind}",
            field.name
        )));
    }
    if !field.options.stored && !field.options.indexed && !field.options.doc_value {
        return Err(TesseraError::validation(format!(
            "field '{}' is neither stored, indexed nor a doc value",
            field.name
        )));
    }

    Ok(())
}
