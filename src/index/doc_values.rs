//! Doc-values: per-document numeric columns, plus index-time field boosts.
//!
//! Each column is dense over the segment's doc ids. A presence bitmap marks
//! which documents actually carry a value, so no value needs to be sacrificed
//! as an "absent" sentinel. Field boosts are stored the same way (dense `f32`
//! columns) but only for fields where some document had a boost other than 1.0.

use std::collections::BTreeMap;
use std::io::Write;

use ahash::AHashMap;
use bit_vec::BitVec;

use crate::document::field_value::NumericValue;
use crate::error::{Result, TesseraError};
use crate::index::DocId;
use crate::storage::structured::{StructReader, StructWriter};

const KIND_INT: u8 = 0;
const KIND_FLOAT: u8 = 1;

/// Accumulates doc-values and field boosts for a segment being built.
#[derive(Debug, Default)]
pub struct DocValuesWriter {
    columns: BTreeMap<String, Vec<(DocId, NumericValue)>>,
    boosts: BTreeMap<String, Vec<(DocId, f32)>>,
}

impl DocValuesWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the column for `field` holds floats, if the column exists.
    pub fn column_is_float(&self, field: &str) -> Option<bool> {
        self.columns
            .get(field)
            .and_then(|values| values.first())
            .map(|(_, value)| value.is_float())
    }

    /// Record the value of `field` for `doc`. Docs must arrive in ascending order.
    pub fn add_value(&mut self, doc: DocId, field: &str, value: NumericValue) {
        self.columns
            .entry(field.to_string())
            .or_default()
            .push((doc, value));
    }

    /// Record the combined index-time boost of `field` in `doc`.
    pub fn set_boost(&mut self, doc: DocId, field: &str, boost: f32) {
        self.boosts
            .entry(field.to_string())
            .or_default()
            .push((doc, boost));
    }

    /// Serialize dense columns covering `doc_count` documents.
    pub fn write<W: Write>(&self, doc_count: u32, writer: &mut StructWriter<W>) -> Result<()> {
        let doc_count = doc_count as usize;

        writer.write_varint(doc_count as u64)?;
        writer.write_varint(self.columns.len() as u64)?;
        for (field, values) in &self.columns {
            let is_float = values.first().is_some_and(|(_, v)| v.is_float());
            let mut presence = BitVec::from_elem(doc_count, false);
            let mut dense = vec![0u64; doc_count];

            for &(doc, value) in values {
                presence.set(doc as usize, true);
                dense[doc as usize] = match value {
                    NumericValue::Int(v) => v as u64,
                    NumericValue::Float(v) => v.to_bits(),
                };
            }

            writer.write_string(field)?;
            writer.write_u8(if is_float { KIND_FLOAT } else { KIND_INT })?;
            writer.write_bytes(&presence.to_bytes())?;
            for bits in dense {
                writer.write_u64(bits)?;
            }
        }

        writer.write_varint(self.boosts.len() as u64)?;
        for (field, boosts) in &self.boosts {
            let mut dense = vec![1.0f32; doc_count];
            for &(doc, boost) in boosts {
                dense[doc as usize] = boost;
            }

            writer.write_string(field)?;
            for boost in dense {
                writer.write_f32(boost)?;
            }
        }

        Ok(())
    }
}

/// One dense numeric column.
#[derive(Debug, Clone)]
pub struct DocValuesColumn {
    is_float: bool,
    presence: BitVec,
    values: Vec<u64>,
}

impl DocValuesColumn {
    /// Value for a segment-local doc id.
    pub fn get(&self, doc: DocId) -> Option<NumericValue> {
        let doc = doc as usize;
        if !self.presence.get(doc).unwrap_or(false) {
            return None;
        }
        let bits = self.values[doc];
        Some(if self.is_float {
            NumericValue::Float(f64::from_bits(bits))
        } else {
            NumericValue::Int(bits as i64)
        })
    }

    /// Whether the column holds floats.
    pub fn is_float(&self) -> bool {
        self.is_float
    }

    /// Number of documents covered (present or not).
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the column covers no documents.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Doc-values and field boosts of one segment.
#[derive(Debug, Default)]
pub struct DocValuesReader {
    columns: AHashMap<String, DocValuesColumn>,
    boosts: AHashMap<String, Vec<f32>>,
}

impl DocValuesReader {
    /// Parse a verified `.dv` body for a segment of `doc_count` documents.
    pub fn open(body: &[u8], doc_count: u32) -> Result<Self> {
        let mut reader = StructReader::new(body);
        let stored_count = reader.read_varint()?;
        if stored_count != doc_count as u64 {
            return Err(TesseraError::corruption(format!(
                "doc values cover {stored_count} docs, segment has {doc_count}"
            )));
        }
        let doc_count = doc_count as usize;

        let column_count = reader.read_varint()? as usize;
        let mut columns = AHashMap::with_capacity(column_count.min(64));
        for _ in 0..column_count {
            let field = reader.read_string()?;
            let is_float = match reader.read_u8()? {
                KIND_INT => false,
                KIND_FLOAT => true,
                other => {
                    return Err(TesseraError::corruption(format!(
                        "doc values column '{field}' has unknown kind {other}"
                    )));
                }
            };
            let presence_bytes = reader.read_bytes()?;
            if presence_bytes.len() != doc_count.div_ceil(8) {
                return Err(TesseraError::corruption(format!(
                    "doc values column '{field}' has a malformed presence bitmap"
                )));
            }
            let mut presence = BitVec::from_bytes(&presence_bytes);
            presence.truncate(doc_count);

            let mut values = Vec::with_capacity(doc_count);
            for _ in 0..doc_count {
                values.push(reader.read_u64()?);
            }

            columns.insert(
                field,
                DocValuesColumn {
                    is_float,
                    presence,
                    values,
                },
            );
        }

        let boost_count = reader.read_varint()? as usize;
        let mut boosts = AHashMap::with_capacity(boost_count.min(64));
        for _ in 0..boost_count {
            let field = reader.read_string()?;
            let mut dense = Vec::with_capacity(doc_count);
            for _ in 0..doc_count {
                dense.push(reader.read_f32()?);
            }
            boosts.insert(field, dense);
        }

        if reader.position() != body.len() as u64 {
            return Err(TesseraError::corruption("trailing bytes after doc values"));
        }

        Ok(DocValuesReader { columns, boosts })
    }

    /// Column for `field`, if any document of the segment has a value.
    pub fn column(&self, field: &str) -> Option<&DocValuesColumn> {
        self.columns.get(field)
    }

    /// Value of `field` for a segment-local doc id.
    pub fn get(&self, field: &str, doc: DocId) -> Option<NumericValue> {
        self.columns.get(field).and_then(|column| column.get(doc))
    }

    /// Index-time boost of `field` in a segment-local doc id (1.0 when unboosted).
    pub fn boost(&self, field: &str, doc: DocId) -> f32 {
        self.boosts
            .get(field)
            .and_then(|boosts| boosts.get(doc as usize))
            .copied()
            .unwrap_or(1.0)
    }
}
