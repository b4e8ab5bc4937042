//! Stored-field store: a dense array of bincode-encoded field lists indexed by doc id.

use std::io::Write;

use crate::document::field::Field;
use crate::error::{Result, TesseraError};
use crate::index::DocId;
use crate::storage::structured::{StructReader, StructWriter};

/// Serialize stored fields for every document of a segment, in doc id order.
pub fn write_stored<W: Write>(docs: &[Vec<Field>], writer: &mut StructWriter<W>) -> Result<()> {
    writer.write_varint(docs.len() as u64)?;
    for fields in docs {
        let encoded = bincode::serialize(fields)?;
        writer.write_bytes(&encoded)?;
    }
    Ok(())
}

/// Random access to the stored fields of one segment.
#[derive(Debug)]
pub struct StoredFieldsReader {
    body: Vec<u8>,
    ranges: Vec<(usize, usize)>,
}

impl StoredFieldsReader {
    /// Index a verified `.stor` body that must hold exactly `doc_count` entries.
    pub fn open(body: Vec<u8>, doc_count: u32) -> Result<Self> {
        let mut reader = StructReader::new(body.as_slice());
        let count = reader.read_varint()?;
        if count != doc_count as u64 {
            return Err(TesseraError::corruption(format!(
                "stored field count {count} does not match segment doc count {doc_count}"
            )));
        }

        let mut ranges = Vec::with_capacity(doc_count as usize);
        for _ in 0..count {
            let length = reader.read_varint()? as usize;
            let start = reader.position() as usize;
            let end = start
                .checked_add(length)
                .filter(|&end| end <= body.len())
                .ok_or_else(|| TesseraError::corruption("stored field entry overruns file"))?;
            reader.read_raw(length)?;
            ranges.push((start, end));
        }

        Ok(StoredFieldsReader { body, ranges })
    }

    /// Number of documents.
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Decode the stored fields of a segment-local doc id.
    pub fn document(&self, doc: DocId) -> Result<Vec<Field>> {
        let &(start, end) = self
            .ranges
            .get(doc as usize)
            .ok_or_else(|| TesseraError::index(format!("doc id {doc} out of range")))?;
        bincode::deserialize(&self.body[start..end])
            .map_err(|e| TesseraError::corruption(format!("stored fields of doc {doc}: {e}")))
    }
}
