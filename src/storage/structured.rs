//! Structured file I/O for binary data serialization.
//!
//! Every segment file is written through a [`StructWriter`], which keeps a
//! running CRC32 over everything it emits and appends it as a little-endian
//! trailer on [`StructWriter::finish`]. Readers load the file, check the
//! trailer with [`verify_checksum`] and decode the body with a
//! [`StructReader`].

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Result, TesseraError};
use crate::util::varint::{encode_u64, read_u64};

/// Length of the checksum trailer in bytes.
pub const CHECKSUM_LEN: usize = 4;

/// A structured file writer for binary data.
pub struct StructWriter<W: Write> {
    writer: W,
    hasher: crc32fast::Hasher,
    position: u64,
}

impl<W: Write> StructWriter<W> {
    /// Create a new structured file writer.
    pub fn new(writer: W) -> Self {
        StructWriter {
            writer,
            hasher: crc32fast::Hasher::new(),
            position: 0,
        }
    }

    /// Write a u8 value.
    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.writer.write_u8(value)?;
        self.track(&[value]);
        Ok(())
    }

    /// Write a u32 value (little-endian).
    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.writer.write_u32::<LittleEndian>(value)?;
        self.track(&value.to_le_bytes());
        Ok(())
    }

    /// Write a u64 value (little-endian).
    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        self.writer.write_u64::<LittleEndian>(value)?;
        self.track(&value.to_le_bytes());
        Ok(())
    }

    /// Write a f32 value (little-endian).
    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        self.writer.write_f32::<LittleEndian>(value)?;
        self.track(&value.to_le_bytes());
        Ok(())
    }

    /// Write a f64 value (little-endian).
    pub fn write_f64(&mut self, value: f64) -> Result<()> {
        self.writer.write_f64::<LittleEndian>(value)?;
        self.track(&value.to_le_bytes());
        Ok(())
    }

    /// Write a variable-length integer.
    pub fn write_varint(&mut self, value: u64) -> Result<()> {
        let encoded = encode_u64(value);
        self.write_raw(&encoded)
    }

    /// Write a string with length prefix.
    pub fn write_string(&mut self, value: &str) -> Result<()> {
        self.write_bytes(value.as_bytes())
    }

    /// Write raw bytes with length prefix.
    pub fn write_bytes(&mut self, value: &[u8]) -> Result<()> {
        self.write_varint(value.len() as u64)?;
        self.write_raw(value)
    }

    /// Write raw bytes without length prefix.
    pub fn write_raw(&mut self, value: &[u8]) -> Result<()> {
        self.writer.write_all(value)?;
        self.track(value);
        Ok(())
    }

    /// Get current file position, excluding the trailer.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Checksum of everything written so far.
    pub fn checksum(&self) -> u32 {
        self.hasher.clone().finalize()
    }

    /// Append the checksum trailer and hand back the underlying writer.
    pub fn finish(mut self) -> Result<(W, u32)> {
        let checksum = self.hasher.finalize();
        self.writer.write_u32::<LittleEndian>(checksum)?;
        self.writer.flush()?;
        Ok((self.writer, checksum))
    }

    fn track(&mut self, data: &[u8]) {
        self.hasher.update(data);
        self.position += data.len() as u64;
    }
}

/// Check the CRC32 trailer of a complete file image and return its body.
pub fn verify_checksum<'a>(name: &str, data: &'a [u8]) -> Result<&'a [u8]> {
    if data.len() < CHECKSUM_LEN {
        return Err(TesseraError::corruption(format!(
            "{name}: file too short for checksum ({} bytes)",
            data.len()
        )));
    }

    let (body, trailer) = data.split_at(data.len() - CHECKSUM_LEN);
    let stored = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    let actual = crc32fast::hash(body);

    if stored != actual {
        return Err(TesseraError::corruption(format!(
            "{name}: checksum mismatch (stored {stored:08x}, computed {actual:08x})"
        )));
    }

    Ok(body)
}

/// A structured reader for binary data.
///
/// Short reads surface as [`TesseraError::Corruption`]: the reader only ever
/// runs over bodies whose length was fixed when they were written.
pub struct StructReader<R: Read> {
    reader: R,
    position: u64,
}

impl<R: Read> StructReader<R> {
    /// Create a new structured reader.
    pub fn new(reader: R) -> Self {
        StructReader {
            reader,
            position: 0,
        }
    }

    /// Read a u8 value.
    pub fn read_u8(&mut self) -> Result<u8> {
        let value = self.reader.read_u8().map_err(truncated)?;
        self.position += 1;
        Ok(value)
    }

    /// Read a u32 value (little-endian).
    pub fn read_u32(&mut self) -> Result<u32> {
        let value = self.reader.read_u32::<LittleEndian>().map_err(truncated)?;
        self.position += 4;
        Ok(value)
    }

    /// Read a u64 value (little-endian).
    pub fn read_u64(&mut self) -> Result<u64> {
        let value = self.reader.read_u64::<LittleEndian>().map_err(truncated)?;
        self.position += 8;
        Ok(value)
    }

    /// Read a f32 value (little-endian).
    pub fn read_f32(&mut self) -> Result<f32> {
        let value = self.reader.read_f32::<LittleEndian>().map_err(truncated)?;
        self.position += 4;
        Ok(value)
    }

    /// Read a f64 value (little-endian).
    pub fn read_f64(&mut self) -> Result<f64> {
        let value = self.reader.read_f64::<LittleEndian>().map_err(truncated)?;
        self.position += 8;
        Ok(value)
    }

    /// Read a variable-length integer.
    pub fn read_varint(&mut self) -> Result<u64> {
        let mut counter = CountingReader {
            inner: &mut self.reader,
            count: 0,
        };
        let value = read_u64(&mut counter).map_err(|e| match e {
            TesseraError::Io(io) => truncated(io),
            other => other,
        })?;
        self.position += counter.count;
        Ok(value)
    }

    /// Read a string with length prefix.
    pub fn read_string(&mut self) -> Result<String> {
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes).map_err(|e| TesseraError::corruption(format!("Invalid UTF-8: {e}")))
    }

    /// Read bytes with length prefix.
    pub fn read_bytes(&mut self) -> Result<Vec<u8>> {
        let length = self.read_varint()? as usize;
        self.read_raw(length)
    }

    /// Read exact number of raw bytes.
    pub fn read_raw(&mut self, length: usize) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        (&mut self.reader)
            .take(length as u64)
            .read_to_end(&mut bytes)?;
        if bytes.len() != length {
            return Err(TesseraError::corruption(format!(
                "unexpected end of data: wanted {length} bytes, got {}",
                bytes.len()
            )));
        }
        self.position += length as u64;
        Ok(bytes)
    }

    /// Get current read position.
    pub fn position(&self) -> u64 {
        self.position
    }
}

struct CountingReader<'a, R: Read> {
    inner: &'a mut R,
    count: u64,
}

impl<R: Read> Read for CountingReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count += n as u64;
        Ok(n)
    }
}

fn truncated(err: std::io::Error) -> TesseraError {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        TesseraError::corruption("unexpected end of data")
    } else {
        TesseraError::Io(err)
    }
}
