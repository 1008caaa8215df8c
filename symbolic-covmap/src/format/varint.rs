//! Unsigned LEB128 varints.

use std::convert::TryFrom;

use super::DecodeError;

/// Appends `value` as an unsigned LEB128 varint.
pub fn write_uleb128(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Appends a `u32` as an unsigned LEB128 varint.
pub fn write_uleb128_u32(out: &mut Vec<u8>, value: u32) {
    write_uleb128(out, u64::from(value));
}

/// Appends a length or count as an unsigned LEB128 varint.
pub fn write_uleb128_usize(out: &mut Vec<u8>, value: usize) {
    write_uleb128(out, value as u64);
}

/// A bounds-checked cursor over an encoded buffer.
#[derive(Debug, Clone)]
pub struct Reader<'data> {
    data: &'data [u8],
    offset: usize,
}

impl<'data> Reader<'data> {
    /// Creates a reader positioned at the start of `data`.
    pub fn new(data: &'data [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// The current offset into the buffer.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Whether all bytes have been consumed.
    pub fn is_empty(&self) -> bool {
        self.offset >= self.data.len()
    }

    /// Reads a single byte.
    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        let byte = *self
            .data
            .get(self.offset)
            .ok_or(DecodeError::UnexpectedEof(self.offset))?;
        self.offset += 1;
        Ok(byte)
    }

    /// Reads `len` raw bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'data [u8], DecodeError> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(DecodeError::UnexpectedEof(self.data.len()))?;
        let bytes = &self.data[self.offset..end];
        self.offset = end;
        Ok(bytes)
    }

    /// Reads an unsigned LEB128 varint.
    pub fn read_uleb128(&mut self) -> Result<u64, DecodeError> {
        let start = self.offset;
        let mut result = 0u64;
        let mut shift = 0;
        loop {
            let byte = self.read_u8()?;
            let low = u64::from(byte & 0x7f);
            if (shift == 63 && low > 1) || shift > 63 {
                return Err(DecodeError::VarintOverflow(start));
            }
            result |= low << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
        }
    }

    /// Reads an unsigned LEB128 varint that must fit into a `u32`.
    pub fn read_uleb128_u32(&mut self) -> Result<u32, DecodeError> {
        let start = self.offset;
        let value = self.read_uleb128()?;
        u32::try_from(value).map_err(|_| DecodeError::VarintOverflow(start))
    }

    /// Reads a varint length or count.
    pub fn read_uleb128_usize(&mut self) -> Result<usize, DecodeError> {
        let start = self.offset;
        let value = self.read_uleb128()?;
        usize::try_from(value).map_err(|_| DecodeError::VarintOverflow(start))
    }
}
