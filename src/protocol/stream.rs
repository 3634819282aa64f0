//! Binary wire streams.
//!
//! [`OutputStream`] is an append-only big-endian writer that can patch
//! already-written scalars in place (frame and record lengths are written as
//! placeholders and fixed up once the body is known). [`InputStream`] is the
//! matching cursor-based reader with `mark`/`reset` lookahead and a settable
//! reference map used while decoding entity graphs.
//!
//! # Compact integers
//!
//! `write_var_long` packs non-negative longs into 1, 2, 4 or `1 + n` bytes:
//!
//! | range | bytes | layout |
//! |-------|-------|--------|
//! | `0..=0x7F` | 1 | `0vvvvvvv` |
//! | `..=0x3FFF` | 2 | `10vvvvvv ...` |
//! | `..=0x1FFF_FFFF` | 4 | `110vvvvv ...` |
//! | larger | 1 + n | `1110nnnn` then `n` big-endian bytes |
//!
//! The single byte [`VAR_LONG_NULL`] encodes an absent value.

use std::collections::HashMap;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::error::{ProtocolError, ProtocolResult};
use crate::model::EntityRef;

/// Packed encoding of an absent VarLong.
pub const VAR_LONG_NULL: u8 = 0xF0;

/// Largest string a UTF field can carry.
pub const MAX_UTF_LEN: usize = u16::MAX as usize;

/// Decode-scoped mapping from wire entity id to client object.
pub type ReferenceMap = HashMap<i64, EntityRef>;

// ============================================================================
// OutputStream
// ============================================================================

/// Growable big-endian writer.
#[derive(Debug, Default)]
pub struct OutputStream {
    buffer: BytesMut,
}

impl OutputStream {
    /// Create an empty stream.
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// Create an empty stream with the given capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    /// Current write position (bytes written so far).
    pub fn position(&self) -> usize {
        self.buffer.len()
    }

    /// Number of bytes written.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// View of the written bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Consume the stream and return its buffer.
    pub fn into_bytes(self) -> BytesMut {
        self.buffer
    }

    /// Consume the stream into immutable bytes.
    pub fn freeze(self) -> Bytes {
        self.buffer.freeze()
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buffer.put_u8(value as u8);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buffer.put_u8(value);
    }

    pub fn write_i8(&mut self, value: i8) {
        self.buffer.put_i8(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buffer.put_u16(value);
    }

    pub fn write_i16(&mut self, value: i16) {
        self.buffer.put_i16(value);
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buffer.put_i32(value);
    }

    pub fn write_i64(&mut self, value: i64) {
        self.buffer.put_i64(value);
    }

    pub fn write_f32(&mut self, value: f32) {
        self.buffer.put_f32(value);
    }

    pub fn write_f64(&mut self, value: f64) {
        self.buffer.put_f64(value);
    }

    /// Write a character as a single UTF-16 code unit.
    pub fn write_char(&mut self, value: char) -> ProtocolResult<()> {
        let code = u16::try_from(u32::from(value)).map_err(|_| {
            ProtocolError::malformed(format!("char U+{:X} outside the basic plane", u32::from(value)))
        })?;
        self.buffer.put_u16(code);
        Ok(())
    }

    /// Write a u16-length-prefixed UTF-8 string.
    pub fn write_utf(&mut self, value: &str) -> ProtocolResult<()> {
        let bytes = value.as_bytes();
        if bytes.len() > MAX_UTF_LEN {
            return Err(ProtocolError::StringTooLong(bytes.len()));
        }
        self.buffer.put_u16(bytes.len() as u16);
        self.buffer.put_slice(bytes);
        Ok(())
    }

    /// Write a null flag followed by the string when present.
    pub fn write_optional_utf(&mut self, value: Option<&str>) -> ProtocolResult<()> {
        match value {
            Some(s) => {
                self.write_bool(false);
                self.write_utf(s)
            }
            None => {
                self.write_bool(true);
                Ok(())
            }
        }
    }

    /// Write an i32-length-prefixed byte array.
    pub fn write_bytes(&mut self, value: &[u8]) -> ProtocolResult<()> {
        let len = i32::try_from(value.len())
            .map_err(|_| ProtocolError::malformed(format!("byte array of {} bytes", value.len())))?;
        self.buffer.put_i32(len);
        self.buffer.put_slice(value);
        Ok(())
    }

    /// Write a byte array, or length `-1` when absent.
    pub fn write_optional_bytes(&mut self, value: Option<&[u8]>) -> ProtocolResult<()> {
        match value {
            Some(b) => self.write_bytes(b),
            None => {
                self.buffer.put_i32(-1);
                Ok(())
            }
        }
    }

    /// Append raw bytes without a length prefix.
    pub fn write_raw(&mut self, value: &[u8]) {
        self.buffer.put_slice(value);
    }

    /// Write a non-negative long in the compact encoding.
    pub fn write_var_long(&mut self, value: i64) -> ProtocolResult<()> {
        if value < 0 {
            return Err(ProtocolError::NegativeVarLong(value));
        }

        if value <= 0x7F {
            self.buffer.put_u8(value as u8);
        } else if value <= 0x3FFF {
            self.buffer.put_u16(value as u16 | 0x8000);
        } else if value <= 0x1FFF_FFFF {
            self.buffer.put_u32(value as u32 | 0xC000_0000);
        } else {
            let bytes = value.to_be_bytes();
            let skip = bytes.iter().take_while(|b| **b == 0).count();
            let count = bytes.len() - skip;
            self.buffer.put_u8(0xE0 | count as u8);
            self.buffer.put_slice(&bytes[skip..]);
        }
        Ok(())
    }

    /// Write an optional long, packing `None` as [`VAR_LONG_NULL`].
    pub fn write_optional_var_long(&mut self, value: Option<i64>) -> ProtocolResult<()> {
        match value {
            Some(v) => self.write_var_long(v),
            None => {
                self.buffer.put_u8(VAR_LONG_NULL);
                Ok(())
            }
        }
    }

    fn check_patch(&self, position: usize, width: usize) -> ProtocolResult<()> {
        if position + width > self.buffer.len() {
            return Err(ProtocolError::PositionOutOfRange {
                position,
                len: self.buffer.len(),
            });
        }
        Ok(())
    }

    /// Overwrite an i16 at an earlier position.
    pub fn write_i16_at(&mut self, position: usize, value: i16) -> ProtocolResult<()> {
        self.check_patch(position, 2)?;
        self.buffer[position..position + 2].copy_from_slice(&value.to_be_bytes());
        Ok(())
    }

    /// Overwrite an i32 at an earlier position.
    pub fn write_i32_at(&mut self, position: usize, value: i32) -> ProtocolResult<()> {
        self.check_patch(position, 4)?;
        self.buffer[position..position + 4].copy_from_slice(&value.to_be_bytes());
        Ok(())
    }

    /// Overwrite an i64 at an earlier position.
    pub fn write_i64_at(&mut self, position: usize, value: i64) -> ProtocolResult<()> {
        self.check_patch(position, 8)?;
        self.buffer[position..position + 8].copy_from_slice(&value.to_be_bytes());
        Ok(())
    }

    /// Patch an i32 length placeholder at `start` with the bytes written since.
    pub fn patch_length_at(&mut self, start: usize) -> ProtocolResult<()> {
        let length = self.position().saturating_sub(start);
        let length = i32::try_from(length)
            .map_err(|_| ProtocolError::malformed(format!("record of {} bytes", length)))?;
        self.write_i32_at(start, length)
    }
}

// ============================================================================
// InputStream
// ============================================================================

/// Cursor-based big-endian reader.
pub struct InputStream {
    data: Bytes,
    pos: usize,
    mark: usize,
    reference_map: Option<ReferenceMap>,
}

impl InputStream {
    /// Create a reader over the given bytes.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            pos: 0,
            mark: 0,
            reference_map: None,
        }
    }

    /// Current read position.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Move the cursor to an absolute position.
    pub fn set_position(&mut self, position: usize) -> ProtocolResult<()> {
        if position > self.data.len() {
            return Err(ProtocolError::PositionOutOfRange {
                position,
                len: self.data.len(),
            });
        }
        self.pos = position;
        Ok(())
    }

    /// Bytes left to read.
    pub fn available(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Total length of the underlying buffer.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the underlying buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Remember the current position for [`reset`](Self::reset).
    pub fn mark(&mut self) {
        self.mark = self.pos;
    }

    /// Return to the last marked position.
    pub fn reset(&mut self) {
        self.pos = self.mark;
    }

    /// Skip `count` bytes.
    pub fn skip(&mut self, count: usize) -> ProtocolResult<()> {
        self.ensure(count)?;
        self.pos += count;
        Ok(())
    }

    /// Unread tail of the buffer, without consuming it.
    pub fn remaining_bytes(&self) -> Bytes {
        self.data.slice(self.pos..)
    }

    /// Install the reference map for an entity decode pass.
    pub fn set_reference_map(&mut self, map: ReferenceMap) {
        self.reference_map = Some(map);
    }

    /// Reference map of the current decode pass.
    pub fn reference_map(&self) -> Option<&ReferenceMap> {
        self.reference_map.as_ref()
    }

    /// Mutable access to the reference map.
    pub fn reference_map_mut(&mut self) -> Option<&mut ReferenceMap> {
        self.reference_map.as_mut()
    }

    /// Remove and return the reference map, ending the decode pass.
    pub fn take_reference_map(&mut self) -> Option<ReferenceMap> {
        self.reference_map.take()
    }

    fn ensure(&self, needed: usize) -> ProtocolResult<()> {
        let available = self.available();
        if available < needed {
            return Err(ProtocolError::UnexpectedEof { needed, available });
        }
        Ok(())
    }

    fn take(&mut self, count: usize) -> ProtocolResult<&[u8]> {
        self.ensure(count)?;
        let start = self.pos;
        self.pos += count;
        Ok(&self.data[start..start + count])
    }

    pub fn read_bool(&mut self) -> ProtocolResult<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u8(&mut self) -> ProtocolResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i8(&mut self) -> ProtocolResult<i8> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16(&mut self) -> ProtocolResult<u16> {
        Ok(self.take(2)?.get_u16())
    }

    pub fn read_i16(&mut self) -> ProtocolResult<i16> {
        Ok(self.take(2)?.get_i16())
    }

    pub fn read_i32(&mut self) -> ProtocolResult<i32> {
        Ok(self.take(4)?.get_i32())
    }

    pub fn read_i64(&mut self) -> ProtocolResult<i64> {
        Ok(self.take(8)?.get_i64())
    }

    pub fn read_f32(&mut self) -> ProtocolResult<f32> {
        Ok(self.take(4)?.get_f32())
    }

    pub fn read_f64(&mut self) -> ProtocolResult<f64> {
        Ok(self.take(8)?.get_f64())
    }

    /// Read a single UTF-16 code unit as a char.
    pub fn read_char(&mut self) -> ProtocolResult<char> {
        let code = self.read_u16()?;
        char::from_u32(u32::from(code))
            .ok_or_else(|| ProtocolError::malformed(format!("invalid char code unit 0x{:04X}", code)))
    }

    /// Read a u16-length-prefixed UTF-8 string.
    pub fn read_utf(&mut self) -> ProtocolResult<String> {
        let len = self.read_u16()? as usize;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|e| ProtocolError::malformed(format!("invalid UTF-8: {}", e)))
    }

    /// Read a null flag and the string when present.
    pub fn read_optional_utf(&mut self) -> ProtocolResult<Option<String>> {
        if self.read_bool()? {
            return Ok(None);
        }
        self.read_utf().map(Some)
    }

    /// Read an i32-length-prefixed byte array.
    pub fn read_bytes(&mut self) -> ProtocolResult<Bytes> {
        self.read_optional_bytes()
            .map(Option::unwrap_or_default)
    }

    /// Read a byte array; length `-1` means absent.
    pub fn read_optional_bytes(&mut self) -> ProtocolResult<Option<Bytes>> {
        let len = self.read_i32()?;
        if len < 0 {
            return Ok(None);
        }
        let len = len as usize;
        self.ensure(len)?;
        let bytes = self.data.slice(self.pos..self.pos + len);
        self.pos += len;
        Ok(Some(bytes))
    }

    /// Read a compact long; [`VAR_LONG_NULL`] is rejected.
    pub fn read_var_long(&mut self) -> ProtocolResult<i64> {
        self.read_optional_var_long()?
            .ok_or_else(|| ProtocolError::malformed("unexpected null VarLong"))
    }

    /// Read a compact long that may be the packed null.
    pub fn read_optional_var_long(&mut self) -> ProtocolResult<Option<i64>> {
        self.ensure(1)?;
        let first = self.data[self.pos];

        if first & 0x80 == 0 {
            self.pos += 1;
            return Ok(Some(i64::from(first)));
        }
        if first & 0x40 == 0 {
            return Ok(Some(i64::from(self.read_u16()? & 0x3FFF)));
        }
        if first & 0x20 == 0 {
            return Ok(Some(i64::from(self.read_i32()? as u32 & 0x1FFF_FFFF)));
        }
        if first == VAR_LONG_NULL {
            self.pos += 1;
            return Ok(None);
        }

        let count = (first & 0x0F) as usize;
        if count > 8 || first & 0x10 != 0 {
            return Err(ProtocolError::malformed(format!("invalid VarLong marker 0x{:02X}", first)));
        }
        self.pos += 1;
        let bytes = self.take(count)?;
        let value = bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
        i64::try_from(value)
            .map(Some)
            .map_err(|_| ProtocolError::malformed("VarLong exceeds i64 range"))
    }
}

impl std::fmt::Debug for InputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputStream")
            .field("len", &self.data.len())
            .field("position", &self.pos)
            .field("mark", &self.mark)
            .field("references", &self.reference_map.as_ref().map(HashMap::len))
            .finish()
    }
}
