//! # Binary Buffer
//!
//! A growable byte buffer with an explicit read/write position and a limit
//! (the high-water mark of written data). Every binary codec in PlayerSync
//! writes through this type so the wire layout stays identical across
//! servers.
//!
//! ## Wire Layout
//!
//! | Value      | Encoding                                                  |
//! |------------|-----------------------------------------------------------|
//! | primitives | fixed width, configurable byte order (big-endian default) |
//! | varint     | 7 data bits per byte, MSB = continuation, low group first |
//! | bytes      | `varint(length) || raw bytes`                             |
//! | string     | `varint(utf8 length) || utf8 bytes`                       |
//! | uuid       | `i64(most significant) || i64(least significant)`         |
//! | enum       | `varint(wire tag)`                                        |
//!
//! ## Lifecycle
//!
//! A buffer from [`BinaryBuffer::new`] starts empty in write mode. A buffer
//! from [`BinaryBuffer::wrap`] is positioned at zero with the limit at the end
//! of the wrapped data. [`BinaryBuffer::flip`] turns written data into
//! readable data and [`BinaryBuffer::clear`] resets for reuse.
//!
//! A buffer is single-owner; give each serialization call its own.

use crate::error::{Result, SerializationError};
use uuid::Uuid;

/// Hard cap on the encoded length of a string.
pub const MAX_STRING_BYTES: usize = 65_535;
/// Hard cap on the length of a length-prefixed byte array.
pub const MAX_ARRAY_BYTES: usize = 1_000_000;
/// Maximum encoded size of a 32-bit varint.
pub const MAX_VAR_INT_BYTES: usize = 5;
/// Maximum encoded size of a 64-bit varint.
pub const MAX_VAR_LONG_BYTES: usize = 10;

const DEFAULT_CAPACITY: usize = 64;

/// Byte order used for fixed-width primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    #[default]
    BigEndian,
    LittleEndian,
}

/// Explicit, stable wire tags for enums written with
/// [`BinaryBuffer::write_enum`].
///
/// Tags are assigned by hand per variant, so reordering or inserting variants
/// never changes what is on the wire. Retired tags should stay reserved.
pub trait WireTag: Sized {
    /// Type name used in error messages.
    const TYPE_NAME: &'static str;

    fn wire_tag(&self) -> u32;

    fn from_wire_tag(tag: u32) -> Option<Self>;
}

/// Growable byte buffer with position, limit and byte order.
///
/// Invariant: `position <= limit <= capacity`.
///
/// # Examples
///
/// ```rust
/// use playersync_codec::BinaryBuffer;
///
/// let mut buffer = BinaryBuffer::new();
/// buffer.write_var_int(300);
/// buffer.write_string("Steve")?;
///
/// let mut reader = BinaryBuffer::wrap(buffer.to_byte_array());
/// assert_eq!(reader.read_var_int()?, 300);
/// assert_eq!(reader.read_string()?, "Steve");
/// assert!(!reader.has_remaining());
/// # Ok::<(), playersync_codec::SerializationError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryBuffer {
    data: Vec<u8>,
    position: usize,
    limit: usize,
    order: ByteOrder,
}

impl BinaryBuffer {
    /// Creates an empty write-mode buffer with a small default capacity.
    pub fn new() -> Self {
        Self::allocate(DEFAULT_CAPACITY)
    }

    /// Creates an empty write-mode buffer with the given initial capacity.
    pub fn allocate(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity],
            position: 0,
            limit: 0,
            order: ByteOrder::default(),
        }
    }

    /// Wraps existing bytes for reading: position zero, limit at the end.
    pub fn wrap(bytes: impl Into<Vec<u8>>) -> Self {
        let data = bytes.into();
        let limit = data.len();
        Self {
            data,
            position: 0,
            limit,
            order: ByteOrder::default(),
        }
    }

    /// Returns this buffer using the given byte order.
    pub fn with_byte_order(mut self, order: ByteOrder) -> Self {
        self.order = order;
        self
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    pub fn set_byte_order(&mut self, order: ByteOrder) {
        self.order = order;
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Moves the cursor. The new position must not pass the limit.
    pub fn set_position(&mut self, position: usize) -> Result<()> {
        if position > self.limit {
            return Err(SerializationError::InvalidPosition {
                position,
                limit: self.limit,
            });
        }
        self.position = position;
        Ok(())
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Bytes left between the position and the limit.
    pub fn remaining(&self) -> usize {
        self.limit - self.position
    }

    pub fn has_remaining(&self) -> bool {
        self.position < self.limit
    }

    /// Advances the position without reading.
    pub fn skip(&mut self, count: usize) -> Result<()> {
        self.ensure_readable(count)?;
        self.position += count;
        Ok(())
    }

    /// Switches from writing to reading: `limit = position`, `position = 0`.
    pub fn flip(&mut self) {
        self.limit = self.position;
        self.position = 0;
    }

    /// Resets position and limit to zero, keeping the allocation.
    pub fn clear(&mut self) {
        self.position = 0;
        self.limit = 0;
    }

    /// Copies out the written region `[0, limit)`.
    pub fn to_byte_array(&self) -> Vec<u8> {
        self.data[..self.limit].to_vec()
    }

    /// Borrows the written region `[0, limit)`.
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.limit]
    }

    /// Consumes the buffer, returning the written region `[0, limit)`.
    pub fn into_bytes(mut self) -> Vec<u8> {
        self.data.truncate(self.limit);
        self.data
    }

    // ========================================================================
    // Writes
    // ========================================================================

    pub fn write_byte(&mut self, value: u8) {
        self.put(&[value]);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.write_byte(u8::from(value));
    }

    pub fn write_short(&mut self, value: i16) {
        let bytes = match self.order {
            ByteOrder::BigEndian => value.to_be_bytes(),
            ByteOrder::LittleEndian => value.to_le_bytes(),
        };
        self.put(&bytes);
    }

    pub fn write_int(&mut self, value: i32) {
        let bytes = match self.order {
            ByteOrder::BigEndian => value.to_be_bytes(),
            ByteOrder::LittleEndian => value.to_le_bytes(),
        };
        self.put(&bytes);
    }

    pub fn write_long(&mut self, value: i64) {
        let bytes = match self.order {
            ByteOrder::BigEndian => value.to_be_bytes(),
            ByteOrder::LittleEndian => value.to_le_bytes(),
        };
        self.put(&bytes);
    }

    pub fn write_float(&mut self, value: f32) {
        self.write_int(value.to_bits() as i32);
    }

    pub fn write_double(&mut self, value: f64) {
        self.write_long(value.to_bits() as i64);
    }

    /// Writes a 32-bit varint. Negative values are encoded as their unsigned
    /// two's complement and always take five bytes.
    pub fn write_var_int(&mut self, value: i32) {
        let mut remaining = value as u32;
        while remaining & !0x7F != 0 {
            self.write_byte((remaining & 0x7F) as u8 | 0x80);
            remaining >>= 7;
        }
        self.write_byte(remaining as u8);
    }

    /// Writes a 64-bit varint (1 to 10 bytes).
    pub fn write_var_long(&mut self, value: i64) {
        let mut remaining = value as u64;
        while remaining & !0x7F != 0 {
            self.write_byte((remaining & 0x7F) as u8 | 0x80);
            remaining >>= 7;
        }
        self.write_byte(remaining as u8);
    }

    /// Writes a varint length prefix followed by the bytes.
    ///
    /// Arrays longer than [`MAX_ARRAY_BYTES`] are rejected so the buffer never
    /// produces data its own reader refuses.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        check_length(bytes.len(), MAX_ARRAY_BYTES)?;
        self.write_var_int(bytes.len() as i32);
        self.put(bytes);
        Ok(())
    }

    /// Writes bytes without a length prefix; framing is up to the caller.
    pub fn write_raw_bytes(&mut self, bytes: &[u8]) {
        self.put(bytes);
    }

    /// Writes a length-prefixed UTF-8 string of at most [`MAX_STRING_BYTES`].
    pub fn write_string(&mut self, value: &str) -> Result<()> {
        check_length(value.len(), MAX_STRING_BYTES)?;
        self.write_var_int(value.len() as i32);
        self.put(value.as_bytes());
        Ok(())
    }

    /// Writes a presence flag followed by the string when present.
    pub fn write_optional_string(&mut self, value: Option<&str>) -> Result<()> {
        match value {
            Some(text) => {
                check_length(text.len(), MAX_STRING_BYTES)?;
                self.write_bool(true);
                self.write_string(text)
            }
            None => {
                self.write_bool(false);
                Ok(())
            }
        }
    }

    /// Writes the most significant then least significant 64 bits.
    pub fn write_uuid(&mut self, value: &Uuid) {
        let bits = value.as_u128();
        self.write_long((bits >> 64) as u64 as i64);
        self.write_long(bits as u64 as i64);
    }

    /// Writes the value's wire tag as a varint.
    pub fn write_enum<E: WireTag>(&mut self, value: &E) {
        self.write_var_int(value.wire_tag() as i32);
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn read_byte(&mut self) -> Result<u8> {
        let [byte] = self.take::<1>()?;
        Ok(byte)
    }

    /// Any non-zero byte reads as `true`.
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_byte()? != 0)
    }

    pub fn read_short(&mut self) -> Result<i16> {
        let bytes = self.take::<2>()?;
        Ok(match self.order {
            ByteOrder::BigEndian => i16::from_be_bytes(bytes),
            ByteOrder::LittleEndian => i16::from_le_bytes(bytes),
        })
    }

    pub fn read_int(&mut self) -> Result<i32> {
        let bytes = self.take::<4>()?;
        Ok(match self.order {
            ByteOrder::BigEndian => i32::from_be_bytes(bytes),
            ByteOrder::LittleEndian => i32::from_le_bytes(bytes),
        })
    }

    pub fn read_long(&mut self) -> Result<i64> {
        let bytes = self.take::<8>()?;
        Ok(match self.order {
            ByteOrder::BigEndian => i64::from_be_bytes(bytes),
            ByteOrder::LittleEndian => i64::from_le_bytes(bytes),
        })
    }

    pub fn read_float(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_int()? as u32))
    }

    pub fn read_double(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.read_long()? as u64))
    }

    /// Reads a 32-bit varint.
    ///
    /// # Errors
    ///
    /// [`SerializationError::MalformedVarInt`] when the fifth byte still has
    /// its continuation bit set; [`SerializationError::BufferUnderflow`] when
    /// the data ends mid-varint. The position is restored on failure.
    pub fn read_var_int(&mut self) -> Result<i32> {
        self.rewind_on_error(|buffer| {
            let mut value = 0u32;
            for index in 0..MAX_VAR_INT_BYTES {
                let byte = buffer.read_byte()?;
                value |= u32::from(byte & 0x7F) << (7 * index);
                if byte & 0x80 == 0 {
                    return Ok(value as i32);
                }
            }
            Err(SerializationError::MalformedVarInt {
                max_bytes: MAX_VAR_INT_BYTES,
            })
        })
    }

    /// Reads a 64-bit varint, failing after ten continuation bytes.
    pub fn read_var_long(&mut self) -> Result<i64> {
        self.rewind_on_error(|buffer| {
            let mut value = 0u64;
            for index in 0..MAX_VAR_LONG_BYTES {
                let byte = buffer.read_byte()?;
                value |= u64::from(byte & 0x7F) << (7 * index);
                if byte & 0x80 == 0 {
                    return Ok(value as i64);
                }
            }
            Err(SerializationError::MalformedVarInt {
                max_bytes: MAX_VAR_LONG_BYTES,
            })
        })
    }

    /// Reads a length-prefixed byte array.
    ///
    /// The claimed length is checked against [`MAX_ARRAY_BYTES`] before any
    /// allocation happens.
    pub fn read_bytes(&mut self) -> Result<Vec<u8>> {
        self.rewind_on_error(|buffer| {
            let length = buffer.read_length(MAX_ARRAY_BYTES)?;
            buffer.read_raw_bytes(length)
        })
    }

    /// Reads exactly `count` bytes with no length prefix.
    pub fn read_raw_bytes(&mut self, count: usize) -> Result<Vec<u8>> {
        self.ensure_readable(count)?;
        let bytes = self.data[self.position..self.position + count].to_vec();
        self.position += count;
        Ok(bytes)
    }

    /// Reads a length-prefixed UTF-8 string of at most [`MAX_STRING_BYTES`].
    pub fn read_string(&mut self) -> Result<String> {
        self.rewind_on_error(|buffer| {
            let length = buffer.read_length(MAX_STRING_BYTES)?;
            let bytes = buffer.read_raw_bytes(length)?;
            Ok(String::from_utf8(bytes)?)
        })
    }

    pub fn read_optional_string(&mut self) -> Result<Option<String>> {
        self.rewind_on_error(|buffer| {
            if buffer.read_bool()? {
                buffer.read_string().map(Some)
            } else {
                Ok(None)
            }
        })
    }

    pub fn read_uuid(&mut self) -> Result<Uuid> {
        self.rewind_on_error(|buffer| {
            let most = buffer.read_long()? as u64;
            let least = buffer.read_long()? as u64;
            Ok(Uuid::from_u128((u128::from(most) << 64) | u128::from(least)))
        })
    }

    /// Reads a wire tag and maps it back to the enum variant.
    pub fn read_enum<E: WireTag>(&mut self) -> Result<E> {
        self.rewind_on_error(|buffer| {
            let tag = buffer.read_var_int()? as u32;
            E::from_wire_tag(tag).ok_or(SerializationError::UnknownTag {
                type_name: E::TYPE_NAME,
                tag,
            })
        })
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn read_length(&mut self, max: usize) -> Result<usize> {
        let length = self.read_var_int()?;
        if length < 0 {
            return Err(SerializationError::NegativeLength(length));
        }
        let length = length as usize;
        check_length(length, max)?;
        Ok(length)
    }

    fn ensure_readable(&self, needed: usize) -> Result<()> {
        let available = self.remaining();
        if needed > available {
            return Err(SerializationError::BufferUnderflow { needed, available });
        }
        Ok(())
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        self.ensure_readable(N)?;
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(&self.data[self.position..self.position + N]);
        self.position += N;
        Ok(bytes)
    }

    fn put(&mut self, bytes: &[u8]) {
        let end = self.position + bytes.len();
        self.ensure_capacity(end);
        self.data[self.position..end].copy_from_slice(bytes);
        self.position = end;
        self.limit = self.limit.max(end);
    }

    fn ensure_capacity(&mut self, required: usize) {
        if required <= self.data.len() {
            return;
        }
        let mut capacity = self.data.len().max(DEFAULT_CAPACITY);
        while capacity < required {
            capacity *= 2;
        }
        self.data.resize(capacity, 0);
    }

    /// Runs a multi-part read, restoring the position if any part fails.
    fn rewind_on_error<R>(&mut self, read: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        let start = self.position;
        let result = read(self);
        if result.is_err() {
            self.position = start;
        }
        result
    }
}

impl Default for BinaryBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Vec<u8>> for BinaryBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        Self::wrap(bytes)
    }
}

/// Number of bytes [`BinaryBuffer::write_var_int`] uses for `value`.
pub fn var_int_size(value: i32) -> usize {
    let bits = 32 - (value as u32).leading_zeros() as usize;
    bits.div_ceil(7).max(1)
}

fn check_length(length: usize, max: usize) -> Result<()> {
    if length > max {
        return Err(SerializationError::LengthExceeded { length, max });
    }
    Ok(())
}
