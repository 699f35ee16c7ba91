//! Growing-position byte buffers with big-endian typed accessors.

use crate::error::{DecodeError, EncodeError};

macro_rules! write_be {
    ($($(#[$attr:meta])* $name:ident: $ty:ty),* $(,)?) => {
        $(
            $(#[$attr])*
            pub fn $name(&mut self, value: $ty) -> Result<(), EncodeError> {
                self.data.extend_from_slice(&value.to_be_bytes());
                Ok(())
            }
        )*
    };
}

macro_rules! read_be {
    ($($(#[$attr:meta])* $name:ident: $ty:ty),* $(,)?) => {
        $(
            $(#[$attr])*
            pub fn $name(&mut self) -> Result<$ty, DecodeError> {
                const SIZE: usize = core::mem::size_of::<$ty>();
                let bytes = self.take(SIZE)?;
                let mut raw = [0u8; SIZE];
                raw.copy_from_slice(bytes);
                Ok(<$ty>::from_be_bytes(raw))
            }
        )*
    };
}

/// Append-only byte buffer used by message `encode` implementations.
///
/// Every write appends at the cursor, which always sits at the end of the
/// filled region.
#[derive(Debug, Default, Clone)]
pub struct WriteBuffer {
    data: Vec<u8>,
}

impl WriteBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty buffer with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// View of the filled region.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Consume the buffer, returning the filled bytes.
    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    /// Append a raw byte run.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), EncodeError> {
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    write_be! {
        /// Append a signed byte.
        write_i8: i8,
        /// Append an unsigned byte.
        write_u8: u8,
        /// Append a big-endian `i16`.
        write_i16: i16,
        /// Append a big-endian `u16`.
        write_u16: u16,
        /// Append a big-endian `i32`.
        write_i32: i32,
        /// Append a big-endian `u32`.
        write_u32: u32,
        /// Append a big-endian `i64`.
        write_i64: i64,
        /// Append a big-endian `u64`.
        write_u64: u64,
        /// Append a big-endian IEEE-754 `f32`.
        write_f32: f32,
        /// Append a big-endian IEEE-754 `f64`.
        write_f64: f64,
    }

    /// Append a boolean as a single `0`/`1` byte.
    pub fn write_bool(&mut self, value: bool) -> Result<(), EncodeError> {
        self.write_u8(u8::from(value))
    }

    /// Append a string in wire form: a 32-bit big-endian byte length that
    /// counts the trailing NUL, the UTF-8 payload, then the NUL itself.
    pub fn write_string(&mut self, value: &str) -> Result<(), EncodeError> {
        let len = value
            .len()
            .checked_add(1)
            .filter(|len| u32::try_from(*len).is_ok())
            .ok_or(EncodeError::StringTooLong(value.len()))?;
        self.write_u32(len as u32)?;
        self.data.extend_from_slice(value.as_bytes());
        self.write_u8(0)
    }
}

/// Borrowed byte slice with a read cursor, used by message `decode`
/// implementations. Reads past the filled region fail with
/// [`DecodeError::Eof`].
#[derive(Debug, Clone)]
pub struct ReadBuffer<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> ReadBuffer<'a> {
    /// Wrap a byte slice for reading from its start.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Current cursor offset.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Bytes left before the end of the buffer.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        if len > self.remaining() {
            return Err(DecodeError::Eof {
                requested: len,
                remaining: self.remaining(),
            });
        }
        let bytes = &self.data[self.position..self.position + len];
        self.position += len;
        Ok(bytes)
    }

    /// Read a raw byte run of exactly `len` bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        self.take(len)
    }

    read_be! {
        /// Read a signed byte.
        read_i8: i8,
        /// Read an unsigned byte.
        read_u8: u8,
        /// Read a big-endian `i16`.
        read_i16: i16,
        /// Read a big-endian `u16`.
        read_u16: u16,
        /// Read a big-endian `i32`.
        read_i32: i32,
        /// Read a big-endian `u32`.
        read_u32: u32,
        /// Read a big-endian `i64`.
        read_i64: i64,
        /// Read a big-endian `u64`.
        read_u64: u64,
        /// Read a big-endian IEEE-754 `f32`.
        read_f32: f32,
        /// Read a big-endian IEEE-754 `f64`.
        read_f64: f64,
    }

    /// Read a boolean byte. Any non-zero value reads as `true`.
    pub fn read_bool(&mut self) -> Result<bool, DecodeError> {
        Ok(self.read_u8()? != 0)
    }

    /// Read a string in wire form. The payload is the prefixed length
    /// minus one; the NUL terminator is consumed and discarded.
    pub fn read_string(&mut self) -> Result<String, DecodeError> {
        let len = self.read_u32()?;
        if len == 0 {
            return Err(DecodeError::InvalidLength(len));
        }
        let bytes = self.take(len as usize)?;
        let (payload, terminator) = bytes.split_at(bytes.len() - 1);
        if terminator != [0] {
            return Err(DecodeError::MissingNul);
        }
        let text = core::str::from_utf8(payload).map_err(|_| DecodeError::Utf8)?;
        Ok(text.to_owned())
    }
}

/// Read a fixed-size array by decoding `N` elements in order.
pub fn read_fixed_array<'a, T, const N: usize>(
    buf: &mut ReadBuffer<'a>,
    mut element: impl FnMut(&mut ReadBuffer<'a>) -> Result<T, DecodeError>,
) -> Result<[T; N], DecodeError> {
    let mut elements = Vec::with_capacity(N);
    for _ in 0..N {
        elements.push(element(buf)?);
    }
    Ok(elements
        .try_into()
        .unwrap_or_else(|_| unreachable!("exactly N elements were decoded")))
}

/// Convert a decoded count member into a sequence length, rejecting
/// negative values.
pub fn element_count(count: impl Into<i64>) -> Result<usize, DecodeError> {
    let count = count.into();
    usize::try_from(count).map_err(|_| DecodeError::InvalidCount(count))
}
