//! The capability implemented by every generated message type.

use crate::buffer::{ReadBuffer, WriteBuffer};
use crate::error::{DecodeError, EncodeError};

/// A statically typed LCM message.
///
/// Implementations are emitted by `lcm-gen`; the first eight bytes of
/// every encoded value are the type fingerprint as a big-endian signed
/// 64-bit integer, and `decode` rejects payloads whose fingerprint does
/// not match [`Message::FINGERPRINT`].
pub trait Message: Sized {
    /// Fingerprint of this message type, derived from its IDL definition.
    const FINGERPRINT: u64;

    /// Fingerprint of this value's type.
    fn fingerprint(&self) -> u64 {
        Self::FINGERPRINT
    }

    /// Write the fingerprint and every member, in declaration order, into
    /// `buf`.
    fn encode(&self, buf: &mut WriteBuffer) -> Result<(), EncodeError>;

    /// Read a value back out of `buf`, checking the fingerprint first.
    fn decode(buf: &mut ReadBuffer<'_>) -> Result<Self, DecodeError>;

    /// Encode into a fresh byte vector.
    fn encode_to_vec(&self) -> Result<Vec<u8>, EncodeError> {
        let mut buf = WriteBuffer::new();
        self.encode(&mut buf)?;
        Ok(buf.into_vec())
    }

    /// Decode from the start of a byte slice.
    fn decode_from_slice(data: &[u8]) -> Result<Self, DecodeError> {
        let mut buf = ReadBuffer::new(data);
        Self::decode(&mut buf)
    }
}
