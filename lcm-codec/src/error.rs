//! Encode and decode error variants.

use thiserror::Error;

/// Errors produced while encoding a message into a
/// [`WriteBuffer`](crate::WriteBuffer).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum EncodeError {
    /// A string payload does not fit the 32-bit length prefix.
    #[error("string of {0} bytes does not fit the 32-bit length prefix")]
    StringTooLong(usize),
}

/// Errors produced while decoding a message from a
/// [`ReadBuffer`](crate::ReadBuffer).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum DecodeError {
    /// A read ran past the filled region of the buffer.
    #[error("read of {requested} bytes past the end of the buffer ({remaining} remaining)")]
    Eof {
        /// Bytes the failed read asked for.
        requested: usize,
        /// Bytes that were still available.
        remaining: usize,
    },
    /// A string length prefix was unusable. The prefix counts the NUL
    /// terminator, so it can never be zero.
    #[error("invalid string length prefix {0}")]
    InvalidLength(u32),
    /// A string payload was not terminated by a NUL byte.
    #[error("string payload is missing its NUL terminator")]
    MissingNul,
    /// A string payload was not valid UTF-8.
    #[error("string payload is not valid UTF-8")]
    Utf8,
    /// A decoded element count cannot index a sequence.
    #[error("invalid element count {0}")]
    InvalidCount(i64),
    /// The fingerprint at the head of the message does not match the
    /// decoded type.
    #[error("fingerprint mismatch: expected {expected:#018x}, found {found:#018x}")]
    FingerprintMismatch {
        /// Fingerprint of the type that tried to decode.
        expected: u64,
        /// Fingerprint found on the wire.
        found: u64,
    },
}
