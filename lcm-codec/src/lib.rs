//! Wire codec runtime shared by generated LCM message types.
//!
//! Every struct emitted by `lcm-gen` implements [`Message`] and moves its
//! bytes through the cursor buffers defined here. The encoding is
//! big-endian throughout and starts with the 64-bit type fingerprint of
//! the encoded struct.

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(unused_must_use)]

pub mod buffer;
pub mod error;
pub mod message;

pub use buffer::{element_count, read_fixed_array, ReadBuffer, WriteBuffer};
pub use error::{DecodeError, EncodeError};
pub use message::Message;
