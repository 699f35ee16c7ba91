//! Client error variants.

use std::io;

use thiserror::Error;

use crate::packet::{MAX_CHANNEL_LENGTH, MAX_FRAGMENTS};

/// Anything that can go wrong constructing or using an [`Lcm`]
/// instance.
///
/// [`Lcm`]: crate::Lcm
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The provider url had an unknown scheme or was malformed.
    #[error("invalid provider url {0}")]
    InvalidProvider(String),
    /// The channel name is longer than the wire format allows.
    #[error("channel name of {0} bytes exceeds the {max}-byte limit", max = MAX_CHANNEL_LENGTH)]
    ChannelNameTooLong(usize),
    /// The channel name contains a NUL byte and cannot be framed.
    #[error("channel name contains a NUL byte")]
    ChannelNameInvalid,
    /// The payload would need more fragments than the wire format can
    /// index.
    #[error("message of {0} bytes needs more than {max} fragments", max = MAX_FRAGMENTS)]
    MessageTooLarge(usize),
    /// The instance has been closed.
    #[error("instance has been closed")]
    InstanceClosed,
    /// The subscription pattern is not a valid regular expression.
    #[error("invalid subscription pattern")]
    Pattern(#[from] regex::Error),
    /// Encoding a typed message failed.
    #[error(transparent)]
    Encode(#[from] lcm_codec::EncodeError),
    /// Socket creation, send, or receive failure.
    #[error(transparent)]
    Io(#[from] io::Error),
}
