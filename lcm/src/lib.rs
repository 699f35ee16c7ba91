//! Lightweight publish/subscribe messaging over UDP multicast.
//!
//! An [`Lcm`] instance joins a multicast group, publishes messages on
//! named channels, and delivers received messages to regex-matched
//! subscriptions. Messages larger than one UDP datagram are fragmented
//! on send and reassembled per sender on receive. The caller drives the
//! receive path: each [`Lcm::handle`] / [`Lcm::handle_timeout`] call
//! reads one datagram and runs it through reassembly and dispatch.

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(unused_must_use)]

mod client;
mod error;
mod fragment;
mod packet;
mod provider;
mod subscription;

pub use client::Lcm;
pub use error::Error;
pub use packet::{MAX_CHANNEL_LENGTH, MAX_FRAGMENTS, MAX_FRAGMENT_SIZE, MAX_SHORT_SIZE};
pub use provider::UdpmConfig;
pub use subscription::{Handler, Subscription};

pub use lcm_codec::Message;
