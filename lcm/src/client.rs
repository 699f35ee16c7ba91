//! The client instance.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, trace};

use lcm_codec::Message;

use crate::error::Error;
use crate::fragment::FragmentTable;
use crate::packet::{self, Packet, MAX_CHANNEL_LENGTH, MAX_SHORT_SIZE};
use crate::provider::UdpmConfig;
use crate::subscription::{Subscription, SubscriptionList};

/// Largest possible UDP datagram; the receive scratch buffer never needs
/// more.
const RECV_BUFFER_LEN: usize = 65_535;

/// Kernel receive buffer requested for the subscription socket, so a
/// burst of fragments does not overflow it before the caller drains.
const KERNEL_RECV_BUFFER: usize = 2 * 1024 * 1024;

struct Sockets {
    send: UdpSocket,
    recv: UdpSocket,
}

/// A publish/subscribe client over UDP multicast.
///
/// One instance exclusively owns two sockets (send and receive), its
/// subscription list, its fragment reassembly table, and its sequence
/// counter. There are no internal threads: the caller drives the
/// receive path by calling [`handle`](Lcm::handle) or
/// [`handle_timeout`](Lcm::handle_timeout) from its own loop, and every
/// subscription handler runs on that caller's stack.
pub struct Lcm {
    destination: SocketAddrV4,
    sockets: Option<Sockets>,
    sequence: u32,
    subscriptions: SubscriptionList,
    fragments: FragmentTable,
    scratch: Vec<u8>,
}

impl Lcm {
    /// Connect with the provider named by the `LCM_DEFAULT_URL`
    /// environment variable, or the default `udpm://` group when it is
    /// unset.
    pub fn new() -> Result<Self, Error> {
        match std::env::var("LCM_DEFAULT_URL") {
            Ok(url) => Self::with_url(&url),
            Err(_) => Self::with_config(UdpmConfig::default()),
        }
    }

    /// Connect with an explicit `udpm://[address[:port]]?ttl=N` url.
    pub fn with_url(url: &str) -> Result<Self, Error> {
        Self::with_config(UdpmConfig::parse(url)?)
    }

    /// Connect with an already parsed provider configuration.
    pub fn with_config(config: UdpmConfig) -> Result<Self, Error> {
        let recv = bind_recv(&config)?;
        let send = bind_send(&config)?;
        debug!(
            group = %config.address,
            port = config.port,
            ttl = config.ttl,
            "joined multicast group"
        );
        Ok(Self {
            destination: SocketAddrV4::new(config.address, config.port),
            sockets: Some(Sockets { send, recv }),
            sequence: 0,
            subscriptions: SubscriptionList::default(),
            fragments: FragmentTable::new(),
            scratch: vec![0; RECV_BUFFER_LEN],
        })
    }

    /// Publish a raw payload on `channel`.
    ///
    /// Goes out as one short packet when `channel + NUL + payload` fits
    /// [`MAX_SHORT_SIZE`](crate::MAX_SHORT_SIZE) bytes, otherwise as a
    /// fragment sequence. One sequence number is consumed per call
    /// either way.
    pub fn publish(&mut self, channel: &str, payload: &[u8]) -> Result<(), Error> {
        check_channel(channel)?;
        let sockets = self.sockets.as_ref().ok_or(Error::InstanceClosed)?;
        let sequence = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);

        if packet::short_size(channel, payload) <= MAX_SHORT_SIZE {
            let datagram = packet::encode_short(sequence, channel, payload);
            sockets.send.send_to(&datagram, self.destination)?;
            trace!(channel, bytes = payload.len(), "published short message");
        } else {
            let datagrams = packet::encode_fragments(sequence, channel, payload)?;
            let count = datagrams.len();
            for datagram in datagrams {
                sockets.send.send_to(&datagram, self.destination)?;
            }
            trace!(
                channel,
                bytes = payload.len(),
                fragments = count,
                "published fragmented message"
            );
        }
        Ok(())
    }

    /// Encode `message` and publish it on `channel`.
    pub fn publish_message<M: Message>(&mut self, channel: &str, message: &M) -> Result<(), Error> {
        let payload = message.encode_to_vec()?;
        self.publish(channel, &payload)
    }

    /// Subscribe `handler` to every channel the regular expression
    /// `pattern` matches. The pattern is anchored at both ends, so
    /// `SENSOR_.*` matches `SENSOR_1` but not `XSENSOR_1`. Takes effect
    /// for the next delivery.
    pub fn subscribe<F>(&mut self, pattern: &str, handler: F) -> Result<Subscription, Error>
    where
        F: FnMut(&str, &[u8]) + 'static,
    {
        if self.sockets.is_none() {
            return Err(Error::InstanceClosed);
        }
        self.subscriptions.subscribe(pattern, Box::new(handler))
    }

    /// Subscribe a typed handler. Payloads that fail to decode as `M`
    /// are logged at debug level and dropped.
    pub fn subscribe_message<M, F>(&mut self, pattern: &str, mut handler: F) -> Result<Subscription, Error>
    where
        M: Message,
        F: FnMut(&str, M) + 'static,
    {
        self.subscribe(pattern, move |channel, payload| {
            match M::decode_from_slice(payload) {
                Ok(message) => handler(channel, message),
                Err(error) => {
                    debug!(channel, %error, "dropping message that failed to decode")
                }
            }
        })
    }

    /// Remove a subscription by identity. Takes effect for the next
    /// delivery; removing a handle twice is a no-op.
    pub fn unsubscribe(&mut self, handle: Subscription) -> Result<(), Error> {
        if self.sockets.is_none() {
            return Err(Error::InstanceClosed);
        }
        if !self.subscriptions.unsubscribe(handle) {
            debug!(?handle, "unsubscribe of an unknown handle ignored");
        }
        Ok(())
    }

    /// Block until one datagram has been read and run through the
    /// receive path. A datagram that completes a message dispatches to
    /// every matching subscription before this returns; a malformed or
    /// partial one is absorbed silently.
    pub fn handle(&mut self) -> Result<(), Error> {
        let sockets = self.sockets.as_ref().ok_or(Error::InstanceClosed)?;
        sockets.recv.set_read_timeout(None)?;
        let (len, from) = sockets.recv.recv_from(&mut self.scratch)?;
        process_datagram(
            &mut self.fragments,
            &mut self.subscriptions,
            from,
            &self.scratch[..len],
        );
        Ok(())
    }

    /// Like [`handle`](Lcm::handle), but gives up after `timeout`.
    /// Returns `Ok(false)` when nothing arrived in time.
    pub fn handle_timeout(&mut self, timeout: Duration) -> Result<bool, Error> {
        let sockets = self.sockets.as_ref().ok_or(Error::InstanceClosed)?;
        sockets.recv.set_read_timeout(Some(timeout))?;
        let (len, from) = match sockets.recv.recv_from(&mut self.scratch) {
            Ok(received) => received,
            Err(err)
                if matches!(err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) =>
            {
                return Ok(false)
            }
            Err(err) => return Err(err.into()),
        };
        process_datagram(
            &mut self.fragments,
            &mut self.subscriptions,
            from,
            &self.scratch[..len],
        );
        Ok(true)
    }

    /// Close the instance: both sockets are closed, the subscription
    /// list is cleared, and partially reassembled messages are dropped
    /// without ever being surfaced. Idempotent. Every other operation on
    /// a closed instance fails with [`Error::InstanceClosed`].
    pub fn close(&mut self) {
        if self.sockets.take().is_some() {
            self.subscriptions.clear();
            self.fragments.clear();
            debug!("closed lcm instance");
        }
    }

    /// Whether [`close`](Lcm::close) has run.
    pub fn is_closed(&self) -> bool {
        self.sockets.is_none()
    }
}

impl Drop for Lcm {
    fn drop(&mut self) {
        self.close();
    }
}

fn check_channel(channel: &str) -> Result<(), Error> {
    if channel.len() > MAX_CHANNEL_LENGTH {
        return Err(Error::ChannelNameTooLong(channel.len()));
    }
    if channel.bytes().any(|byte| byte == 0) {
        return Err(Error::ChannelNameInvalid);
    }
    Ok(())
}

/// Run one datagram through parse → reassemble → dispatch. Anything
/// malformed is dropped here.
fn process_datagram(
    fragments: &mut FragmentTable,
    subscriptions: &mut SubscriptionList,
    from: SocketAddr,
    datagram: &[u8],
) {
    match packet::parse(datagram) {
        Some(Packet::Short { channel, payload }) => {
            trace!(channel, bytes = payload.len(), "received short message");
            subscriptions.dispatch(channel, payload);
        }
        Some(Packet::Fragment(fragment)) => {
            if let Some((channel, payload)) = fragments.accept(from, fragment) {
                trace!(
                    channel = %channel,
                    bytes = payload.len(),
                    "reassembled fragmented message"
                );
                subscriptions.dispatch(&channel, &payload);
            }
        }
        None => debug!(bytes = datagram.len(), "dropping unrecognized datagram"),
    }
}

/// Receive socket: bound to the multicast port on all interfaces,
/// reusable so several instances on one host can share it, joined to
/// the group with loopback enabled.
fn bind_recv(config: &UdpmConfig) -> io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    if let Err(err) = socket.set_recv_buffer_size(KERNEL_RECV_BUFFER) {
        debug!(%err, "could not grow the kernel receive buffer");
    }
    let bind_addr: SocketAddr = (Ipv4Addr::UNSPECIFIED, config.port).into();
    socket.bind(&bind_addr.into())?;
    socket.join_multicast_v4(&config.address, &Ipv4Addr::UNSPECIFIED)?;
    socket.set_multicast_loop_v4(true)?;
    Ok(socket.into())
}

/// Send socket: unbound port, with the configured TTL and loopback so
/// local subscribers hear their own host.
fn bind_send(config: &UdpmConfig) -> io::Result<UdpSocket> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
    socket.set_multicast_ttl_v4(config.ttl)?;
    socket.set_multicast_loop_v4(true)?;
    Ok(socket)
}
