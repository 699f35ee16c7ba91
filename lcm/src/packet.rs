//! Short and fragmented wire packet layouts.
//!
//! All multi-byte fields are big-endian. A short packet carries one
//! whole message; a fragment packet carries a contiguous slice of a
//! larger payload together with enough header to place it.

use lcm_codec::ReadBuffer;

use crate::error::Error;

/// Magic at the head of a single-packet message.
pub(crate) const MAGIC_SHORT: u32 = 0x4c43_3032;
/// Magic at the head of each fragment packet.
pub(crate) const MAGIC_FRAGMENT: u32 = 0x4c43_3033;

/// Longest channel name in bytes, excluding the NUL terminator.
pub const MAX_CHANNEL_LENGTH: usize = 63;
/// Largest `channel + NUL + payload` that still goes out as one short
/// packet.
pub const MAX_SHORT_SIZE: usize = 65_499;
/// Largest slice of payload one fragment can carry. Fragment zero also
/// carries the channel, which eats into its budget.
pub const MAX_FRAGMENT_SIZE: usize = 65_487;
/// Most fragments one message may be split into.
pub const MAX_FRAGMENTS: usize = 65_535;

/// Bytes a message occupies in short form, header excluded.
pub(crate) fn short_size(channel: &str, payload: &[u8]) -> usize {
    channel.len() + 1 + payload.len()
}

/// Build the single short-form packet for a message.
pub(crate) fn encode_short(sequence: u32, channel: &str, payload: &[u8]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(8 + short_size(channel, payload));
    packet.extend_from_slice(&MAGIC_SHORT.to_be_bytes());
    packet.extend_from_slice(&sequence.to_be_bytes());
    packet.extend_from_slice(channel.as_bytes());
    packet.push(0);
    packet.extend_from_slice(payload);
    packet
}

/// Number of fragments a payload needs. Fragment zero's budget is
/// reduced by the channel and its NUL terminator.
pub(crate) fn fragment_count(channel: &str, payload_len: usize) -> usize {
    let first_budget = MAX_FRAGMENT_SIZE - (channel.len() + 1);
    let first = payload_len.min(first_budget);
    1 + (payload_len - first).div_ceil(MAX_FRAGMENT_SIZE)
}

/// Split a payload into fragment packets, ascending index order. Every
/// fragment shares the message's sequence number; only fragment zero
/// carries the channel.
pub(crate) fn encode_fragments(
    sequence: u32,
    channel: &str,
    payload: &[u8],
) -> Result<Vec<Vec<u8>>, Error> {
    let first_budget = MAX_FRAGMENT_SIZE - (channel.len() + 1);
    let count = fragment_count(channel, payload.len());
    if count > MAX_FRAGMENTS {
        return Err(Error::MessageTooLarge(payload.len()));
    }

    let mut packets = Vec::with_capacity(count);
    let mut offset = 0usize;
    for index in 0..count {
        let budget = if index == 0 { first_budget } else { MAX_FRAGMENT_SIZE };
        let end = (offset + budget).min(payload.len());
        let chunk = &payload[offset..end];

        let channel_len = if index == 0 { channel.len() + 1 } else { 0 };
        let mut packet = Vec::with_capacity(20 + channel_len + chunk.len());
        packet.extend_from_slice(&MAGIC_FRAGMENT.to_be_bytes());
        packet.extend_from_slice(&sequence.to_be_bytes());
        packet.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        packet.extend_from_slice(&(offset as u32).to_be_bytes());
        packet.extend_from_slice(&(index as u16).to_be_bytes());
        packet.extend_from_slice(&(count as u16).to_be_bytes());
        if index == 0 {
            packet.extend_from_slice(channel.as_bytes());
            packet.push(0);
        }
        packet.extend_from_slice(chunk);

        packets.push(packet);
        offset = end;
    }
    Ok(packets)
}

/// One parsed datagram.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Packet<'a> {
    /// A whole message in one packet.
    Short {
        channel: &'a str,
        payload: &'a [u8],
    },
    /// A slice of a fragmented message.
    Fragment(Fragment<'a>),
}

/// Header and chunk of one fragment packet.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Fragment<'a> {
    pub sequence: u32,
    pub total_size: u32,
    pub offset: u32,
    pub index: u16,
    pub count: u16,
    /// Present on fragment zero only.
    pub channel: Option<&'a str>,
    pub chunk: &'a [u8],
}

/// Parse one datagram. Returns `None` for anything that should be
/// dropped: short datagrams, unknown magics, malformed headers.
pub(crate) fn parse(datagram: &[u8]) -> Option<Packet<'_>> {
    if datagram.len() < 8 {
        return None;
    }
    let mut buf = ReadBuffer::new(datagram);
    let magic = buf.read_u32().ok()?;
    let sequence = buf.read_u32().ok()?;
    match magic {
        MAGIC_SHORT => {
            let rest = buf.read_bytes(buf.remaining()).ok()?;
            let (channel, payload) = split_channel(rest)?;
            Some(Packet::Short { channel, payload })
        }
        MAGIC_FRAGMENT => {
            let total_size = buf.read_u32().ok()?;
            let offset = buf.read_u32().ok()?;
            let index = buf.read_u16().ok()?;
            let count = buf.read_u16().ok()?;
            if count == 0 || index >= count {
                return None;
            }
            let rest = buf.read_bytes(buf.remaining()).ok()?;
            let (channel, chunk) = if index == 0 {
                let (channel, chunk) = split_channel(rest)?;
                (Some(channel), chunk)
            } else {
                (None, rest)
            };
            Some(Packet::Fragment(Fragment {
                sequence,
                total_size,
                offset,
                index,
                count,
                channel,
                chunk,
            }))
        }
        _ => None,
    }
}

fn split_channel(data: &[u8]) -> Option<(&str, &[u8])> {
    let nul = data.iter().position(|byte| *byte == 0)?;
    let channel = core::str::from_utf8(&data[..nul]).ok()?;
    Some((channel, &data[nul + 1..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_packet_layout() {
        let packet = encode_short(7, "TEST", &[1, 2, 3, 4, 5]);
        assert_eq!(
            packet,
            [
                0x4c, 0x43, 0x30, 0x32, // "LC02"
                0, 0, 0, 7, // sequence
                b'T', b'E', b'S', b'T', 0, // channel
                1, 2, 3, 4, 5, // payload
            ]
        );
    }

    #[test]
    fn short_packet_parses_back() {
        let packet = encode_short(42, "TEST", &[1, 2, 3, 4, 5]);
        match parse(&packet).unwrap() {
            Packet::Short { channel, payload } => {
                assert_eq!(channel, "TEST");
                assert_eq!(payload, [1, 2, 3, 4, 5]);
            }
            other => panic!("expected a short packet, got {other:?}"),
        }
    }

    #[test]
    fn fragments_cover_the_payload_in_order() {
        let payload: Vec<u8> = (0..200_000u32).map(|i| i as u8).collect();
        let packets = encode_fragments(9, "BIG", &payload).unwrap();
        // 65483 + 2 * 65487 fills the first three packets.
        assert_eq!(packets.len(), 4);

        let mut reassembled = vec![0u8; payload.len()];
        for (i, raw) in packets.iter().enumerate() {
            let Some(Packet::Fragment(fragment)) = parse(raw) else {
                panic!("fragment {i} did not parse");
            };
            assert_eq!(fragment.sequence, 9);
            assert_eq!(fragment.total_size, 200_000);
            assert_eq!(fragment.index, i as u16);
            assert_eq!(fragment.count, 4);
            assert_eq!(fragment.channel, (i == 0).then_some("BIG"));
            assert!(fragment.chunk.len() <= MAX_FRAGMENT_SIZE);
            let offset = fragment.offset as usize;
            reassembled[offset..offset + fragment.chunk.len()].copy_from_slice(fragment.chunk);
        }
        assert_eq!(reassembled, payload);
    }

    #[test]
    fn fragment_zero_budget_shrinks_by_the_channel() {
        let payload = vec![0u8; 2 * MAX_FRAGMENT_SIZE];
        let packets = encode_fragments(0, "chan", &payload).unwrap();
        let Some(Packet::Fragment(first)) = parse(&packets[0]) else {
            panic!("no fragment");
        };
        assert_eq!(first.chunk.len(), MAX_FRAGMENT_SIZE - ("chan".len() + 1));
    }

    #[test]
    fn the_fragment_index_caps_the_message_size() {
        let first_budget = MAX_FRAGMENT_SIZE - ("x".len() + 1);
        let largest = first_budget + (MAX_FRAGMENTS - 1) * MAX_FRAGMENT_SIZE;
        assert_eq!(fragment_count("x", largest), MAX_FRAGMENTS);
        assert_eq!(fragment_count("x", largest + 1), MAX_FRAGMENTS + 1);
    }

    #[test]
    fn runts_and_unknown_magics_are_dropped() {
        assert_eq!(parse(&[1, 2, 3]), None);
        assert_eq!(parse(&[0; 7]), None);
        let mut packet = encode_short(0, "A", &[1]);
        packet[0] = 0xff;
        assert_eq!(parse(&packet), None);
    }

    #[test]
    fn short_packet_without_a_channel_terminator_is_dropped() {
        let packet = [0x4c, 0x43, 0x30, 0x32, 0, 0, 0, 0, b'A', b'B'];
        assert_eq!(parse(&packet), None);
    }

    #[test]
    fn fragment_with_inconsistent_index_is_dropped() {
        let payload = vec![1u8; MAX_FRAGMENT_SIZE + 10];
        let packets = encode_fragments(3, "C", &payload).unwrap();
        let mut raw = packets[1].clone();
        // index >= count
        raw[16] = 0xff;
        raw[17] = 0xff;
        assert_eq!(parse(&raw), None);
    }
}
