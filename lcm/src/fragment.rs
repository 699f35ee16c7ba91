//! Per-sender reassembly of fragmented messages.

use std::collections::HashMap;
use std::net::SocketAddr;

use tracing::debug;

use crate::packet::Fragment;

/// Reassembly state for one `(sender, sequence)` pair.
struct Slot {
    total_size: u32,
    /// Established when fragment zero arrives.
    channel: Option<String>,
    data: Vec<u8>,
    pending: u16,
}

/// The process-wide reassembly table of an instance. Slots are created
/// lazily and destroyed on completion or inconsistency; there is no
/// timeout, so a partial message lingers until a conflicting declared
/// size evicts it or the instance closes.
#[derive(Default)]
pub(crate) struct FragmentTable {
    slots: HashMap<(SocketAddr, u32), Slot>,
}

impl FragmentTable {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    /// Fold one fragment into the table. Returns the channel and the
    /// complete payload once every fragment of the message has arrived.
    pub fn accept(
        &mut self,
        from: SocketAddr,
        fragment: Fragment<'_>,
    ) -> Option<(String, Vec<u8>)> {
        let key = (from, fragment.sequence);

        let conflicting = self
            .slots
            .get(&key)
            .is_some_and(|slot| slot.total_size != fragment.total_size);
        if conflicting {
            debug!(
                sender = %from,
                sequence = fragment.sequence,
                "conflicting declared size, dropping the partial message"
            );
            self.slots.remove(&key);
        }
        let slot = self.slots.entry(key).or_insert_with(|| Slot {
            total_size: fragment.total_size,
            channel: None,
            data: vec![0; fragment.total_size as usize],
            pending: fragment.count,
        });

        if let Some(channel) = fragment.channel {
            slot.channel = Some(channel.to_owned());
        }

        match (fragment.offset as usize).checked_add(fragment.chunk.len()) {
            Some(end) if end <= slot.data.len() => {
                slot.data[fragment.offset as usize..end].copy_from_slice(fragment.chunk);
            }
            _ => {
                debug!(
                    sender = %from,
                    sequence = fragment.sequence,
                    "fragment overruns the declared size, dropping the slot"
                );
                self.slots.remove(&key);
                return None;
            }
        }

        slot.pending = slot.pending.saturating_sub(1);
        if slot.pending > 0 {
            return None;
        }
        let slot = self.slots.remove(&key)?;
        match slot.channel {
            Some(channel) => Some((channel, slot.data)),
            None => {
                debug!(
                    sender = %from,
                    sequence = fragment.sequence,
                    "message completed without fragment zero, dropping"
                );
                None
            }
        }
    }
}
