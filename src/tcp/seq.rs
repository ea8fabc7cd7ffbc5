//! Sequence-space bookkeeping for one connection's data direction.
use std::collections::BTreeSet;

/// Maps a raw 32-bit sequence or acknowledgment number to an offset from the
/// connection's initial sequence number.
///
/// TCP sequence numbers wrap around to 0 after 2^32 - 1, so the offset is
/// taken modulo 2^32: a connection whose raw numbers cross the boundary
/// keeps producing increasing offsets.
///
/// # Examples
///
/// ```
/// use tcpsync::tcp::normalize;
/// assert_eq!(normalize(1100, 1000), 100);
/// // 4_294_967_290 + 16 wraps to 10
/// assert_eq!(normalize(10, 4_294_967_290), 16);
/// ```
pub fn normalize(value: u32, start: u32) -> u32 {
    value.wrapping_sub(start)
}

/// How a data segment was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transmission {
    New,
    Retransmission,
}

/// Tracks sent-but-unacknowledged offsets and the inflight window.
#[derive(Debug, Clone, Default)]
pub struct SequenceTracker {
    start: u32,
    unacked: BTreeSet<u32>,
    highest_sent: u32,
    highest_acked: u32,
}

impl SequenceTracker {
    pub fn new(start: u32) -> Self {
        SequenceTracker {
            start,
            ..Default::default()
        }
    }

    /// Records a client→server segment and reports whether its offset is
    /// still outstanding from an earlier transmission.
    pub fn on_data(&mut self, seq: u32, payload_len: u32) -> Transmission {
        let offset = normalize(seq, self.start);
        self.highest_sent = self.highest_sent.max(offset.wrapping_add(payload_len));

        if self.unacked.contains(&offset) {
            return Transmission::Retransmission;
        }
        if payload_len > 0 {
            self.unacked.insert(offset);
        }
        Transmission::New
    }

    /// Applies a cumulative acknowledgment. The segment starting exactly at
    /// the acknowledged offset is the next one expected and stays outstanding.
    pub fn on_ack(&mut self, ack: u32) {
        let offset = normalize(ack, self.start);
        self.highest_acked = self.highest_acked.max(offset);
        self.unacked = self.unacked.split_off(&offset);
    }

    /// Bytes sent but not yet acknowledged.
    pub fn inflight(&self) -> u32 {
        self.highest_sent.saturating_sub(self.highest_acked)
    }

    pub fn highest_sent(&self) -> u32 {
        self.highest_sent
    }

    pub fn highest_acked(&self) -> u32 {
        self.highest_acked
    }

    pub fn unacked(&self) -> usize {
        self.unacked.len()
    }

    /// Drops the outstanding set once the connection is closed.
    pub fn release(&mut self) {
        self.unacked = BTreeSet::new();
    }
}
