//! Round-trip time samples from TCP timestamp echoes.
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};

/// One RTT measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RttSample {
    /// Seconds since the capture's first packet.
    pub time: f64,
    /// Milliseconds.
    pub rtt: f64,
}

/// Correlates TSval sent by the data sender with TSecr echoed back.
///
/// Several segments may carry the same TSval (the timestamp clock ticks
/// slower than segments are sent); each is matched at most once, earliest
/// first. Pending sends are ordered by TSval in serial-number space, counted
/// from the first TSval seen, so stale ones can be expired in one cut.
#[derive(Debug, Default)]
pub struct TimestampMatcher {
    base: Option<u32>,
    pending: BTreeMap<u32, VecDeque<f64>>,
    len: usize,
}

impl TimestampMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(&self, ts_val: u32) -> Option<u32> {
        self.base.map(|base| ts_val.wrapping_sub(base))
    }

    /// Remembers that a segment carrying `ts_val` was captured at `ts`.
    pub fn on_send(&mut self, ts: f64, ts_val: u32) {
        let base = *self.base.get_or_insert(ts_val);
        self.pending
            .entry(ts_val.wrapping_sub(base))
            .or_default()
            .push_back(ts);
        self.len += 1;
    }

    /// Consumes the earliest pending send echoed by `ts_ecr` and returns the
    /// RTT in milliseconds. No pending send means no sample.
    pub fn on_echo(&mut self, ts: f64, ts_ecr: u32) -> Option<f64> {
        let key = self.key(ts_ecr)?;
        let queue = self.pending.get_mut(&key)?;
        let sent = queue.pop_front()?;
        if queue.is_empty() {
            self.pending.remove(&key);
        }
        self.len -= 1;
        Some((ts - sent) * 1000.0)
    }

    /// Drops every pending send whose TSval is older than `ts_ecr`. A
    /// receiver echoes its most recent TSval, so once `ts_ecr` has been seen
    /// older values are never echoed again.
    pub fn expire(&mut self, ts_ecr: u32) {
        let cut = match self.key(ts_ecr) {
            // an echo from before the first send
            Some(cut) if cut <= i32::MAX as u32 => cut,
            _ => return,
        };
        let kept = self.pending.split_off(&cut);
        let dropped: usize = self.pending.values().map(VecDeque::len).sum();
        self.pending = kept;
        self.len -= dropped;
    }

    /// Number of sends still awaiting an echo.
    pub fn pending(&self) -> usize {
        self.len
    }

    pub fn release(&mut self) {
        self.pending = BTreeMap::new();
        self.len = 0;
    }
}
