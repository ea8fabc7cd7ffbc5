//! Fixed-width time windows over a capture.
//!
//! Window `k` covers `[k·Δt, (k+1)·Δt)` relative to the capture's first
//! packet. A record is labelled with its window's start.
use serde::Serialize;
use std::mem;

/// One time bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Window {
    pub index: u64,
    pub start: f64,
    pub delta: f64,
}

/// Tracks the capture's time origin and the window currently being filled.
#[derive(Debug, Clone)]
pub struct WindowClock {
    delta: f64,
    origin: Option<f64>,
    current: u64,
}

impl WindowClock {
    pub fn new(delta: f64) -> Self {
        WindowClock {
            delta,
            origin: None,
            current: 0,
        }
    }

    pub fn delta(&self) -> f64 {
        self.delta
    }

    /// Seconds since the first timestamp this clock has seen.
    pub fn relative(&mut self, ts: f64) -> f64 {
        let origin = *self.origin.get_or_insert(ts);
        ts - origin
    }

    pub fn index_of(&self, rel: f64) -> u64 {
        if rel <= 0.0 {
            0
        } else {
            (rel / self.delta).floor() as u64
        }
    }

    /// Moves to the window holding `rel`. Returns the window that was left,
    /// if any; windows in between were never reached and produce nothing.
    /// Late timestamps never move the clock back.
    pub fn advance(&mut self, rel: f64) -> Option<Window> {
        let index = self.index_of(rel);
        if index <= self.current {
            return None;
        }
        let left = self.window(self.current);
        self.current = index;
        Some(left)
    }

    pub fn current(&self) -> Window {
        self.window(self.current)
    }

    pub fn window(&self, index: u64) -> Window {
        Window {
            index,
            start: index as f64 * self.delta,
            delta: self.delta,
        }
    }
}

/// Per-connection aggregate for one window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IntervalRecord {
    pub window: u64,
    /// Window start, seconds.
    pub start: f64,
    /// Payload bits per second sent by the client, retransmissions included.
    pub sending_rate: f64,
    pub retransmissions: u32,
    /// Segments that were not retransmissions.
    pub packets: u32,
    /// Mean inflight data in bits.
    pub inflight: f64,
    /// Mean RTT in milliseconds, absent when no echo matched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rtt: Option<f64>,
}

/// Raw events collected while a window is open.
#[derive(Debug, Clone, Default)]
pub struct WindowAccumulator {
    bits: u64,
    retransmissions: u32,
    packets: u32,
    inflight_sum: f64,
    inflight_samples: u32,
    rtt_sum: f64,
    rtt_samples: u32,
}

impl WindowAccumulator {
    pub fn add_bits(&mut self, bits: u64) {
        self.bits += bits;
    }

    pub fn add_packet(&mut self) {
        self.packets += 1;
    }

    pub fn add_retransmission(&mut self) {
        self.retransmissions += 1;
    }

    pub fn sample_inflight(&mut self, bits: f64) {
        self.inflight_sum += bits;
        self.inflight_samples += 1;
    }

    pub fn sample_rtt(&mut self, ms: f64) {
        self.rtt_sum += ms;
        self.rtt_samples += 1;
    }

    pub fn bits(&self) -> u64 {
        self.bits
    }

    /// True when nothing at all happened in this window.
    pub fn is_idle(&self) -> bool {
        self.bits == 0
            && self.retransmissions == 0
            && self.packets == 0
            && self.inflight_samples == 0
            && self.rtt_samples == 0
    }

    /// Closes the window into a record and starts over. `inflight_now` is
    /// used when no inflight sample arrived during the window.
    pub fn take(&mut self, window: Window, inflight_now: f64) -> IntervalRecord {
        let acc = mem::take(self);
        IntervalRecord {
            window: window.index,
            start: window.start,
            sending_rate: rate(acc.bits, window.delta),
            retransmissions: acc.retransmissions,
            packets: acc.packets,
            inflight: if acc.inflight_samples > 0 {
                acc.inflight_sum / acc.inflight_samples as f64
            } else {
                inflight_now
            },
            rtt: (acc.rtt_samples > 0).then(|| acc.rtt_sum / acc.rtt_samples as f64),
        }
    }
}

/// Bits accumulated over `delta` seconds, as bits per second.
pub fn rate(bits: u64, delta: f64) -> f64 {
    bits as f64 / delta
}
