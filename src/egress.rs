//! The post-bottleneck pass: delivered throughput per connection.
//!
//! No sequence or RTT state is kept here; only the client→server payload
//! that made it through the bottleneck is counted.
use crate::capture::PacketSource;
use crate::error::Result;
use crate::fairness::WindowValue;
use crate::interval::{rate, Window};
use crate::pass::{Pass, PassStats, TotalRecord, WindowedFlow};
use crate::tcp::{Direction, FlowKey, FlowState, Segment};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThroughputRecord {
    pub window: u64,
    pub start: f64,
    /// Bits per second.
    pub throughput: f64,
}

#[derive(Debug, Default)]
pub struct ReceiverFlow {
    bits: u64,
    records: Vec<ThroughputRecord>,
}

impl FlowState for ReceiverFlow {
    fn open(_start_seq: u32) -> Self {
        ReceiverFlow::default()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DeliverTotal {
    pub throughput: f64,
}

impl WindowedFlow for ReceiverFlow {
    type Total = DeliverTotal;

    fn on_segment(&mut self, _ts: f64, _rel: f64, seg: &Segment) {
        if seg.direction() == Direction::ToServer {
            self.bits += seg.payload_len as u64 * 8;
        }
    }

    fn is_idle(&self) -> bool {
        self.bits == 0
    }

    fn emit(&mut self, window: Window, total: &mut DeliverTotal) {
        let throughput = rate(std::mem::take(&mut self.bits), window.delta);
        total.throughput += throughput;
        self.records.push(ThroughputRecord {
            window: window.index,
            start: window.start,
            throughput,
        });
    }

    fn release(&mut self) {}
}

#[derive(Debug, Clone, Serialize)]
pub struct ThroughputSeries {
    pub index: usize,
    pub key: FlowKey,
    pub records: Vec<ThroughputRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EgressReport {
    pub flows: Vec<ThroughputSeries>,
    pub totals: Vec<TotalRecord<DeliverTotal>>,
    pub stats: PassStats,
}

impl EgressReport {
    pub fn throughput(&self) -> Vec<Vec<WindowValue>> {
        self.flows
            .iter()
            .map(|flow| {
                flow.records
                    .iter()
                    .map(|r| WindowValue {
                        window: r.window,
                        start: r.start,
                        value: r.throughput,
                    })
                    .collect()
            })
            .collect()
    }
}

/// Runs the post-bottleneck pass over a capture with its own time origin.
pub fn analyze_egress(source: &mut dyn PacketSource, delta_t: f64) -> Result<EgressReport> {
    let output = Pass::<ReceiverFlow>::run(source, delta_t)?;
    let flows = output
        .connections
        .into_iter()
        .map(|conn| ThroughputSeries {
            index: conn.index(),
            key: *conn.key(),
            records: conn.state.records,
        })
        .collect();

    Ok(EgressReport {
        flows,
        totals: output.totals,
        stats: output.stats,
    })
}
