//! The pre-bottleneck pass: sending rate, retransmissions, inflight and RTT
//! per connection.
use crate::capture::PacketSource;
use crate::error::Result;
use crate::fairness::WindowValue;
use crate::interval::{IntervalRecord, Window, WindowAccumulator};
use crate::pass::{Pass, PassStats, TotalRecord, WindowedFlow};
use crate::tcp::{
    Direction, FlowKey, FlowState, RttSample, Segment, SequenceTracker, TimestampMatcher,
    Transmission,
};
use serde::Serialize;

/// Sender-side state of one connection.
#[derive(Debug)]
pub struct SenderFlow {
    seq: SequenceTracker,
    matcher: TimestampMatcher,
    window: WindowAccumulator,
    records: Vec<IntervalRecord>,
    rtt: Vec<RttSample>,
    retransmissions: Vec<f64>,
}

impl SenderFlow {
    fn inflight_bits(&self) -> f64 {
        self.seq.inflight() as f64 * 8.0
    }
}

impl FlowState for SenderFlow {
    fn open(start_seq: u32) -> Self {
        SenderFlow {
            seq: SequenceTracker::new(start_seq),
            matcher: TimestampMatcher::new(),
            window: WindowAccumulator::default(),
            records: Vec::new(),
            rtt: Vec::new(),
            retransmissions: Vec::new(),
        }
    }
}

/// Sum over all connections of one window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SendTotal {
    pub sending_rate: f64,
    pub retransmissions: u64,
    pub packets: u64,
}

impl WindowedFlow for SenderFlow {
    type Total = SendTotal;

    fn on_segment(&mut self, ts: f64, rel: f64, seg: &Segment) {
        match seg.direction() {
            Direction::ToServer => {
                self.window.add_bits(seg.payload_len as u64 * 8);
                match self.seq.on_data(seg.seq, seg.payload_len) {
                    Transmission::Retransmission => {
                        self.window.add_retransmission();
                        self.retransmissions.push(rel);
                    }
                    Transmission::New => self.window.add_packet(),
                }
                if let Some(opt) = seg.timestamp {
                    self.matcher.on_send(ts, opt.val);
                }
            }
            Direction::ToClient => {
                self.seq.on_ack(seg.ack);
                if let Some(opt) = seg.timestamp {
                    if let Some(rtt) = self.matcher.on_echo(ts, opt.ecr) {
                        self.window.sample_rtt(rtt);
                        self.rtt.push(RttSample { time: rel, rtt });
                    }
                    self.matcher.expire(opt.ecr);
                }
            }
        }
        let inflight = self.inflight_bits();
        self.window.sample_inflight(inflight);
    }

    fn is_idle(&self) -> bool {
        self.window.is_idle()
    }

    fn emit(&mut self, window: Window, total: &mut SendTotal) {
        let inflight = self.inflight_bits();
        let record = self.window.take(window, inflight);
        total.sending_rate += record.sending_rate;
        total.retransmissions += record.retransmissions as u64;
        total.packets += record.packets as u64;
        self.records.push(record);
    }

    fn release(&mut self) {
        self.seq.release();
        self.matcher.release();
    }
}

/// Everything measured for one connection before the bottleneck.
#[derive(Debug, Clone, Serialize)]
pub struct FlowReport {
    pub index: usize,
    pub key: FlowKey,
    pub opened_at: f64,
    pub records: Vec<IntervalRecord>,
    pub rtt: Vec<RttSample>,
    /// Times of detected retransmissions, seconds.
    pub retransmissions: Vec<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngressReport {
    pub flows: Vec<FlowReport>,
    pub totals: Vec<TotalRecord<SendTotal>>,
    pub stats: PassStats,
}

impl IngressReport {
    /// Per-connection sending-rate series for the fairness computation.
    pub fn sending_rate(&self) -> Vec<Vec<WindowValue>> {
        self.flows
            .iter()
            .map(|flow| {
                flow.records
                    .iter()
                    .map(|r| WindowValue {
                        window: r.window,
                        start: r.start,
                        value: r.sending_rate,
                    })
                    .collect()
            })
            .collect()
    }
}

/// Runs the pre-bottleneck pass over a capture.
pub fn analyze_ingress(source: &mut dyn PacketSource, delta_t: f64) -> Result<IngressReport> {
    let output = Pass::<SenderFlow>::run(source, delta_t)?;
    let flows = output
        .connections
        .into_iter()
        .map(|conn| {
            let (index, key, opened_at) = (conn.index(), *conn.key(), conn.opened_at());
            let state = conn.state;
            FlowReport {
                index,
                key,
                opened_at,
                records: state.records,
                rtt: state.rtt,
                retransmissions: state.retransmissions,
            }
        })
        .collect();

    Ok(IngressReport {
        flows,
        totals: output.totals,
        stats: output.stats,
    })
}
