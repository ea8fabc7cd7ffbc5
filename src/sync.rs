//! Aggregate BBR state across senders and the phases in which every sender
//! sits at its minimum window gain at the same time.
use crate::logs::BbrSample;
use crate::series::Point;
use log::debug;
use ordered_float::OrderedFloat;
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

const EPSILON: f64 = 1e-9;

/// Sums over all senders, one point per merged sample.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BbrTotals {
    pub bandwidth: Vec<Point>,
    pub cwnd_gain: Vec<Point>,
    pub pacing_gain: Vec<Point>,
}

/// A stretch of time in which all active senders probed together.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SyncPhase {
    /// Seconds.
    pub start: f64,
    /// Milliseconds.
    pub duration: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub totals: BbrTotals,
    pub phases: Vec<SyncPhase>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Current {
    bandwidth: f64,
    cwnd_gain: f64,
    pacing_gain: f64,
    seen: bool,
    exhausted: bool,
}

/// Walks every sender's samples in global time order. Each sender's last
/// values are held until its next sample; ties go to the lower sender index.
/// A sender whose samples have run out reads as zero from the next merge step
/// on, yet still counts as active.
pub fn aggregate(flows: &[Vec<BbrSample>]) -> SyncReport {
    let mut heap = BinaryHeap::with_capacity(flows.len());
    for (flow, samples) in flows.iter().enumerate() {
        if let Some(first) = samples.first() {
            heap.push(Reverse((OrderedFloat(first.time), flow, 0usize)));
        }
    }

    let mut current = vec![Current::default(); flows.len()];
    let mut active = 0usize;
    let mut open: Option<f64> = None;
    let mut last_ts = None;
    let mut report = SyncReport::default();

    while let Some(Reverse((OrderedFloat(ts), flow, idx))) = heap.pop() {
        for c in current.iter_mut().filter(|c| c.exhausted) {
            c.bandwidth = 0.0;
            c.cwnd_gain = 0.0;
            c.pacing_gain = 0.0;
        }

        let sample = &flows[flow][idx];
        let next = flows[flow].get(idx + 1);
        if let Some(next) = next {
            heap.push(Reverse((OrderedFloat(next.time), flow, idx + 1)));
        }

        let cur = &mut current[flow];
        cur.exhausted = next.is_none();
        if !cur.seen {
            cur.seen = true;
            active += 1;
        }
        cur.bandwidth = sample.bandwidth;
        cur.cwnd_gain = sample.cwnd_gain;
        cur.pacing_gain = sample.pacing_gain;

        let (bw, cwnd_gain, pacing_gain) = current.iter().fold((0.0, 0.0, 0.0), |acc, c| {
            (acc.0 + c.bandwidth, acc.1 + c.cwnd_gain, acc.2 + c.pacing_gain)
        });
        report.totals.bandwidth.push(Point::new(ts, bw));
        report.totals.cwnd_gain.push(Point::new(ts, cwnd_gain));
        report.totals.pacing_gain.push(Point::new(ts, pacing_gain));

        let synced = (cwnd_gain - active as f64).abs() < EPSILON;
        match open {
            None if synced => {
                debug!("sync phase opens at {:.6}s ({} flows)", ts, active);
                open = Some(ts);
            }
            Some(start) if !synced => {
                close(&mut report.phases, start, ts);
                open = None;
            }
            _ => {}
        }
        last_ts = Some(ts);
    }

    if let (Some(start), Some(end)) = (open, last_ts) {
        close(&mut report.phases, start, end);
    }
    report
}

fn close(phases: &mut Vec<SyncPhase>, start: f64, end: f64) {
    let phase = SyncPhase {
        start,
        duration: (end - start) * 1000.0,
    };
    debug!("sync phase closes at {:.6}s after {:.3}ms", end, phase.duration);
    phases.push(phase);
}
