//! The single ordered scan shared by both capture passes.
//!
//! A pass owns a [`Tracker`] and a [`WindowClock`]. Every decoded TCP
//! packet first moves the clock (closing the previous window for every open
//! connection) and is then handed to its connection's state.
use crate::capture::PacketSource;
use crate::error::Result;
use crate::interval::{Window, WindowClock};
use crate::tcp::{Connection, FlowState, Segment, Tracker, Verdict};
use log::{debug, info, trace};
use serde::Serialize;
use std::collections::BTreeMap;

/// Connection state that produces one record per window.
pub trait WindowedFlow: FlowState {
    /// This flow's contribution to the all-flows aggregate of a window.
    type Total: Default + Serialize;

    fn on_segment(&mut self, ts: f64, rel: f64, seg: &Segment);

    /// True when the open window holds no events.
    fn is_idle(&self) -> bool;

    /// Closes the open window into a record and adds to `total`.
    fn emit(&mut self, window: Window, total: &mut Self::Total);

    /// Frees matching state once the connection is closed.
    fn release(&mut self);
}

/// Aggregate over all connections for one window.
#[derive(Debug, Clone, Serialize)]
pub struct TotalRecord<T> {
    pub window: u64,
    pub start: f64,
    #[serde(flatten)]
    pub values: T,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassStats {
    pub frames: u64,
    /// Frames that were not Ethernet/IPv4/TCP.
    pub skipped: u64,
    /// TCP packets not attributed to an open connection.
    pub ignored: u64,
}

pub struct PassOutput<S: WindowedFlow> {
    pub connections: Vec<Connection<S>>,
    pub totals: Vec<TotalRecord<S::Total>>,
    pub stats: PassStats,
}

pub struct Pass<S: WindowedFlow> {
    tracker: Tracker<S>,
    clock: WindowClock,
    totals: BTreeMap<u64, TotalRecord<S::Total>>,
    stats: PassStats,
}

impl<S: WindowedFlow> Pass<S> {
    pub fn new(delta: f64) -> Self {
        Pass {
            tracker: Tracker::new(),
            clock: WindowClock::new(delta),
            totals: BTreeMap::new(),
            stats: PassStats::default(),
        }
    }

    /// Drains a packet source through a fresh pass.
    pub fn run(source: &mut dyn PacketSource, delta: f64) -> Result<PassOutput<S>> {
        let mut pass = Pass::new(delta);
        let mut buf = Vec::with_capacity(256);
        while let Some(ts) = source.next_frame(&mut buf)? {
            pass.handle_frame(ts, &buf);
        }
        Ok(pass.finish())
    }

    pub fn handle_frame(&mut self, ts: f64, frame: &[u8]) {
        self.stats.frames += 1;
        // the first frame anchors the time origin even if it is not TCP
        let rel = self.clock.relative(ts);
        match Segment::decode(frame) {
            Ok(seg) => self.handle_segment(ts, &seg),
            Err(e) => {
                trace!("frame #{} at {:.6}s skipped: {}", self.stats.frames, rel, e);
                self.stats.skipped += 1;
            }
        }
    }

    pub fn handle_segment(&mut self, ts: f64, seg: &Segment) {
        let rel = self.clock.relative(ts);
        // SYN and FIN packets move the clock before they are classified, so
        // they close windows like any other packet.
        if let Some(window) = self.clock.advance(rel) {
            self.close_window(window);
        }

        trace!(
            "{:.6}s {}:{} > {}:{} flags={} seq={} ack={} len={} ip_len={}",
            rel,
            seg.src_ip,
            seg.src_port,
            seg.dst_ip,
            seg.dst_port,
            seg.flags,
            seg.seq,
            seg.ack,
            seg.payload_len,
            seg.ip_len
        );

        let closed = match self.tracker.classify(rel, seg) {
            Verdict::Tracked(conn) => {
                conn.state.on_segment(ts, rel, seg);
                None
            }
            Verdict::Closed(conn) => Some(conn),
            Verdict::Opened(_) => None,
            Verdict::Ignored(reason) => {
                debug!("{} {} ignored at {:.6}s", reason, seg.flow_key(), rel);
                self.stats.ignored += 1;
                None
            }
        };

        if let Some(conn) = closed {
            self.close_connection(conn);
        }
    }

    fn close_window(&mut self, window: Window) {
        let total = &mut self
            .totals
            .entry(window.index)
            .or_insert_with(|| TotalRecord {
                window: window.index,
                start: window.start,
                values: S::Total::default(),
            })
            .values;
        for conn in self.tracker.active_mut() {
            conn.state.emit(window, total);
        }
    }

    // The partial window of a closing connection is kept if anything happened in it.
    fn flush(&mut self, conn: &mut Connection<S>) {
        if conn.state.is_idle() {
            return;
        }
        let window = self.clock.current();
        let total = &mut self
            .totals
            .entry(window.index)
            .or_insert_with(|| TotalRecord {
                window: window.index,
                start: window.start,
                values: S::Total::default(),
            })
            .values;
        conn.state.emit(window, total);
    }

    fn close_connection(&mut self, mut conn: Connection<S>) {
        self.flush(&mut conn);
        conn.state.release();
        self.tracker.retire(conn);
    }

    pub fn finish(mut self) -> PassOutput<S> {
        let mut connections = std::mem::take(&mut self.tracker).into_connections();
        for conn in connections.iter_mut() {
            // closed connections were flushed already and are idle
            self.flush(conn);
        }

        info!(
            "pass done: {} frames, {} connections, {} windows, {} skipped, {} ignored",
            self.stats.frames,
            connections.len(),
            self.totals.len(),
            self.stats.skipped,
            self.stats.ignored
        );

        PassOutput {
            connections,
            totals: self.totals.into_values().collect(),
            stats: self.stats,
        }
    }
}
