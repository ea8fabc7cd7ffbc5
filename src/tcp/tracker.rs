//! Connection lifecycle: which packets belong to which tracked connection.
use crate::tcp::flow::FlowKey;
use crate::tcp::segment::Segment;
use log::{debug, info};
use std::collections::HashMap;
use std::fmt;

/// Per-connection state owned by a tracked connection.
pub trait FlowState {
    /// Creates the state for a connection whose client ISN is `start_seq`.
    fn open(start_seq: u32) -> Self;
}

/// A tracked connection and the analysis state it owns.
#[derive(Debug)]
pub struct Connection<S> {
    pub(crate) index: usize,
    pub(crate) key: FlowKey,
    pub(crate) start_seq: u32,
    pub(crate) opened_at: f64,
    pub(crate) state: S,
}

impl<S> Connection<S> {
    /// Stable ordinal in first-SYN order.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn key(&self) -> &FlowKey {
        &self.key
    }

    /// Client initial sequence number, the zero reference for offsets.
    pub fn start_seq(&self) -> u32 {
        self.start_seq
    }

    /// Capture-relative time of the opening SYN.
    pub fn opened_at(&self) -> f64 {
        self.opened_at
    }

    pub fn state(&self) -> &S {
        &self.state
    }
}

/// Why a packet was not attributed to a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ignored {
    /// No open connection for the key: the SYN was never seen, or the
    /// connection already closed.
    UnknownFlow,
    /// A SYN for a key that is already open. The open connection is kept.
    DuplicateSyn,
}

impl fmt::Display for Ignored {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ignored::UnknownFlow => write!(f, "UNKNOWN-FLOW"),
            Ignored::DuplicateSyn => write!(f, "DUPLICATE-SYN"),
        }
    }
}

/// Outcome of classifying one segment.
#[derive(Debug)]
pub enum Verdict<'a, S> {
    /// A SYN opened a new connection with this index.
    Opened(usize),
    /// A FIN closed this connection; it is handed back for a final flush
    /// and must be returned with [`Tracker::retire`].
    Closed(Connection<S>),
    /// The segment belongs to this open connection.
    Tracked(&'a mut Connection<S>),
    Ignored(Ignored),
}

/// Maps flow keys to open connections and keeps the closed ones.
#[derive(Debug)]
pub struct Tracker<S> {
    active: HashMap<FlowKey, Connection<S>>,
    closed: Vec<Connection<S>>,
    next_index: usize,
}

impl<S> Default for Tracker<S> {
    fn default() -> Self {
        Tracker {
            active: HashMap::new(),
            closed: Vec::new(),
            next_index: 0,
        }
    }
}

impl<S: FlowState> Tracker<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifies a segment captured at relative time `rel`.
    pub fn classify(&mut self, rel: f64, seg: &Segment) -> Verdict<'_, S> {
        let key = seg.flow_key();

        if seg.flags.fin() {
            return match self.active.remove(&key) {
                Some(conn) => {
                    info!("[#{}] [FIN] {} at {:.3}s", conn.index, key, rel);
                    Verdict::Closed(conn)
                }
                None => Verdict::Ignored(Ignored::UnknownFlow),
            };
        }

        if seg.flags.syn() && !seg.flags.ack() {
            if self.active.contains_key(&key) {
                return Verdict::Ignored(Ignored::DuplicateSyn);
            }
            let index = self.next_index;
            self.next_index += 1;
            info!("[#{}] [SYN] {} at {:.3}s isn={}", index, key, rel, seg.seq);
            self.active.insert(
                key,
                Connection {
                    index,
                    key,
                    start_seq: seg.seq,
                    opened_at: rel,
                    state: S::open(seg.seq),
                },
            );
            return Verdict::Opened(index);
        }

        match self.active.get_mut(&key) {
            Some(conn) => Verdict::Tracked(conn),
            None => {
                debug!("{} flags={} not tracked", key, seg.flags);
                Verdict::Ignored(Ignored::UnknownFlow)
            }
        }
    }

    /// Takes back a connection handed out by [`Verdict::Closed`].
    pub fn retire(&mut self, conn: Connection<S>) {
        self.closed.push(conn);
    }

    pub fn active_mut(&mut self) -> impl Iterator<Item = &mut Connection<S>> {
        self.active.values_mut()
    }

    pub fn active(&self) -> usize {
        self.active.len()
    }

    /// Number of connections ever opened.
    pub fn opened(&self) -> usize {
        self.next_index
    }

    /// All connections, open and closed, in index order.
    pub fn into_connections(self) -> Vec<Connection<S>> {
        let mut all = self.closed;
        all.extend(self.active.into_values());
        all.sort_by_key(|c| c.index);
        all
    }
}
