mod flags;
mod flow;
mod rtt;
mod segment;
mod seq;
mod tracker;

pub use self::flags::Flags;
pub use self::flags::{ACK, FIN, PSH, RST, SYN};
pub use self::flow::{Direction, FlowKey};
pub use self::rtt::{RttSample, TimestampMatcher};
pub use self::segment::{DecodeError, Segment, TsOption};
pub use self::seq::{normalize, SequenceTracker, Transmission};
pub use self::tracker::{Connection, FlowState, Ignored, Tracker, Verdict};
