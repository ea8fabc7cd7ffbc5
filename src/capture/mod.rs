//! Packet sources: where captured frames come from.
mod pcap;

// Mock source for testing
#[cfg(test)]
pub mod mock;
#[cfg(test)]
pub use self::mock::MockSource;

pub use self::pcap::PcapReader;
#[cfg(test)]
pub(crate) use self::pcap::tests::write_pcap;

/// A trait for ordered link-layer frame sources
pub trait PacketSource {
    /// Reads the next frame into `buf` and returns its capture timestamp in
    /// seconds, or `None` once the capture is exhausted.
    fn next_frame(&mut self, buf: &mut Vec<u8>) -> crate::Result<Option<f64>>;
}
