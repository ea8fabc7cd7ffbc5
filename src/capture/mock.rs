use crate::capture::PacketSource;
use std::collections::VecDeque;

/// An in-memory packet source fed by tests.
#[derive(Debug, Default, Clone)]
pub struct MockSource {
    frames: VecDeque<(f64, Vec<u8>)>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inject(&mut self, ts: f64, frame: Vec<u8>) {
        self.frames.push_back((ts, frame));
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl PacketSource for MockSource {
    fn next_frame(&mut self, buf: &mut Vec<u8>) -> crate::Result<Option<f64>> {
        match self.frames.pop_front() {
            Some((ts, frame)) => {
                buf.clear();
                buf.extend_from_slice(&frame);
                Ok(Some(ts))
            }
            None => Ok(None),
        }
    }
}
