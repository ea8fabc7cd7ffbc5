//! Capture files in the classic libpcap format.
//!
//! Record parsing is left to `pcap-file`; this reader only checks the link
//! type and hands out raw Ethernet frames with their timestamps.
use crate::capture::PacketSource;
use crate::error::{Error, Result};
use log::{debug, warn};
use pcap_file::pcap::PcapReader as Capture;
use pcap_file::{DataLink, PcapError};
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

pub struct PcapReader<R: Read = File> {
    path: PathBuf,
    capture: Capture<R>,
    frames: u64,
}

impl PcapReader {
    /// Opens a capture file, failing with `MissingInput` if it does not exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::from_io(path, e))?;
        Self::new(path, file)
    }
}

impl<R: Read> PcapReader<R> {
    /// Wraps a reader positioned at the start of a pcap global header.
    pub fn new(path: impl Into<PathBuf>, reader: R) -> Result<Self> {
        let path = path.into();
        let capture = Capture::new(reader).map_err(|e| capture_error(&path, e))?;

        let header = capture.header();
        if header.datalink != DataLink::ETHERNET {
            return Err(Error::Capture {
                path,
                reason: format!("unsupported link type {:?}", header.datalink),
            });
        }
        debug!(
            "{}: pcap header ok ({:?}, {:?} endian, snaplen {})",
            path.display(),
            header.ts_resolution,
            header.endianness,
            header.snaplen
        );

        Ok(PcapReader {
            path,
            capture,
            frames: 0,
        })
    }
}

impl<R: Read> PacketSource for PcapReader<R> {
    fn next_frame(&mut self, buf: &mut Vec<u8>) -> Result<Option<f64>> {
        let packet = match self.capture.next_packet() {
            None => return Ok(None),
            Some(Ok(packet)) => packet,
            Some(Err(e)) if is_truncation(&e) => {
                // a capture cut off by the writer being killed
                warn!(
                    "{}: truncated record after {} frames, stopping",
                    self.path.display(),
                    self.frames
                );
                return Ok(None);
            }
            Some(Err(e)) => return Err(capture_error(&self.path, e)),
        };

        buf.clear();
        buf.extend_from_slice(&packet.data);
        self.frames += 1;
        Ok(Some(packet.timestamp.as_secs_f64()))
    }
}

fn is_truncation(e: &PcapError) -> bool {
    match e {
        PcapError::IncompleteBuffer => true,
        PcapError::IoError(io) => io.kind() == ErrorKind::UnexpectedEof,
        _ => false,
    }
}

fn capture_error(path: &Path, e: PcapError) -> Error {
    match e {
        PcapError::IoError(io) if io.kind() != ErrorKind::UnexpectedEof => Error::from_io(path, io),
        e => Error::Capture {
            path: path.to_path_buf(),
            reason: e.to_string(),
        },
    }
}
