//! Decoding of captured Ethernet frames into TCP segment summaries.
use crate::tcp::flags::Flags;
use crate::tcp::flow::{Direction, FlowKey};
use etherparse::{
    EtherType, Ethernet2HeaderSlice, IpNumber, Ipv4HeaderSlice, TcpHeaderSlice, TcpOptionElement,
};
use log::trace;
use std::net::Ipv4Addr;
use thiserror::Error;

/// Why a frame did not yield a segment. None of these abort a pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("not an IPv4 frame (ether type {0:#06x})")]
    NotIpv4(u16),
    #[error("not a TCP packet (ip protocol {0})")]
    NotTcp(u8),
    #[error("malformed {0} header")]
    Malformed(&'static str),
}

/// The TCP timestamp option (RFC 7323).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TsOption {
    pub val: u32,
    pub ecr: u32,
}

/// Everything the analysis needs from one captured TCP packet.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub src_ip: Ipv4Addr,
    pub src_port: u16,
    pub dst_ip: Ipv4Addr,
    pub dst_port: u16,
    pub flags: Flags,
    pub seq: u32,
    pub ack: u32,
    /// IPv4 total length.
    pub ip_len: u16,
    /// TCP payload length, the size used for rate accounting. Derived from
    /// the IP header so that snap-length truncated captures still report
    /// full sizes.
    pub payload_len: u32,
    pub timestamp: Option<TsOption>,
}

impl Segment {
    /// Decodes an Ethernet II frame. Only IPv4 + TCP is accepted.
    pub fn decode(frame: &[u8]) -> Result<Segment, DecodeError> {
        let eth = Ethernet2HeaderSlice::from_slice(frame)
            .map_err(|_| DecodeError::Malformed("ethernet"))?;
        if eth.ether_type() != EtherType::IPV4 {
            return Err(DecodeError::NotIpv4(eth.ether_type().0));
        }

        let rest = &frame[eth.slice().len()..];
        let ip = Ipv4HeaderSlice::from_slice(rest).map_err(|_| DecodeError::Malformed("IPv4"))?;
        if ip.protocol() != IpNumber::TCP {
            return Err(DecodeError::NotTcp(ip.protocol().0));
        }

        let ip_hdr_len = ip.slice().len();
        let tcp = TcpHeaderSlice::from_slice(&rest[ip_hdr_len..])
            .map_err(|_| DecodeError::Malformed("TCP"))?;
        let tcp_hdr_len = tcp.slice().len();

        let ip_len = ip.total_len();
        let payload_len = (ip_len as usize).saturating_sub(ip_hdr_len + tcp_hdr_len) as u32;

        Ok(Segment {
            src_ip: ip.source_addr(),
            src_port: tcp.source_port(),
            dst_ip: ip.destination_addr(),
            dst_port: tcp.destination_port(),
            flags: Flags::from_header(&tcp),
            seq: tcp.sequence_number(),
            ack: tcp.acknowledgment_number(),
            ip_len,
            payload_len,
            timestamp: timestamp_option(&tcp),
        })
    }

    pub fn flow_key(&self) -> FlowKey {
        FlowKey::new(self.src_ip, self.src_port, self.dst_ip, self.dst_port)
    }

    pub fn direction(&self) -> Direction {
        FlowKey::direction_of(self.src_port, self.dst_port)
    }
}

// A malformed option list only costs the RTT sample, never the packet.
fn timestamp_option(tcp: &TcpHeaderSlice) -> Option<TsOption> {
    for option in tcp.options_iterator() {
        match option {
            Ok(TcpOptionElement::Timestamp(val, ecr)) => return Some(TsOption { val, ecr }),
            Ok(_) => {}
            Err(e) => {
                trace!(
                    "{}:{} seq={} unreadable tcp options: {:?}",
                    tcp.source_port(),
                    tcp.destination_port(),
                    tcp.sequence_number(),
                    e
                );
                return None;
            }
        }
    }
    None
}
