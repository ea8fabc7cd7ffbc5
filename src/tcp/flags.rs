use etherparse::TcpHeaderSlice;
use std::fmt;

// TCP control bits, RFC 793

/// FIN flag - no more data from sender
pub const FIN: u8 = 1 << 0;
/// SYN flag - synchronize sequence numbers
pub const SYN: u8 = 1 << 1;
/// RST flag - reset the connection
pub const RST: u8 = 1 << 2;
/// PSH flag - push function
pub const PSH: u8 = 1 << 3;
/// ACK flag - acknowledgment field is significant
pub const ACK: u8 = 1 << 4;

/// The control bits of one segment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags(pub u8);

impl Flags {
    pub fn from_header(tcp: &TcpHeaderSlice) -> Self {
        Flags(
            (tcp.fin() as u8)
                | (tcp.syn() as u8) << 1
                | (tcp.rst() as u8) << 2
                | (tcp.psh() as u8) << 3
                | (tcp.ack() as u8) << 4,
        )
    }

    pub fn contains(self, flag: u8) -> bool {
        self.0 & flag != 0
    }

    pub fn syn(self) -> bool {
        self.contains(SYN)
    }

    pub fn fin(self) -> bool {
        self.contains(FIN)
    }

    pub fn ack(self) -> bool {
        self.contains(ACK)
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}{}{}",
            if self.syn() { "S" } else { "-" },
            if self.ack() { "A" } else { "-" },
            if self.fin() { "F" } else { "-" },
            if self.contains(RST) { "R" } else { "-" },
            if self.contains(PSH) { "P" } else { "-" },
        )
    }
}
