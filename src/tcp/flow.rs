use std::fmt;
use std::net::Ipv4Addr;

/// Direction of a segment relative to the flow's client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Client to server: the data direction.
    ToServer,
    /// Server to client: the acknowledgment direction.
    ToClient,
}

/// Direction-independent identity of a TCP connection.
///
/// The endpoint with the higher port is taken to be the client (it holds the
/// ephemeral port), so both directions of a connection map to the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct FlowKey {
    pub client_ip: Ipv4Addr,
    pub client_port: u16,
    pub server_ip: Ipv4Addr,
    pub server_port: u16,
}

impl FlowKey {
    pub fn new(src_ip: Ipv4Addr, src_port: u16, dst_ip: Ipv4Addr, dst_port: u16) -> Self {
        match Self::direction_of(src_port, dst_port) {
            Direction::ToServer => FlowKey {
                client_ip: src_ip,
                client_port: src_port,
                server_ip: dst_ip,
                server_port: dst_port,
            },
            Direction::ToClient => FlowKey {
                client_ip: dst_ip,
                client_port: dst_port,
                server_ip: src_ip,
                server_port: src_port,
            },
        }
    }

    pub fn direction_of(src_port: u16, dst_port: u16) -> Direction {
        if src_port > dst_port {
            Direction::ToServer
        } else {
            Direction::ToClient
        }
    }
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} → {}:{}",
            self.client_ip, self.client_port, self.server_ip, self.server_port
        )
    }
}
