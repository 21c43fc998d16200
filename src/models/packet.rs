// Packet models: what the capture layer hands us, and what the classifier produces.

use serde::{Deserialize, Serialize};
use std::fmt;

/// IP layer addresses, as strings (compared by plain string equality).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpLayer {
    pub src: String,
    pub dst: String,
}

/// TCP layer; `flags` is the raw 9-bit flag field (FIN = 0x01 ... NS = 0x100).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TcpLayer {
    pub flags: u16,
}

/// DNS layer. `qname` is the wire-format name of the first question, if any.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsLayer {
    #[serde(default)]
    pub qname: Option<Vec<u8>>,
}

/// A packet as delivered by the capture layer, already split into layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedPacket {
    /// Capture time reported by the feed, ms since Unix epoch. Informational
    /// only; bandwidth uses the ingest wall clock.
    pub timestamp: u64,
    /// Full on-wire length in bytes.
    pub wire_len: u64,
    #[serde(default)]
    pub ip: Option<IpLayer>,
    #[serde(default)]
    pub tcp: Option<TcpLayer>,
    #[serde(default)]
    pub udp: bool,
    #[serde(default)]
    pub arp: bool,
    #[serde(default)]
    pub dns: Option<DnsLayer>,
}

impl DecodedPacket {
    /// One-line description for display events, e.g. `10.0.0.5 -> 8.8.8.8 TCP 120B`.
    pub fn summary(&self) -> String {
        let proto = Protocol::of(self);
        match &self.ip {
            Some(ip) => format!("{} -> {} {} {}B", ip.src, ip.dst, proto, self.wire_len),
            None => format!("{} {}B", proto, self.wire_len),
        }
    }
}

/// Protocol tag. Resolution order is TCP > UDP > ARP > OTHER.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    Tcp,
    Udp,
    Arp,
    Other,
}

impl Protocol {
    /// First matching layer wins.
    pub fn of(packet: &DecodedPacket) -> Self {
        if packet.tcp.is_some() {
            Protocol::Tcp
        } else if packet.udp {
            Protocol::Udp
        } else if packet.arp {
            Protocol::Arp
        } else {
            Protocol::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
            Protocol::Arp => "ARP",
            Protocol::Other => "OTHER",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields of one packet that matter for aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketRecord {
    pub src: String,
    pub dst: String,
    pub size: u64,
    pub protocol: Protocol,
    pub tcp_flags: Option<String>,
    pub dns_query: Option<String>,
    /// Capture time carried over from the feed, ms since Unix epoch.
    pub timestamp: u64,
}
