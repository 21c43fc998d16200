// Shared test helpers

#![allow(dead_code)]

use trafficlens::models::*;

pub const TARGET: &str = "10.0.0.5";
pub const ROUTER: &str = "10.0.0.1";

pub fn record(src: &str, dst: &str, size: u64, protocol: Protocol) -> PacketRecord {
    PacketRecord {
        src: src.into(),
        dst: dst.into(),
        size,
        protocol,
        tcp_flags: None,
        dns_query: None,
        timestamp: 1_000,
    }
}

pub fn tcp_packet(src: &str, dst: &str, wire_len: u64, flags: u16) -> DecodedPacket {
    DecodedPacket {
        timestamp: 1_000,
        wire_len,
        ip: Some(IpLayer {
            src: src.into(),
            dst: dst.into(),
        }),
        tcp: Some(TcpLayer { flags }),
        udp: false,
        arp: false,
        dns: None,
    }
}

pub fn udp_packet(src: &str, dst: &str, wire_len: u64) -> DecodedPacket {
    DecodedPacket {
        timestamp: 1_000,
        wire_len,
        ip: Some(IpLayer {
            src: src.into(),
            dst: dst.into(),
        }),
        tcp: None,
        udp: true,
        arp: false,
        dns: None,
    }
}

/// Wire-format QNAME for a dotted name.
pub fn qname(name: &str) -> Vec<u8> {
    let mut out = Vec::new();
    for label in name.split('.').filter(|l| !l.is_empty()) {
        out.push(label.len() as u8);
        out.extend_from_slice(label.as_bytes());
    }
    out.push(0);
    out
}
