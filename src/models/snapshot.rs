// Point-in-time analytics snapshot sent to presenters

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{PeerStats, Protocol};

/// One row of the top-peers table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerEntry {
    pub address: String,
    #[serde(flatten)]
    pub stats: PeerStats,
}

/// One row of the top-DNS table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsEntry {
    pub name: String,
    pub count: u64,
}

/// Immutable copy of the analytics state. Owns all of its data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Creation instant, ms since Unix epoch.
    pub timestamp: u64,
    pub capture_active: bool,
    pub total_packets: u64,
    pub total_bytes: u64,
    pub protocols: BTreeMap<Protocol, u64>,
    pub tcp_flags: BTreeMap<String, u64>,
    /// Top DNS query names, count descending.
    pub top_dns: Vec<DnsEntry>,
    /// Top peers, bytes descending.
    pub top_peers: Vec<PeerEntry>,
    /// Bytes/sec over the trailing bandwidth window.
    pub bandwidth_bps: f64,
    /// Seconds since the capture session started; 0 without a session.
    pub uptime_secs: f64,
}

/// Data a report generator needs: the snapshot plus session context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub target: String,
    pub router: String,
    /// Packets currently held in the inspection ring (relevant or not).
    pub packets_captured: usize,
    /// RFC 3339, local time.
    pub generated_at: String,
    pub snapshot: Snapshot,
}
