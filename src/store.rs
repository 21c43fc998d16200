// Aggregation engine: all counters behind one exclusive lock.
// Single writer (capture task), many readers (publisher, HTTP handlers).

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::models::{PacketRecord, PeerStats, Protocol, Snapshot};
use crate::snapshot;
use crate::window::RollingWindow;
use crate::worker::now_millis;

/// Everything accumulated during one capture session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalyticsState {
    pub total_packets: u64,
    /// Saturates at `u64::MAX` rather than wrapping.
    pub total_bytes: u64,
    pub protocols: HashMap<Protocol, u64>,
    pub tcp_flags: HashMap<String, u64>,
    pub dns_queries: HashMap<String, u64>,
    pub peers: HashMap<String, PeerStats>,
    /// Samples stamped with the ingest wall clock, never the packet's capture time.
    pub bandwidth: RollingWindow,
    /// Session start, ms since Unix epoch. `None` while no capture session is active.
    pub session_start: Option<u64>,
    pub capture_active: bool,
}

impl AnalyticsState {
    /// Get-or-create: new peers start from all-zero counters.
    fn peer_mut(&mut self, address: &str) -> &mut PeerStats {
        self.peers.entry(address.to_string()).or_default()
    }

    fn apply(&mut self, record: &PacketRecord, target: &str, router: &str, now: u64) {
        let size = record.size;
        self.total_packets += 1;
        self.total_bytes = self.total_bytes.saturating_add(size);
        *self.protocols.entry(record.protocol).or_default() += 1;
        self.bandwidth.append(now, size);

        if let Some(flags) = &record.tcp_flags {
            *self.tcp_flags.entry(flags.clone()).or_default() += 1;
        }
        if let Some(name) = &record.dns_query {
            *self.dns_queries.entry(name.clone()).or_default() += 1;
        }

        let src = record.src.as_str();
        let dst = record.dst.as_str();
        // Target rules take precedence over router rules.
        let peer = if src == target {
            let p = self.peer_mut(dst);
            p.from_target += 1;
            p
        } else if dst == target {
            let p = self.peer_mut(src);
            p.to_target += 1;
            p
        } else if src == router {
            self.peer_mut(dst)
        } else {
            // Relevance guarantees dst == router here.
            self.peer_mut(src)
        };
        peer.record(size);
        if src == router || dst == router {
            peer.via_router += 1;
        }
    }
}

/// Owned per capture session and shared by handle (`Arc<AnalyticsStore>`).
#[derive(Debug, Default)]
pub struct AnalyticsStore {
    state: Mutex<AnalyticsState>,
}

impl AnalyticsStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Every critical section is a run of infallible counter updates, so a poisoned
    // lock still guards consistent state.
    fn lock(&self) -> MutexGuard<'_, AnalyticsState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies one record if it touches `target` or `router`. Returns whether it did.
    /// Irrelevant records leave every counter untouched.
    pub fn ingest(&self, record: &PacketRecord, target: &str, router: &str) -> bool {
        self.ingest_at(record, target, router, now_millis())
    }

    /// `ingest` with an explicit wall-clock time (ms since Unix epoch) for the
    /// bandwidth sample.
    pub fn ingest_at(&self, record: &PacketRecord, target: &str, router: &str, now: u64) -> bool {
        let relevant = [target, router]
            .iter()
            .any(|addr| record.src == *addr || record.dst == *addr);
        if !relevant {
            return false;
        }
        self.lock().apply(record, target, router, now);
        true
    }

    /// Discards all accumulated state. A new session starts at `now` if capture is active.
    pub fn reset(&self, now: u64) {
        let mut state = self.lock();
        let capture_active = state.capture_active;
        *state = AnalyticsState {
            session_start: capture_active.then_some(now),
            capture_active,
            ..AnalyticsState::default()
        };
    }

    /// Marks a capture session as started at `now`.
    pub fn start_session(&self, now: u64) {
        let mut state = self.lock();
        state.capture_active = true;
        state.session_start = Some(now);
    }

    /// Marks capture as stopped; accumulated counters are kept.
    pub fn stop_session(&self) {
        let mut state = self.lock();
        state.capture_active = false;
        state.session_start = None;
    }

    pub fn is_capturing(&self) -> bool {
        self.lock().capture_active
    }

    /// Value copy of the internal state.
    pub fn snapshot_raw(&self) -> AnalyticsState {
        self.lock().clone()
    }

    /// Consistent snapshot: copied under the lock, sorted and summarised after releasing it.
    pub fn snapshot(&self, now: u64) -> Snapshot {
        let state = self.snapshot_raw();
        snapshot::build(&state, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGET: &str = "10.0.0.5";
    const ROUTER: &str = "10.0.0.1";

    fn record(src: &str, dst: &str, size: u64, protocol: Protocol) -> PacketRecord {
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

    #[test]
    fn target_outbound_attributes_to_destination() {
        let store = AnalyticsStore::new();
        assert!(store.ingest(&record(TARGET, "8.8.8.8", 120, Protocol::Tcp), TARGET, ROUTER));
        let s = store.snapshot_raw();
        assert_eq!(s.total_packets, 1);
        assert_eq!(s.total_bytes, 120);
        let peer = s.peers["8.8.8.8"];
        assert_eq!(peer.packets, 1);
        assert_eq!(peer.from_target, 1);
        assert_eq!(peer.to_target, 0);
        assert_eq!(peer.via_router, 0);
    }

    #[test]
    fn router_only_packet_counts_via_router() {
        let store = AnalyticsStore::new();
        assert!(store.ingest(&record("8.8.4.4", ROUTER, 80, Protocol::Udp), TARGET, ROUTER));
        let peer = store.snapshot_raw().peers["8.8.4.4"];
        assert_eq!(peer.packets, 1);
        assert_eq!(peer.bytes, 80);
        assert_eq!(peer.via_router, 1);
        assert_eq!(peer.to_target, 0);
        assert_eq!(peer.from_target, 0);
    }

    #[test]
    fn unrelated_packet_is_ignored() {
        let store = AnalyticsStore::new();
        let before = store.snapshot_raw();
        assert!(!store.ingest(&record("1.2.3.4", "5.6.7.8", 99, Protocol::Tcp), TARGET, ROUTER));
        assert_eq!(store.snapshot_raw(), before);
    }

    #[test]
    fn target_rule_beats_router_rule_and_via_router_co_occurs() {
        let store = AnalyticsStore::new();
        // Router talking to target: peer is the router, attributed as to_target.
        store.ingest(&record(ROUTER, TARGET, 60, Protocol::Udp), TARGET, ROUTER);
        let peer = store.snapshot_raw().peers[ROUTER];
        assert_eq!(peer.to_target, 1);
        assert_eq!(peer.via_router, 1);
        assert_eq!(peer.packets, 1);
    }

    #[test]
    fn router_source_attributes_to_destination() {
        let store = AnalyticsStore::new();
        store.ingest(&record(ROUTER, "192.168.1.77", 40, Protocol::Arp), TARGET, ROUTER);
        let s = store.snapshot_raw();
        assert_eq!(s.peers["192.168.1.77"].via_router, 1);
        assert!(!s.peers.contains_key(ROUTER));
    }

    #[test]
    fn tallies_flags_dns_and_protocols() {
        let store = AnalyticsStore::new();
        let mut syn = record(TARGET, "1.1.1.1", 60, Protocol::Tcp);
        syn.tcp_flags = Some("S".into());
        let mut dns = record(TARGET, ROUTER, 70, Protocol::Udp);
        dns.dns_query = Some("example.com".into());
        store.ingest(&syn, TARGET, ROUTER);
        store.ingest(&syn, TARGET, ROUTER);
        store.ingest(&dns, TARGET, ROUTER);
        let s = store.snapshot_raw();
        assert_eq!(s.tcp_flags["S"], 2);
        assert_eq!(s.dns_queries["example.com"], 1);
        assert_eq!(s.protocols[&Protocol::Tcp], 2);
        assert_eq!(s.protocols[&Protocol::Udp], 1);
        assert_eq!(s.total_packets, s.protocols.values().sum::<u64>());
        assert_eq!(s.bandwidth.len(), 3);
    }

    #[test]
    fn bandwidth_samples_use_ingest_clock() {
        let store = AnalyticsStore::new();
        store.start_session(50_000);
        let mut future = record(TARGET, "8.8.8.8", 1_000, Protocol::Tcp);
        future.timestamp = 10_000_000;
        store.ingest_at(&future, TARGET, ROUTER, 52_000);
        for _ in 0..5 {
            store.ingest_at(&record(TARGET, "8.8.8.8", 100, Protocol::Tcp), TARGET, ROUTER, 53_000);
        }
        let s = store.snapshot_raw();
        assert_eq!(s.bandwidth.sum_since(53_001), 0);
        assert_eq!(s.bandwidth.sum_since(0), 1_500);
        // 1500 bytes over the 10s window ending at 60s.
        assert_eq!(store.snapshot(60_000).bandwidth_bps, 150.0);
        // 45s later nothing is recent any more.
        assert_eq!(store.snapshot(105_000).bandwidth_bps, 0.0);
    }

    #[test]
    fn byte_counters_saturate() {
        let store = AnalyticsStore::new();
        store.start_session(0);
        for _ in 0..2 {
            assert!(store.ingest_at(&record(TARGET, "8.8.8.8", u64::MAX, Protocol::Tcp), TARGET, ROUTER, 1_000));
        }
        let s = store.snapshot_raw();
        assert_eq!(s.total_packets, 2);
        assert_eq!(s.total_bytes, u64::MAX);
        assert_eq!(s.peers["8.8.8.8"].bytes, u64::MAX);
        assert_eq!(s.peers["8.8.8.8"].packets, 2);
        assert_eq!(s.bandwidth.sum_since(0), u64::MAX);
        assert!(store.snapshot(2_000).bandwidth_bps > 0.0);
    }

    #[test]
    fn reset_is_idempotent_and_respects_session() {
        let store = AnalyticsStore::new();
        store.ingest(&record(TARGET, "8.8.8.8", 120, Protocol::Tcp), TARGET, ROUTER);
        store.reset(5_000);
        let once = store.snapshot_raw();
        store.reset(5_000);
        assert_eq!(store.snapshot_raw(), once);
        assert_eq!(once.total_packets, 0);
        assert!(once.peers.is_empty());
        assert_eq!(once.session_start, None);

        store.start_session(6_000);
        store.reset(7_000);
        let s = store.snapshot_raw();
        assert_eq!(s.session_start, Some(7_000));
        assert!(s.capture_active);
    }

    #[test]
    fn stop_session_keeps_counters() {
        let store = AnalyticsStore::new();
        store.start_session(0);
        store.ingest(&record(TARGET, "8.8.8.8", 120, Protocol::Tcp), TARGET, ROUTER);
        store.stop_session();
        assert!(!store.is_capturing());
        assert_eq!(store.snapshot_raw().total_packets, 1);
    }
}
