// Snapshot building: value copy of AnalyticsState plus top-N selections.
// Runs outside the store lock on an already-copied state.

use std::collections::{BTreeMap, HashMap};

use crate::models::{DnsEntry, PeerEntry, Snapshot};
use crate::store::AnalyticsState;

pub const TOP_PEERS: usize = 10;
pub const TOP_DNS: usize = 8;

pub fn build(state: &AnalyticsState, now: u64) -> Snapshot {
    let top_peers = top_n(&state.peers, TOP_PEERS, |p| p.bytes)
        .into_iter()
        .map(|(address, stats)| PeerEntry { address, stats })
        .collect();
    let top_dns = top_n(&state.dns_queries, TOP_DNS, |c| *c)
        .into_iter()
        .map(|(name, count)| DnsEntry { name, count })
        .collect();

    let uptime_secs = match state.session_start {
        Some(start) => now.saturating_sub(start) as f64 / 1000.0,
        None => 0.0,
    };

    Snapshot {
        timestamp: now,
        capture_active: state.capture_active,
        total_packets: state.total_packets,
        total_bytes: state.total_bytes,
        protocols: state.protocols.iter().map(|(k, v)| (*k, *v)).collect(),
        tcp_flags: state
            .tcp_flags
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect::<BTreeMap<_, _>>(),
        top_dns,
        top_peers,
        bandwidth_bps: state.bandwidth.bandwidth(now, state.session_start),
        uptime_secs,
    }
}

/// The `n` highest-ranked entries, descending; ties ordered by map key ascending.
fn top_n<V: Clone>(
    map: &HashMap<String, V>,
    n: usize,
    rank: impl Fn(&V) -> u64,
) -> Vec<(String, V)> {
    let mut entries: Vec<(&String, &V)> = map.iter().collect();
    entries.sort_by(|a, b| rank(b.1).cmp(&rank(a.1)).then_with(|| a.0.cmp(b.0)));
    entries
        .into_iter()
        .take(n)
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PeerStats, Protocol};

    fn peer(bytes: u64) -> PeerStats {
        PeerStats {
            packets: 1,
            bytes,
            ..PeerStats::default()
        }
    }

    #[test]
    fn empty_state_snapshot() {
        let s = build(&AnalyticsState::default(), 10_000);
        assert_eq!(s.total_packets, 0);
        assert!(s.top_peers.is_empty());
        assert!(s.top_dns.is_empty());
        assert_eq!(s.bandwidth_bps, 0.0);
        assert_eq!(s.uptime_secs, 0.0);
        assert!(!s.capture_active);
    }

    #[test]
    fn selects_top_ten_peers_by_bytes() {
        let mut state = AnalyticsState::default();
        for i in 0..15u64 {
            state.peers.insert(format!("10.1.0.{i}"), peer(i * 100));
        }
        let s = build(&state, 0);
        assert_eq!(s.top_peers.len(), TOP_PEERS);
        assert_eq!(s.top_peers[0].address, "10.1.0.14");
        assert_eq!(s.top_peers[0].stats.bytes, 1_400);
        assert_eq!(s.top_peers[9].address, "10.1.0.5");
    }

    #[test]
    fn ties_are_ordered_by_address() {
        let mut state = AnalyticsState::default();
        state.peers.insert("b".into(), peer(50));
        state.peers.insert("a".into(), peer(50));
        state.peers.insert("c".into(), peer(70));
        let s = build(&state, 0);
        let order: Vec<&str> = s.top_peers.iter().map(|p| p.address.as_str()).collect();
        assert_eq!(order, vec!["c", "a", "b"]);
    }

    #[test]
    fn selects_top_eight_dns_names() {
        let mut state = AnalyticsState::default();
        for i in 0..12u64 {
            state.dns_queries.insert(format!("host{i:02}.example"), i);
        }
        let s = build(&state, 0);
        assert_eq!(s.top_dns.len(), TOP_DNS);
        assert_eq!(s.top_dns[0].name, "host11.example");
        assert_eq!(s.top_dns[0].count, 11);
        assert_eq!(s.top_dns[7].count, 4);
    }

    #[test]
    fn uptime_and_bandwidth_follow_session() {
        let mut state = AnalyticsState {
            session_start: Some(1_000),
            capture_active: true,
            ..AnalyticsState::default()
        };
        state.total_packets = 1;
        state.protocols.insert(Protocol::Tcp, 1);
        state.bandwidth.append(3_000, 400);
        let s = build(&state, 5_000);
        assert_eq!(s.uptime_secs, 4.0);
        assert_eq!(s.bandwidth_bps, 100.0);
        assert_eq!(s.protocols[&Protocol::Tcp], 1);
    }

    #[test]
    fn snapshot_is_independent_of_later_mutation() {
        let mut state = AnalyticsState::default();
        state.peers.insert("8.8.8.8".into(), peer(10));
        let s = build(&state, 0);
        state.peers.get_mut("8.8.8.8").unwrap().bytes = 999;
        assert_eq!(s.top_peers[0].stats.bytes, 10);
    }
}
