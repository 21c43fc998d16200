// Fixed-capacity buffer of the most recently captured packets, for inspection.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::models::DecodedPacket;

pub const DEFAULT_RING_CAPACITY: usize = 500;

/// Shared between the capture task and HTTP handlers; push evicts the oldest packet.
#[derive(Debug)]
pub struct PacketRing {
    packets: Mutex<VecDeque<DecodedPacket>>,
    capacity: usize,
}

impl Default for PacketRing {
    fn default() -> Self {
        Self::new(DEFAULT_RING_CAPACITY)
    }
}

impl PacketRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            packets: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    fn guard(&self) -> std::sync::MutexGuard<'_, VecDeque<DecodedPacket>> {
        self.packets
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn push(&self, packet: DecodedPacket) {
        if self.capacity == 0 {
            return;
        }
        let mut packets = self.guard();
        if packets.len() >= self.capacity {
            packets.pop_front();
        }
        packets.push_back(packet);
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<DecodedPacket> {
        self.guard().back().cloned()
    }

    /// Up to `n` most recent packets, newest first.
    pub fn recent(&self, n: usize) -> Vec<DecodedPacket> {
        self.guard().iter().rev().take(n).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(ts: u64) -> DecodedPacket {
        DecodedPacket {
            timestamp: ts,
            wire_len: 60,
            ip: None,
            tcp: None,
            udp: false,
            arp: true,
            dns: None,
        }
    }

    #[test]
    fn push_beyond_capacity_evicts_oldest() {
        let ring = PacketRing::new(3);
        for ts in 1..=5 {
            ring.push(packet(ts));
        }
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.latest().unwrap().timestamp, 5);
        let ts: Vec<u64> = ring.recent(10).iter().map(|p| p.timestamp).collect();
        assert_eq!(ts, vec![5, 4, 3]);
    }

    #[test]
    fn empty_ring() {
        let ring = PacketRing::default();
        assert!(ring.is_empty());
        assert!(ring.latest().is_none());
        assert_eq!(ring.capacity(), DEFAULT_RING_CAPACITY);
    }
}
