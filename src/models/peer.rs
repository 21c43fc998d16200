// Per-peer traffic counters

use serde::{Deserialize, Serialize};

/// Counters for one peer address. Created on first observation, reset only with the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerStats {
    pub packets: u64,
    /// Saturates at `u64::MAX` rather than wrapping.
    pub bytes: u64,
    /// Packets sent by this peer to the monitored target.
    pub to_target: u64,
    /// Packets the monitored target sent to this peer.
    pub from_target: u64,
    /// Packets where the router address was the source or destination.
    pub via_router: u64,
}

impl PeerStats {
    pub(crate) fn record(&mut self, size: u64) {
        self.packets += 1;
        self.bytes = self.bytes.saturating_add(size);
    }
}
