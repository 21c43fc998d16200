// Monitored addresses and display events emitted by the capture path

use serde::{Deserialize, Serialize};

/// The two addresses under observation. Compared to packet addresses by string equality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorTargets {
    pub target: String,
    pub router: String,
}

impl MonitorTargets {
    pub fn new(target: impl Into<String>, router: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            router: router.into(),
        }
    }
}

/// Display message from the ingest path; serializes as `{"type": "...", ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FeedEvent {
    Started { target: String, router: String },
    Packet { summary: String },
    Error { message: String },
    Stopped { reason: String },
}
