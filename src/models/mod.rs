// Domain models

mod monitor;
mod packet;
mod peer;
mod snapshot;

pub use monitor::{FeedEvent, MonitorTargets};
pub use packet::{DecodedPacket, DnsLayer, IpLayer, PacketRecord, Protocol, TcpLayer};
pub use peer::PeerStats;
pub use snapshot::{DnsEntry, PeerEntry, Report, Snapshot};
