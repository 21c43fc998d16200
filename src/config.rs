use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};

use crate::models::MonitorTargets;
use crate::ring::DEFAULT_RING_CAPACITY;

/// Address assumed for this host when it cannot be detected.
const FALLBACK_LOCAL_IP: &str = "192.168.1.100";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub capture: CaptureSourceConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    pub publishing: PublishingConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureSourceConfig {
    /// JSON-lines packet feed: a file path, or "-" for stdin.
    pub source: String,
    /// Most recent captured packets kept for inspection.
    #[serde(default = "default_ring_capacity")]
    pub ring_capacity: usize,
}

fn default_ring_capacity() -> usize {
    DEFAULT_RING_CAPACITY
}

/// Initial monitored addresses; both can be changed at runtime via PUT /api/targets.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MonitorConfig {
    /// Defaults to the detected local IPv4 address.
    pub target: Option<String>,
    /// Defaults to the target's /24 gateway (last octet = 1).
    pub router: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublishingConfig {
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,
    /// Max snapshots kept in the broadcast channel for /ws/analytics (slow clients may lag).
    pub broadcast_capacity: usize,
    /// Max display events kept for /ws/events; oldest are dropped first.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_refresh_interval_ms() -> u64 {
    2000
}

fn default_event_capacity() -> usize {
    256
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    /// How often to log app stats (ws clients, snapshots published, totals) at INFO level.
    pub stats_log_interval_secs: u64,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            !self.capture.source.is_empty(),
            "capture.source must be non-empty"
        );
        anyhow::ensure!(
            self.capture.ring_capacity > 0,
            "capture.ring_capacity must be > 0, got {}",
            self.capture.ring_capacity
        );
        if let Some(target) = &self.monitor.target {
            anyhow::ensure!(
                !target.trim().is_empty(),
                "monitor.target must be non-empty when set"
            );
        }
        if let Some(router) = &self.monitor.router {
            anyhow::ensure!(
                !router.trim().is_empty(),
                "monitor.router must be non-empty when set"
            );
        }
        anyhow::ensure!(
            self.publishing.refresh_interval_ms > 0,
            "publishing.refresh_interval_ms must be > 0, got {}",
            self.publishing.refresh_interval_ms
        );
        anyhow::ensure!(
            self.publishing.broadcast_capacity > 0,
            "publishing.broadcast_capacity must be > 0, got {}",
            self.publishing.broadcast_capacity
        );
        anyhow::ensure!(
            self.publishing.event_capacity > 0,
            "publishing.event_capacity must be > 0, got {}",
            self.publishing.event_capacity
        );
        anyhow::ensure!(
            self.monitoring.stats_log_interval_secs > 0,
            "monitoring.stats_log_interval_secs must be > 0, got {}",
            self.monitoring.stats_log_interval_secs
        );
        Ok(())
    }

    /// Monitored addresses from config, filling gaps with detected defaults.
    pub fn initial_targets(&self) -> MonitorTargets {
        let target = self
            .monitor
            .target
            .as_deref()
            .map(|t| t.trim().to_string())
            .unwrap_or_else(detect_local_ip);
        let router = self
            .monitor
            .router
            .as_deref()
            .map(|r| r.trim().to_string())
            .unwrap_or_else(|| default_gateway(&target));
        MonitorTargets::new(target, router)
    }
}

/// Outbound local IPv4, found by "connecting" a UDP socket (no packet is sent).
pub fn detect_local_ip() -> String {
    let detect = || -> std::io::Result<IpAddr> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.connect(("8.8.8.8", 80))?;
        Ok(socket.local_addr()?.ip())
    };
    match detect() {
        Ok(ip) => ip.to_string(),
        Err(e) => {
            tracing::warn!(error = %e, operation = "detect_local_ip", "falling back to {}", FALLBACK_LOCAL_IP);
            FALLBACK_LOCAL_IP.to_string()
        }
    }
}

/// Guess of the gateway for `local_ip`: same /24 with last octet 1.
pub fn default_gateway(local_ip: &str) -> String {
    match local_ip.rsplit_once('.') {
        Some((prefix, _)) => format!("{prefix}.1"),
        None => "192.168.1.1".to_string(),
    }
}
