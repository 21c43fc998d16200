// Plain-text rendering of a snapshot: the live analytics panel.

use crate::models::{MonitorTargets, Snapshot};

/// How many TCP flag combinations the panel shows.
const PANEL_TCP_FLAGS: usize = 6;

/// Human-readable size, 1024 base, one decimal: `512.0 B`, `1.5 KB`, ... `2.0 TB`.
pub fn format_bytes(n: f64) -> String {
    let mut n = n;
    for unit in ["B", "KB", "MB", "GB"] {
        if n.abs() < 1024.0 {
            return format!("{n:.1} {unit}");
        }
        n /= 1024.0;
    }
    format!("{n:.1} TB")
}

/// `1h 2m 3s`, `2m 3s` or `3s`; fractional seconds are truncated.
pub fn format_duration(secs: f64) -> String {
    let secs = if secs.is_finite() && secs > 0.0 { secs as u64 } else { 0 };
    let (h, rem) = (secs / 3600, secs % 3600);
    let (m, s) = (rem / 60, rem % 60);
    if h > 0 {
        format!("{h}h {m}m {s}s")
    } else if m > 0 {
        format!("{m}m {s}s")
    } else {
        format!("{s}s")
    }
}

pub fn render_panel(snapshot: &Snapshot, targets: &MonitorTargets) -> String {
    let status = if snapshot.capture_active { "ACTIVE" } else { "STOPPED" };
    let mut lines = vec![
        format!(
            "=== LIVE TRAFFIC ANALYTICS  [{status}]  Uptime: {} ===",
            format_duration(snapshot.uptime_secs)
        ),
        format!("Target: {}   Router: {}", targets.target, targets.router),
        format!(
            "Packets: {}   Bytes: {}   Bandwidth: {}/s",
            snapshot.total_packets,
            format_bytes(snapshot.total_bytes as f64),
            format_bytes(snapshot.bandwidth_bps)
        ),
        String::new(),
        "--- Protocols ---".to_string(),
    ];

    if snapshot.protocols.is_empty() {
        lines.push("  No data".to_string());
    } else {
        let mut protocols: Vec<_> = snapshot.protocols.iter().collect();
        protocols.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        let parts: Vec<String> = protocols
            .into_iter()
            .map(|(proto, count)| {
                let pct = if snapshot.total_packets > 0 {
                    *count as f64 / snapshot.total_packets as f64 * 100.0
                } else {
                    0.0
                };
                format!("{proto}: {count} ({pct:.0}%)")
            })
            .collect();
        lines.push(format!("  {}", parts.join("  |  ")));
    }

    if !snapshot.tcp_flags.is_empty() {
        let mut flags: Vec<_> = snapshot.tcp_flags.iter().collect();
        flags.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        let parts: Vec<String> = flags
            .into_iter()
            .take(PANEL_TCP_FLAGS)
            .map(|(flag, count)| format!("{flag}: {count}"))
            .collect();
        lines.push(String::new());
        lines.push("--- TCP Flags ---".to_string());
        lines.push(format!("  {}", parts.join("  |  ")));
    }

    if !snapshot.top_dns.is_empty() {
        lines.push(String::new());
        lines.push("--- DNS Queries (top) ---".to_string());
        for entry in &snapshot.top_dns {
            lines.push(format!("  {}: {}", entry.name, entry.count));
        }
    }

    lines.push(String::new());
    lines.push("--- Top Peers (by traffic) ---".to_string());
    if snapshot.top_peers.is_empty() {
        lines.push("  No data".to_string());
    } else {
        for peer in &snapshot.top_peers {
            let s = &peer.stats;
            lines.push(format!(
                "  {:>15}  {:>10}  pkts={}  in={}  out={}  router={}",
                peer.address,
                format_bytes(s.bytes as f64),
                s.packets,
                s.to_target,
                s.from_target,
                s.via_router
            ));
        }
    }

    lines.join("\n")
}
