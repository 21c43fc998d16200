// Background tasks.
// Capture task: feed -> classify -> ingest, one packet at a time (single writer).
// Publisher task: periodic snapshots broadcast to presenters (readers).

use crate::capture::CaptureFeed;
use crate::classifier;
use crate::error::CaptureError;
use crate::models::{FeedEvent, MonitorTargets, Snapshot};
use crate::ring::PacketRing;
use crate::store::AnalyticsStore;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::sync::{broadcast, oneshot, watch};
use tokio::time::{Duration, Instant, interval};
use tracing::Instrument;

/// Rate limit for "no receivers" message (avoid logging every refresh when no one is on /ws/analytics)
const NO_RECEIVERS_WARN_INTERVAL: Duration = Duration::from_secs(60);

/// Emit a display event for every Nth relevant packet.
pub const DEFAULT_EVENT_EVERY: u64 = 20;

/// Wall clock in ms since Unix epoch; 0 if the clock is before the epoch.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, operation = "get_timestamp", "system time error");
            0
        })
}

/// Feed, shared state, channels and shutdown for the capture task.
pub struct CaptureDeps<F> {
    pub feed: F,
    pub store: Arc<AnalyticsStore>,
    pub ring: Arc<PacketRing>,
    /// Re-read for every packet; operators may change addresses at any time.
    pub targets: watch::Receiver<MonitorTargets>,
    pub events_tx: broadcast::Sender<FeedEvent>,
    pub shutdown_rx: oneshot::Receiver<()>,
}

pub struct CaptureConfig {
    pub event_every: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            event_every: DEFAULT_EVENT_EVERY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Shutdown was requested (or its sender dropped).
    Shutdown,
    /// The feed ran out of packets.
    FeedEnded,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::Shutdown => "shutdown",
            StopReason::FeedEnded => "feed ended",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSummary {
    pub packets_seen: u64,
    pub relevant: u64,
    /// Input the feed discarded as undecodable.
    pub skipped: u64,
    pub reason: StopReason,
}

/// Spawns the capture task. Shutdown is checked between packets, so a packet is
/// either fully ingested or not at all. Display events are best-effort: a full or
/// receiver-less event channel never holds up ingestion.
pub fn spawn_capture<F: CaptureFeed + 'static>(
    deps: CaptureDeps<F>,
    config: CaptureConfig,
) -> tokio::task::JoinHandle<Result<CaptureSummary, CaptureError>> {
    let CaptureDeps {
        mut feed,
        store,
        ring,
        targets,
        events_tx,
        mut shutdown_rx,
    } = deps;
    let event_every = config.event_every.max(1);

    let span = tracing::debug_span!("capture", event_every);
    tokio::spawn(
        async move {
            store.start_session(now_millis());
            {
                let t = targets.borrow();
                tracing::info!(target_ip = %t.target, router_ip = %t.router, "capture started");
                let _ = events_tx.send(FeedEvent::Started {
                    target: t.target.clone(),
                    router: t.router.clone(),
                });
            }

            let mut packets_seen: u64 = 0;
            let mut relevant: u64 = 0;

            let reason = loop {
                let next = tokio::select! {
                    biased;
                    _ = &mut shutdown_rx => break StopReason::Shutdown,
                    next = feed.next_packet() => next,
                };
                let packet = match next {
                    Ok(Some(p)) => p,
                    Ok(None) => break StopReason::FeedEnded,
                    Err(e) => {
                        store.stop_session();
                        tracing::error!(error = %e, packets_seen, relevant, "capture feed failed");
                        let _ = events_tx.send(FeedEvent::Error {
                            message: e.to_string(),
                        });
                        return Err(e);
                    }
                };
                packets_seen += 1;

                if let Some(record) = classifier::classify(&packet) {
                    let ingested = {
                        let t = targets.borrow();
                        store.ingest(&record, &t.target, &t.router)
                    };
                    if ingested {
                        relevant += 1;
                        if relevant % event_every == 0 {
                            let _ = events_tx.send(FeedEvent::Packet {
                                summary: packet.summary(),
                            });
                        }
                    } else {
                        tracing::trace!(src = %record.src, dst = %record.dst, "packet not relevant");
                    }
                }
                ring.push(packet);
            };

            store.stop_session();
            let skipped = feed.skipped();
            tracing::info!(
                packets_seen,
                relevant,
                skipped,
                reason = reason.as_str(),
                "capture stopped"
            );
            let _ = events_tx.send(FeedEvent::Stopped {
                reason: reason.as_str().to_string(),
            });
            Ok(CaptureSummary {
                packets_seen,
                relevant,
                skipped,
                reason,
            })
        }
        .instrument(span),
    )
}

/// Shared state, channels and shutdown for the snapshot publisher.
pub struct PublisherDeps {
    pub store: Arc<AnalyticsStore>,
    pub tx: broadcast::Sender<Snapshot>,
    pub ws_analytics_connections: Arc<AtomicUsize>,
    pub snapshots_published_total: Arc<AtomicU64>,
    pub shutdown_rx: oneshot::Receiver<()>,
}

/// Publisher timing and logging config.
pub struct PublisherConfig {
    pub refresh_interval_ms: u64,
    /// How often to log app stats (real seconds).
    pub stats_log_interval_secs: u64,
}

/// Spawns the task that builds a snapshot every `refresh_interval_ms` and broadcasts it.
/// Lagging subscribers lose the oldest snapshots; the store is never blocked by them.
pub fn spawn_publisher(deps: PublisherDeps, config: PublisherConfig) -> tokio::task::JoinHandle<()> {
    let PublisherDeps {
        store,
        tx,
        ws_analytics_connections,
        snapshots_published_total,
        mut shutdown_rx,
    } = deps;
    let PublisherConfig {
        refresh_interval_ms,
        stats_log_interval_secs,
    } = config;

    let span = tracing::debug_span!("publisher", refresh_interval_ms);
    tokio::spawn(
        async move {
            let mut tick = interval(Duration::from_millis(refresh_interval_ms));
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut stats_log_tick = interval(Duration::from_secs(stats_log_interval_secs));
            stats_log_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            let mut last_no_receivers_warn: Option<Instant> = None;

            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        let snapshot = store.snapshot(now_millis());
                        if tx.send(snapshot).is_err() {
                            let should_warn = last_no_receivers_warn
                                .is_none_or(|t| t.elapsed() >= NO_RECEIVERS_WARN_INTERVAL);
                            if should_warn {
                                tracing::debug!(
                                    operation = "broadcast_snapshot",
                                    "No active WebSocket clients; broadcast channel has no receivers"
                                );
                                last_no_receivers_warn = Some(Instant::now());
                            }
                        } else {
                            snapshots_published_total.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                    _ = &mut shutdown_rx => {
                        tracing::debug!("Publisher shutting down");
                        break;
                    }
                    _ = stats_log_tick.tick() => {
                        let state = store.snapshot_raw();
                        tracing::info!(
                            ws_analytics_clients = ws_analytics_connections.load(Ordering::Relaxed),
                            snapshots_published_total = snapshots_published_total.load(Ordering::Relaxed),
                            total_packets = state.total_packets,
                            total_bytes = state.total_bytes,
                            peers = state.peers.len(),
                            capture_active = state.capture_active,
                            "app stats"
                        );
                    }
                }
            }
        }
        .instrument(span),
    )
}
