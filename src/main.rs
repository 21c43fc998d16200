use anyhow::Result;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize};
use tokio::io::BufReader;
use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;
use trafficlens::capture::{CaptureFeed, JsonLinesFeed};
use trafficlens::error::CaptureError;
use trafficlens::models::{FeedEvent, MonitorTargets};
use trafficlens::ring::PacketRing;
use trafficlens::store::AnalyticsStore;
use trafficlens::worker::CaptureSummary;
use trafficlens::*;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

/// Upper bound on runtime teardown once the tasks have been awaited. A pending
/// stdin read parks a blocking-pool thread that only returns on the next line or
/// EOF, and must not hold the process open.
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

struct CaptureHandles {
    store: Arc<AnalyticsStore>,
    ring: Arc<PacketRing>,
    targets: watch::Receiver<MonitorTargets>,
    events_tx: broadcast::Sender<FeedEvent>,
    shutdown_rx: oneshot::Receiver<()>,
}

fn start_capture<F: CaptureFeed + 'static>(
    feed: F,
    h: CaptureHandles,
) -> JoinHandle<Result<CaptureSummary, CaptureError>> {
    worker::spawn_capture(
        worker::CaptureDeps {
            feed,
            store: h.store,
            ring: h.ring,
            targets: h.targets,
            events_tx: h.events_tx,
            shutdown_rx: h.shutdown_rx,
        },
        worker::CaptureConfig::default(),
    )
}

fn main() -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(run());
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);
    result
}

async fn run() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let app_config = config::AppConfig::load()?;
    let initial_targets = app_config.initial_targets();
    tracing::info!(
        target_ip = %initial_targets.target,
        router_ip = %initial_targets.router,
        source = %app_config.capture.source,
        "Analytics filter configured"
    );

    let store = Arc::new(AnalyticsStore::new());
    let ring = Arc::new(PacketRing::new(app_config.capture.ring_capacity));
    let (targets_tx, targets_rx) = watch::channel(initial_targets);
    let targets_tx = Arc::new(targets_tx);
    let (snapshot_tx, _) = broadcast::channel(app_config.publishing.broadcast_capacity);
    let (events_tx, _) = broadcast::channel(app_config.publishing.event_capacity);
    let ws_analytics_connections = Arc::new(AtomicUsize::new(0));

    let (capture_shutdown_tx, capture_shutdown_rx) = oneshot::channel();
    let (publisher_shutdown_tx, publisher_shutdown_rx) = oneshot::channel();

    let handles = CaptureHandles {
        store: store.clone(),
        ring: ring.clone(),
        targets: targets_rx,
        events_tx: events_tx.clone(),
        shutdown_rx: capture_shutdown_rx,
    };
    let capture_handle = if app_config.capture.source == "-" {
        start_capture(
            JsonLinesFeed::new(BufReader::new(tokio::io::stdin())),
            handles,
        )
    } else {
        let file = tokio::fs::File::open(&app_config.capture.source)
            .await
            .map_err(|e| anyhow::anyhow!("capture source {}: {}", app_config.capture.source, e))?;
        start_capture(JsonLinesFeed::new(BufReader::new(file)), handles)
    };

    // Capture failures end the session, not the server: the last state stays readable.
    let capture_watch = tokio::spawn(async move {
        match capture_handle.await {
            Ok(Ok(summary)) => tracing::info!(
                packets_seen = summary.packets_seen,
                relevant = summary.relevant,
                skipped = summary.skipped,
                "capture session finished"
            ),
            Ok(Err(e)) => tracing::error!(error = %e, "capture session failed"),
            Err(e) => tracing::error!(error = %e, "capture task panicked"),
        }
    });

    let publisher_handle = worker::spawn_publisher(
        worker::PublisherDeps {
            store: store.clone(),
            tx: snapshot_tx.clone(),
            ws_analytics_connections: ws_analytics_connections.clone(),
            snapshots_published_total: Arc::new(AtomicU64::new(0)),
            shutdown_rx: publisher_shutdown_rx,
        },
        worker::PublisherConfig {
            refresh_interval_ms: app_config.publishing.refresh_interval_ms,
            stats_log_interval_secs: app_config.monitoring.stats_log_interval_secs,
        },
    );

    let app = routes::app(routes::RouteDeps {
        store,
        ring,
        snapshot_tx,
        events_tx,
        targets_tx,
        ws_analytics_connections,
    });
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = async {
            #[cfg(unix)]
            {
                let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(s) => s,
                    Err(_) => {
                        let _ = tokio::signal::ctrl_c().await;
                        return;
                    }
                };
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            #[cfg(not(unix))]
            {
                let _ = tokio::signal::ctrl_c().await;
            }
        } => {
            tracing::info!("Received shutdown signal");
            let _ = capture_shutdown_tx.send(());
            let _ = publisher_shutdown_tx.send(());
            let _ = capture_watch.await;
            let _ = publisher_handle.await;
        }
    }

    Ok(())
}
