// HTTP + WebSocket routes: the surface presenters use to read, stream and reset analytics

mod http;
mod ws;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use tokio::sync::{broadcast, watch};
use tower_http::cors::{Any, CorsLayer};

use crate::models::{FeedEvent, MonitorTargets, Snapshot};
use crate::ring::PacketRing;
use crate::store::AnalyticsStore;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) store: Arc<AnalyticsStore>,
    pub(crate) ring: Arc<PacketRing>,
    pub(crate) snapshot_tx: broadcast::Sender<Snapshot>,
    pub(crate) events_tx: broadcast::Sender<FeedEvent>,
    pub(crate) targets_tx: Arc<watch::Sender<MonitorTargets>>,
    pub(crate) ws_analytics_connections: Arc<AtomicUsize>,
}

/// Handles shared between the workers and the router.
pub struct RouteDeps {
    pub store: Arc<AnalyticsStore>,
    pub ring: Arc<PacketRing>,
    pub snapshot_tx: broadcast::Sender<Snapshot>,
    pub events_tx: broadcast::Sender<FeedEvent>,
    pub targets_tx: Arc<watch::Sender<MonitorTargets>>,
    pub ws_analytics_connections: Arc<AtomicUsize>,
}

pub fn app(deps: RouteDeps) -> Router {
    let RouteDeps {
        store,
        ring,
        snapshot_tx,
        events_tx,
        targets_tx,
        ws_analytics_connections,
    } = deps;
    let state = AppState {
        store,
        ring,
        snapshot_tx,
        events_tx,
        targets_tx,
        ws_analytics_connections,
    };
    Router::new()
        .route("/", get(|| async { "trafficlens: live traffic analytics" })) // GET /
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/snapshot", get(http::snapshot_handler)) // GET /api/snapshot
        .route("/api/snapshot/text", get(http::snapshot_text_handler)) // GET /api/snapshot/text
        .route("/api/reset", post(http::reset_handler)) // POST /api/reset
        .route(
            "/api/targets",
            get(http::get_targets_handler).put(http::put_targets_handler),
        ) // GET, PUT /api/targets
        .route("/api/report", get(http::report_handler)) // GET /api/report
        .route("/api/packets", get(http::recent_packets_handler)) // GET /api/packets?limit=N
        .route("/api/packets/latest", get(http::latest_packet_handler)) // GET /api/packets/latest
        .route("/ws/analytics", get(ws::ws_analytics)) // WS /ws/analytics
        .route("/ws/events", get(ws::ws_events)) // WS /ws/events
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
