// HTTP handlers: version, snapshot, reset, targets, report, packet inspection

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use serde::Deserialize;

use super::AppState;
use crate::models::{MonitorTargets, Report};
use crate::render;
use crate::version::{NAME, VERSION};
use crate::worker::now_millis;

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

/// GET /version — returns service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}

/// GET /api/snapshot
pub(super) async fn snapshot_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.store.snapshot(now_millis()))
}

/// GET /api/snapshot/text — the analytics panel as plain text.
pub(super) async fn snapshot_text_handler(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.store.snapshot(now_millis());
    let targets = state.targets_tx.borrow().clone();
    render::render_panel(&snapshot, &targets)
}

/// POST /api/reset — clears all analytics; returns the fresh (empty) snapshot.
pub(super) async fn reset_handler(State(state): State<AppState>) -> impl IntoResponse {
    let now = now_millis();
    state.store.reset(now);
    tracing::info!(operation = "reset", "Analytics reset");
    Json(state.store.snapshot(now))
}

/// GET /api/targets
pub(super) async fn get_targets_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.targets_tx.borrow().clone())
}

/// PUT /api/targets — takes effect from the next captured packet.
pub(super) async fn put_targets_handler(
    State(state): State<AppState>,
    Json(body): Json<MonitorTargets>,
) -> Response {
    let targets = MonitorTargets::new(body.target.trim(), body.router.trim());
    if targets.target.is_empty() || targets.router.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "target and router must be non-empty");
    }
    tracing::info!(target_ip = %targets.target, router_ip = %targets.router, "Monitor targets updated");
    state.targets_tx.send_replace(targets.clone());
    Json(targets).into_response()
}

/// GET /api/report — everything a report generator needs.
pub(super) async fn report_handler(State(state): State<AppState>) -> impl IntoResponse {
    let targets = state.targets_tx.borrow().clone();
    Json(Report {
        target: targets.target,
        router: targets.router,
        packets_captured: state.ring.len(),
        generated_at: chrono::Local::now().to_rfc3339(),
        snapshot: state.store.snapshot(now_millis()),
    })
}

/// GET /api/packets/latest — most recently captured packet, 404 when none yet.
pub(super) async fn latest_packet_handler(State(state): State<AppState>) -> Response {
    match state.ring.latest() {
        Some(packet) => Json(packet).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "no packets captured yet"),
    }
}

/// Page size for GET /api/packets when no `limit` is given.
const DEFAULT_PACKET_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
pub(super) struct PacketsQuery {
    limit: Option<usize>,
}

/// GET /api/packets?limit=N — most recent captured packets, newest first.
/// `limit` is capped at the ring capacity.
pub(super) async fn recent_packets_handler(
    State(state): State<AppState>,
    Query(query): Query<PacketsQuery>,
) -> impl IntoResponse {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PACKET_LIMIT)
        .min(state.ring.capacity());
    Json(state.ring.recent(limit))
}
