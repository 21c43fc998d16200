// WebSocket handlers and stream logic

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use bytes::Bytes;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use tokio::sync::broadcast;
use tokio::time::{Duration, timeout};

use super::AppState;
use crate::models::{FeedEvent, Snapshot};
use crate::worker::now_millis;

pub(super) const WS_PING_INTERVAL: Duration = Duration::from_secs(30);
pub(super) const WS_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Decrements ws_analytics connection count on drop (connect = +1, drop = -1).
struct WsAnalyticsGuard(Arc<AtomicUsize>);

impl Drop for WsAnalyticsGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, std::sync::atomic::Ordering::Relaxed);
    }
}

/// Sends one text frame; `false` when the client is gone or too slow.
async fn send_text(socket: &mut WebSocket, json: String) -> bool {
    let r = timeout(WS_SEND_TIMEOUT, socket.send(Message::Text(json.into()))).await;
    matches!(r, Ok(Ok(())))
}

pub(super) async fn ws_analytics(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let tx = state.snapshot_tx.clone();
    let conn_count = state.ws_analytics_connections.clone();
    let store = state.store.clone();
    ws.on_upgrade(move |socket| async move {
        let mut rx = tx.subscribe();
        // Current state first, so clients need not wait for the next refresh tick.
        let initial = store.snapshot(now_millis());
        if let Err(e) = stream_analytics(socket, &mut rx, conn_count, initial).await {
            tracing::info!("Analytics stream error: {}", e);
        }
    })
}

async fn stream_analytics(
    mut socket: WebSocket,
    rx: &mut broadcast::Receiver<Snapshot>,
    conn_count: Arc<AtomicUsize>,
    initial: Snapshot,
) -> anyhow::Result<()> {
    conn_count.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    let _guard = WsAnalyticsGuard(conn_count);
    tracing::info!("Client connected to analytics stream");

    if !send_text(&mut socket, serde_json::to_string(&initial)?).await {
        return Ok(());
    }
    forward(socket, rx, "/ws/analytics").await
}

pub(super) async fn ws_events(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let tx = state.events_tx.clone();
    ws.on_upgrade(move |socket| async move {
        let mut rx = tx.subscribe();
        tracing::info!("Client connected to events stream");
        if let Err(e) = forward::<FeedEvent>(socket, &mut rx, "/ws/events").await {
            tracing::info!("Events stream error: {}", e);
        }
    })
}

/// Relays broadcast messages as JSON text frames, pinging every WS_PING_INTERVAL.
/// A lagging client skips what it missed and carries on.
async fn forward<T: Clone + Serialize>(
    mut socket: WebSocket,
    rx: &mut broadcast::Receiver<T>,
    endpoint: &'static str,
) -> anyhow::Result<()> {
    let mut ping_interval = tokio::time::interval(WS_PING_INTERVAL);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(message) => {
                        if !send_text(&mut socket, serde_json::to_string(&message)?).await {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("WebSocket {} client lagged, skipped {} messages", endpoint, n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            _ = ping_interval.tick() => {
                let r = timeout(WS_SEND_TIMEOUT, socket.send(Message::Ping(Bytes::new()))).await;
                if !matches!(r, Ok(Ok(()))) {
                    break;
                }
            }
        }
    }
    Ok(())
}
