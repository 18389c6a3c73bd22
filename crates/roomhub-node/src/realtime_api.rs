//! Real-time WebSocket API.
//!
//! - `/ws?room_id=<id>&token=<jwt>` - one connection per room
//! - `/api/realtime/stats` - registry statistics
//!
//! The handshake is checked before the upgrade, so a rejected client gets a
//! plain HTTP error (401, 403 or 503) and never reaches the hub.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures_util::{Sink, SinkExt, StreamExt};
use roomhub_realtime::{ConnectionHandler, Frame, HandshakeParams, Identity, SessionReceiver};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::api::{ApiError, AppState};

/// How long a finished connection may spend flushing frames still queued
/// for it.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Create the real-time API routes.
pub fn realtime_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/api/realtime/stats", get(get_stats))
}

/// WebSocket upgrade handler.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<HandshakeParams>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    check_origin(&state.allowed_origins, &headers)?;

    let identity = match state.hub.authenticate(&params).await {
        Ok(identity) => identity,
        Err(e) => {
            info!(error = %e, "Handshake rejected");
            return Err(e.into());
        }
    };
    state.hub.admit()?;

    let hub = state.hub.clone();
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, hub, identity)))
}

/// Rejects browsers calling from an origin outside the allow-list.
fn check_origin(allowed: &[String], headers: &HeaderMap) -> Result<(), ApiError> {
    if allowed.is_empty() {
        return Ok(());
    }
    let Some(origin) = headers.get(header::ORIGIN) else {
        return Ok(());
    };
    let origin = origin.to_str().unwrap_or_default();
    if allowed.iter().any(|a| a == origin) {
        Ok(())
    } else {
        warn!(origin = %origin, "Origin rejected");
        Err(ApiError::OriginRejected(origin.to_string()))
    }
}

/// Handle an upgraded WebSocket connection.
async fn handle_socket(socket: WebSocket, hub: Arc<ConnectionHandler>, identity: Identity) {
    let (connection, mut outbound) = match hub.activate(identity) {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "Failed to activate connection");
            return;
        }
    };
    let session_id = connection.session().id.clone();

    let (ws_sender, ws_receiver) = socket.split();
    let mut send_task = tokio::spawn(write_frames(outbound, ws_sender));

    let inbound = ws_receiver.map(|msg| msg.map(into_frame));

    tokio::select! {
        reason = connection.run(inbound) => {
            debug!(session_id = %session_id, reason = ?reason, "Receive loop ended");
            // The session is unregistered, so its queue ends once drained.
            if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut send_task).await.is_err() {
                debug!(session_id = %session_id, "Writer did not drain in time");
                send_task.abort();
            }
        }
        _ = &mut send_task => {
            debug!(session_id = %session_id, "Writer stopped, closing connection");
        }
    }

    info!(session_id = %session_id, "WebSocket client disconnected");
}

/// Forwards a session's queued frames to the socket until the queue ends or
/// the socket fails, then closes the socket.
async fn write_frames<S>(mut outbound: SessionReceiver, mut sink: S)
where
    S: Sink<Message> + Unpin,
{
    while let Some(frame) = outbound.recv().await {
        if sink.send(Message::Text(frame.into())).await.is_err() {
            debug!("Socket rejected frame, writer stopping");
            return;
        }
    }
    let _ = sink.close().await;
}

fn into_frame(message: Message) -> Frame {
    match message {
        Message::Text(text) => Frame::Text(text.as_str().to_owned()),
        Message::Binary(data) => Frame::Binary(data.to_vec()),
        Message::Ping(_) | Message::Pong(_) => Frame::Ping,
        Message::Close(_) => Frame::Close,
    }
}

/// Statistics response.
#[derive(Debug, Serialize)]
struct StatsResponse {
    current_sessions: usize,
    current_rooms: usize,
    total_registrations: u64,
    total_broadcasts: u64,
    failed_deliveries: u64,
    max_connections: usize,
}

/// Get real-time connection statistics.
async fn get_stats(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.hub.registry().stats();
    Json(StatsResponse {
        current_sessions: stats.current_sessions,
        current_rooms: stats.current_rooms,
        total_registrations: stats.total_registrations,
        total_broadcasts: stats.total_broadcasts,
        failed_deliveries: stats.failed_deliveries,
        max_connections: state.hub.max_connections(),
    })
}
