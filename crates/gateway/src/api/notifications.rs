//! Per-user notification WebSocket and the external broadcast trigger.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::Json;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;

use crate::state::AppState;

pub async fn notifications_ws(
    ws: WebSocketUpgrade,
    Path(user_id): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, user_id, state))
}

async fn handle_socket(socket: WebSocket, user_id: String, state: AppState) {
    let (mut ws_sink, mut ws_stream) = socket.split();
    let (conn_id, mut rx) = state.notifier.attach(&user_id);

    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let Ok(text) = serde_json::to_string(&frame) else {
                continue;
            };
            if ws_sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    // Inbound traffic is heartbeat only; drain until the peer leaves.
    while let Some(Ok(message)) = ws_stream.next().await {
        if matches!(message, Message::Close(_)) {
            break;
        }
    }

    writer.abort();
    state.notifier.detach(&user_id, conn_id);
    tracing::info!(user_id = %user_id, "notification client disconnected");
}

/// `POST /api/v1/broadcast` — forward the JSON body to every subscriber.
/// Used by external services to pre-announce calls (e.g. phone ring).
pub async fn broadcast_event(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Json<Value> {
    state.notifier.broadcast(&body, None).await;
    Json(serde_json::json!({"status": "ok"}))
}
