//! Monitor WebSocket: one operator console watching one call.
//!
//! The socket joins the call's room and drains broadcast frames through
//! a writer task. Inbound messages are operator commands: explicit
//! CALL_ENDED and IDENTIFY (operator binding). Malformed JSON from a
//! console is ignored, not fatal.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;

use crate::state::AppState;

pub async fn monitor_ws(
    ws: WebSocketUpgrade,
    Path(call_id): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, call_id, state))
}

async fn handle_socket(socket: WebSocket, call_id: String, state: AppState) {
    let (mut ws_sink, mut ws_stream) = socket.split();
    let (conn_id, mut rx) = state.rooms.attach(&call_id);

    // First attach defines the call start when no customer turn beat it.
    state.sessions.mark_start(&call_id);

    // Writer: room broadcasts → socket.
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

    // Reader: operator commands.
    while let Some(Ok(message)) = ws_stream.next().await {
        match message {
            Message::Text(text) => {
                let Ok(value) = serde_json::from_str::<Value>(&text) else {
                    continue;
                };
                handle_command(&state, &call_id, &value).await;
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    writer.abort();
    state.rooms.detach(&call_id, conn_id);
    tracing::info!(call_id = %call_id, "monitor disconnected");
}

async fn handle_command(state: &AppState, call_id: &str, value: &Value) {
    match value.get("type").and_then(Value::as_str) {
        Some("CALL_ENDED") => {
            tracing::info!(call_id = %call_id, "explicit call end from monitor");
            state.runtime.finish_call(call_id).await;
        }
        Some("IDENTIFY") => {
            let Some(member_id) = value.get("memberId").and_then(Value::as_i64) else {
                return;
            };
            let tenant_name = value
                .get("tenantName")
                .and_then(Value::as_str)
                .unwrap_or("default")
                .to_owned();
            state.sessions.bind_operator(call_id, member_id, tenant_name);
        }
        _ => {}
    }
}
