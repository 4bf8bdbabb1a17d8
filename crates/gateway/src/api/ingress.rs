//! Ingress WebSocket for the STT producer.
//!
//! One bidirectional socket per call carrying two frame shapes: metadata
//! (call id + optional customer number) and turns. The server NEVER
//! writes data frames back to this socket: the producer has no receive
//! loop and would collapse under buffered responses; everything flows to
//! the monitor rooms instead. Binary frames and non-JSON text close the
//! socket with code 1003.

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use serde_json::Value;

use cp_domain::turn::IncomingTurn;

use crate::state::AppState;

/// Close code for unsupported payloads (RFC 6455: unacceptable data).
const CLOSE_UNSUPPORTED: u16 = 1003;

pub async fn ingress_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// What one ingress frame asks the server to do.
#[derive(Debug, PartialEq)]
enum Frame {
    Metadata {
        call_id: String,
        customer_number: Option<String>,
    },
    Turn(IncomingTurn),
    Ignored,
}

/// Classify a parsed JSON frame. Metadata wins when both shapes could
/// match; a frame with neither shape is ignored.
fn classify_frame(value: &Value) -> Frame {
    let call_id = value
        .get("callId")
        .or_else(|| value.get("call_id"))
        .and_then(Value::as_str);

    if let Some(call_id) = call_id {
        if value.get("transcript").is_none() {
            return Frame::Metadata {
                call_id: call_id.to_owned(),
                customer_number: value
                    .get("customer_number")
                    .and_then(Value::as_str)
                    .map(String::from),
            };
        }
    }

    if value.get("transcript").is_some() && value.get("speaker").is_some() {
        if let Ok(turn) = serde_json::from_value::<IncomingTurn>(value.clone()) {
            return Frame::Turn(turn);
        }
    }

    Frame::Ignored
}

async fn close_unsupported(socket: &mut WebSocket, reason: &'static str) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code: CLOSE_UNSUPPORTED,
            reason: reason.into(),
        })))
        .await;
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    // Until metadata names the call, turns accumulate under a
    // server-generated session id.
    let mut call_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(session_id = %call_id, "ingress connected");

    while let Some(message) = socket.recv().await {
        let message = match message {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(call_id = %call_id, error = %e, "ingress receive error");
                break;
            }
        };

        match message {
            Message::Text(text) => {
                let Ok(value) = serde_json::from_str::<Value>(&text) else {
                    tracing::warn!(call_id = %call_id, "non-JSON frame on ingress");
                    close_unsupported(&mut socket, "non-JSON frame").await;
                    break;
                };
                match classify_frame(&value) {
                    Frame::Metadata {
                        call_id: new_call_id,
                        customer_number,
                    } => {
                        call_id = new_call_id;
                        state.runtime.begin_call(&call_id, customer_number).await;
                    }
                    Frame::Turn(turn) => {
                        state.runtime.ingest_turn(&call_id, turn).await;
                    }
                    Frame::Ignored => {}
                }
            }
            Message::Binary(_) => {
                tracing::warn!(call_id = %call_id, "binary frame on ingress");
                close_unsupported(&mut socket, "binary frames not supported").await;
                break;
            }
            Message::Close(_) => break,
            // axum answers WS-level ping/pong automatically.
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    // Disconnect is the end of the call: announce it and hand the
    // session to the analyzer. In-flight turn tasks keep running.
    tracing::info!(call_id = %call_id, "ingress disconnected");
    state.runtime.finish_call(&call_id).await;
}
