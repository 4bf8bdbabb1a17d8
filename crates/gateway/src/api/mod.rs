pub mod ingress;
pub mod monitor;
pub mod notifications;

use axum::routing::{get, post};
use axum::{Json, Router};

use crate::state::AppState;

/// Build the full API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        // STT producer ingress (one stream per call)
        .route("/api/v1/calls/ws", get(ingress::ingress_ws))
        // Operator monitor, per call
        .route("/api/v1/calls/:call_id/monitor", get(monitor::monitor_ws))
        // Operator notifications, per user
        .route(
            "/api/v1/notifications/:user_id",
            get(notifications::notifications_ws),
        )
        // External ring-event trigger
        .route("/api/v1/broadcast", post(notifications::broadcast_event))
}

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({"message": "callpilot"}))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}
