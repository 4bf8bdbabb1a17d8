//! Operator-facing notification bus.
//!
//! Global pub-sub keyed by `user_id` with wildcard broadcast. Carries the
//! call lifecycle events (`CALL_STARTED`, `CALL_UPDATED`, `CALL_ENDED`)
//! and anything posted through `POST /broadcast`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use cp_domain::customer::CustomerProfile;

const NOTIFY_BUFFER: usize = 64;

struct Subscriber {
    id: u64,
    sink: mpsc::Sender<Value>,
}

#[derive(Default)]
pub struct NotificationHub {
    subscribers: RwLock<HashMap<String, Vec<Subscriber>>>,
    next_id: AtomicU64,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, user_id: &str) -> (u64, mpsc::Receiver<Value>) {
        let (tx, rx) = mpsc::channel(NOTIFY_BUFFER);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .write()
            .entry(user_id.to_owned())
            .or_default()
            .push(Subscriber { id, sink: tx });
        tracing::info!(user_id = %user_id, "notification subscriber attached");
        (id, rx)
    }

    pub fn detach(&self, user_id: &str, id: u64) {
        let mut subscribers = self.subscribers.write();
        if let Some(subs) = subscribers.get_mut(user_id) {
            subs.retain(|s| s.id != id);
            if subs.is_empty() {
                subscribers.remove(user_id);
            }
        }
    }

    /// Send to one user, or to everyone when `user_id` is `None`.
    pub async fn broadcast(&self, message: &Value, user_id: Option<&str>) {
        let sinks: Vec<mpsc::Sender<Value>> = {
            let subscribers = self.subscribers.read();
            match user_id {
                Some(uid) => subscribers
                    .get(uid)
                    .map(|subs| subs.iter().map(|s| s.sink.clone()).collect())
                    .unwrap_or_default(),
                None => subscribers
                    .values()
                    .flatten()
                    .map(|s| s.sink.clone())
                    .collect(),
            }
        };
        for sink in sinks {
            if sink.send(message.clone()).await.is_err() {
                tracing::debug!("notification send failed");
            }
        }
    }

    // ── Call lifecycle events ──────────────────────────────────────

    pub async fn call_started(&self, call_id: &str, customer_info: &Value) {
        self.broadcast(
            &json!({
                "type": "CALL_STARTED",
                "callId": call_id,
                "customer_info": customer_info,
            }),
            None,
        )
        .await;
    }

    pub async fn call_updated(&self, call_id: &str, profile: &CustomerProfile) {
        self.broadcast(
            &json!({
                "type": "CALL_UPDATED",
                "callId": call_id,
                "customer_info": profile,
            }),
            None,
        )
        .await;
    }

    pub async fn call_ended(&self, call_id: &str) {
        self.broadcast(
            &json!({
                "type": "CALL_ENDED",
                "callId": call_id,
            }),
            None,
        )
        .await;
    }
}
