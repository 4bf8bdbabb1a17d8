//! Per-call monitor rooms.
//!
//! A room is the set of operator consoles watching one call. Each monitor
//! WebSocket registers an mpsc sender here and drains the paired receiver
//! from its writer task; broadcasting never touches the socket directly,
//! so a slow or dropped peer cannot stall the caller.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::mpsc;

/// Outbound frames queued per monitor before the writer task applies
/// backpressure by dropping the connection.
const MONITOR_BUFFER: usize = 64;

struct MonitorConn {
    id: u64,
    sink: mpsc::Sender<Value>,
}

#[derive(Default)]
pub struct MonitorRooms {
    rooms: RwLock<HashMap<String, Vec<MonitorConn>>>,
    next_id: AtomicU64,
}

impl MonitorRooms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a monitor for `call_id`. Returns the connection id (for
    /// [`detach`](Self::detach)) and the receiver the ws writer drains.
    pub fn attach(&self, call_id: &str) -> (u64, mpsc::Receiver<Value>) {
        let (tx, rx) = mpsc::channel(MONITOR_BUFFER);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut rooms = self.rooms.write();
        rooms
            .entry(call_id.to_owned())
            .or_default()
            .push(MonitorConn { id, sink: tx });
        tracing::info!(
            call_id = %call_id,
            monitors = rooms.get(call_id).map(|r| r.len()).unwrap_or(0),
            "monitor attached"
        );
        (id, rx)
    }

    /// Remove a monitor; empty rooms are deleted.
    pub fn detach(&self, call_id: &str, id: u64) {
        let mut rooms = self.rooms.write();
        if let Some(conns) = rooms.get_mut(call_id) {
            conns.retain(|c| c.id != id);
            if conns.is_empty() {
                rooms.remove(call_id);
                tracing::info!(call_id = %call_id, "monitor room cleared");
            }
        }
    }

    /// Send `message` to every monitor in the room. The subscriber list
    /// is copied before sending so a peer dropping mid-broadcast cannot
    /// corrupt the set; send failures only log.
    pub async fn broadcast(&self, call_id: &str, message: &Value) {
        let sinks: Vec<(u64, mpsc::Sender<Value>)> = {
            let rooms = self.rooms.read();
            match rooms.get(call_id) {
                Some(conns) => conns.iter().map(|c| (c.id, c.sink.clone())).collect(),
                None => return,
            }
        };
        for (id, sink) in sinks {
            if sink.send(message.clone()).await.is_err() {
                tracing::debug!(call_id = %call_id, monitor = id, "monitor send failed");
            }
        }
    }

    pub fn monitor_count(&self, call_id: &str) -> usize {
        self.rooms.read().get(call_id).map(|r| r.len()).unwrap_or(0)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.read().len()
    }
}
