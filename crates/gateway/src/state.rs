//! Shared application state passed to all handlers.

use std::sync::Arc;

use cp_domain::config::Config;
use cp_sessions::CallSessionStore;

use crate::runtime::calls::CallRuntime;
use crate::services::notifier::NotificationHub;
use crate::services::rooms::MonitorRooms;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: Arc<CallSessionStore>,
    pub rooms: Arc<MonitorRooms>,
    pub notifier: Arc<NotificationHub>,
    pub runtime: Arc<CallRuntime>,
}
