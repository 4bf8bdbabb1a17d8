//! Real-time call-assistance gateway.
//!
//! One process serves four surfaces: the STT ingress WebSocket, per-call
//! monitor WebSockets, the per-user notification WebSocket, and a small
//! HTTP API. Turns flow ingress → session store → monitor broadcast →
//! orchestrator → agent pipelines, with agent results streamed back to
//! monitors in completion order.

pub mod agents;
pub mod api;
pub mod runtime;
pub mod services;
pub mod state;
