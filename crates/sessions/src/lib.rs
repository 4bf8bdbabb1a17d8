//! Per-call session state.
//!
//! The [`CallSessionStore`] exclusively owns mutable per-call records;
//! everything else in the system holds either a snapshot or a sink.
//! [`Checkpoints`] is the keyed state map the agent pipelines use to
//! persist their node state between turns.

pub mod checkpoint;
pub mod store;

pub use checkpoint::Checkpoints;
pub use store::{CallSession, CallSessionStore, Operator};
