//! Shared types for the callpilot workspace.
//!
//! Everything that crosses a crate boundary lives here: the error enum,
//! the configuration tree, customer/turn/analysis schemas and the agent
//! result types exchanged between the orchestrator and the pipelines.

pub mod agent;
pub mod analysis;
pub mod config;
pub mod customer;
pub mod error;
pub mod turn;

pub use error::{Error, Result};
