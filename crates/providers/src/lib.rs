//! LLM client for callpilot.
//!
//! The pipelines talk to the model through the [`ChatModel`] trait so
//! tests can substitute scripted fakes; the one production implementation
//! is [`OpenAiCompatClient`], which works against any endpoint following
//! the OpenAI chat-completions contract.

pub mod json;
pub mod openai_compat;
pub mod traits;

pub use openai_compat::OpenAiCompatClient;
pub use traits::{chat_structured, ChatModel, ChatParams};
