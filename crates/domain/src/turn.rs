//! Speech-to-text turn types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Customer,
    Agent,
}

impl Speaker {
    /// Korean role label used when rendering dialogue into prompts.
    pub fn label(&self) -> &'static str {
        match self {
            Speaker::Customer => "고객",
            Speaker::Agent => "상담원",
        }
    }
}

/// One turn as delivered by the STT producer.
///
/// `turn_id` is optional on the wire; the session store assigns the next
/// counter value when it is absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingTurn {
    pub speaker: Speaker,
    pub transcript: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_id: Option<u64>,
}

/// A turn as recorded in the session history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRecord {
    pub turn_id: u64,
    pub speaker: Speaker,
    pub transcript: String,
    pub timestamp: DateTime<Utc>,
}

/// A speaker/text pair kept in the agent pipelines' own dialogue logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueTurn {
    pub speaker: Speaker,
    pub text: String,
}

impl DialogueTurn {
    pub fn customer(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Customer,
            text: text.into(),
        }
    }

    pub fn agent(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Agent,
            text: text.into(),
        }
    }
}
