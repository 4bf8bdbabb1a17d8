//! Call-session store.
//!
//! One record per live call, keyed by `call_id`. Invariants:
//! - `turn_id` strictly increases within a session
//! - `history` is append-only, never reordered
//! - once `end_time` is set the session is read-only
//! - end-of-call analysis runs at most once per session

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use cp_domain::customer::CustomerProfile;
use cp_domain::turn::{IncomingTurn, Speaker, TurnRecord};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session record
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The operator bound to a call by a monitor's IDENTIFY message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Operator {
    pub member_id: i64,
    pub tenant_name: String,
}

/// One tracked call.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CallSession {
    pub call_id: String,
    pub customer_info: Option<CustomerProfile>,
    pub operator: Option<Operator>,
    pub history: Vec<TurnRecord>,
    pub turn_counter: u64,
    pub is_first_turn: bool,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Set once when end-of-call analysis is scheduled; the second
    /// trigger (monitor CALL_ENDED + socket disconnect) becomes a no-op.
    analysis_started: bool,
}

impl CallSession {
    fn new(call_id: &str) -> Self {
        Self {
            call_id: call_id.to_owned(),
            is_first_turn: true,
            ..Self::default()
        }
    }

    pub fn finished(&self) -> bool {
        self.end_time.is_some()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Default)]
pub struct CallSessionStore {
    sessions: RwLock<HashMap<String, CallSession>>,
}

impl CallSessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot a session.
    pub fn get(&self, call_id: &str) -> Option<CallSession> {
        self.sessions.read().get(call_id).cloned()
    }

    /// Reset a session for a new (or restarted) call: history, counter and
    /// first-turn flag are cleared. An already-recorded start time is kept
    /// so a monitor attaching before the metadata frame still wins the
    /// "earliest moment" rule.
    pub fn reset(&self, call_id: &str) {
        let mut sessions = self.sessions.write();
        let start_time = sessions.get(call_id).and_then(|s| s.start_time);
        let mut session = CallSession::new(call_id);
        session.start_time = start_time;
        sessions.insert(call_id.to_owned(), session);
        tracing::info!(call_id = %call_id, "session reset");
    }

    /// Append a turn, assigning `turn_counter + 1` when the producer did
    /// not number it. Returns `None` once the session has ended.
    pub fn append_turn(&self, call_id: &str, turn: &IncomingTurn) -> Option<TurnRecord> {
        let mut sessions = self.sessions.write();
        let session = sessions
            .entry(call_id.to_owned())
            .or_insert_with(|| CallSession::new(call_id));
        if session.finished() {
            tracing::warn!(call_id = %call_id, "turn after call end ignored");
            return None;
        }

        let turn_id = turn.turn_id.unwrap_or(session.turn_counter + 1);
        session.turn_counter = session.turn_counter.max(turn_id);

        let now = Utc::now();
        if turn.speaker == Speaker::Customer && session.start_time.is_none() {
            session.start_time = Some(now);
        }

        let record = TurnRecord {
            turn_id,
            speaker: turn.speaker,
            transcript: turn.transcript.clone(),
            timestamp: now,
        };
        session.history.push(record.clone());
        Some(record)
    }

    /// Consume the first-turn flag, returning the profile to forward to
    /// the orchestrator exactly once per call.
    pub fn take_first_turn_profile(&self, call_id: &str) -> Option<CustomerProfile> {
        let mut sessions = self.sessions.write();
        let session = sessions.get_mut(call_id)?;
        if !session.is_first_turn {
            return None;
        }
        session.is_first_turn = false;
        Some(
            session
                .customer_info
                .clone()
                .unwrap_or_else(CustomerProfile::unknown),
        )
    }

    pub fn set_profile(&self, call_id: &str, profile: CustomerProfile) {
        let mut sessions = self.sessions.write();
        let session = sessions
            .entry(call_id.to_owned())
            .or_insert_with(|| CallSession::new(call_id));
        session.customer_info = Some(profile);
    }

    pub fn bind_operator(&self, call_id: &str, member_id: i64, tenant_name: String) {
        let mut sessions = self.sessions.write();
        let session = sessions
            .entry(call_id.to_owned())
            .or_insert_with(|| CallSession::new(call_id));
        session.operator = Some(Operator {
            member_id,
            tenant_name,
        });
        tracing::info!(call_id = %call_id, member_id, "operator bound");
    }

    /// Record the call start moment if not already recorded (monitor
    /// attach path; re-attaches must not move it).
    pub fn mark_start(&self, call_id: &str) {
        let mut sessions = self.sessions.write();
        let session = sessions
            .entry(call_id.to_owned())
            .or_insert_with(|| CallSession::new(call_id));
        if session.start_time.is_none() {
            session.start_time = Some(Utc::now());
            tracing::info!(call_id = %call_id, "call start recorded");
        }
    }

    /// Set the end time (once) and return a snapshot for analysis.
    pub fn finish(&self, call_id: &str) -> Option<CallSession> {
        let mut sessions = self.sessions.write();
        let session = sessions.get_mut(call_id)?;
        if session.end_time.is_none() {
            session.end_time = Some(Utc::now());
        }
        Some(session.clone())
    }

    /// Claim the single analysis slot for this call. The first caller
    /// gets `true`; everyone after gets `false`.
    pub fn begin_analysis(&self, call_id: &str) -> bool {
        let mut sessions = self.sessions.write();
        match sessions.get_mut(call_id) {
            Some(session) if !session.analysis_started => {
                session.analysis_started = true;
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}
