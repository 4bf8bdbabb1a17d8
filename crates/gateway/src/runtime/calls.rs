//! Call lifecycle runtime.
//!
//! Shared by the ingress socket and the monitor endpoints: metadata
//! resets, turn ingestion with detached per-turn orchestration, and
//! idempotent end-of-call handling. Nothing here ever writes back to the
//! STT source socket; all output goes to monitor rooms and the
//! notification hub.

use std::sync::Arc;

use futures_util::{pin_mut, StreamExt};
use serde_json::json;

use cp_domain::customer::CustomerProfile;
use cp_domain::turn::{IncomingTurn, TurnRecord};
use cp_sessions::CallSessionStore;

use crate::runtime::orchestrator::AgentRegistry;
use crate::services::analysis::CallAnalyzer;
use crate::services::backoffice::{CallArchive, ProfileDirectory};
use crate::services::notifier::NotificationHub;
use crate::services::rooms::MonitorRooms;

#[derive(Clone)]
pub struct CallRuntime {
    pub sessions: Arc<CallSessionStore>,
    pub rooms: Arc<MonitorRooms>,
    pub notifier: Arc<NotificationHub>,
    pub directory: Arc<dyn ProfileDirectory>,
    pub archive: Arc<dyn CallArchive>,
    pub agents: Arc<AgentRegistry>,
    pub analyzer: Arc<CallAnalyzer>,
}

impl CallRuntime {
    /// Metadata frame: reset the session, announce the call with a
    /// placeholder profile, and resolve the real profile in the
    /// background when the producer supplied a customer number.
    pub async fn begin_call(&self, call_id: &str, customer_number: Option<String>) {
        tracing::info!(call_id = %call_id, "call metadata received");
        self.sessions.reset(call_id);

        self.notifier
            .call_started(
                call_id,
                &json!({"name": "로딩중...", "rate_plan": "확인중..."}),
            )
            .await;

        if let Some(number) = customer_number {
            let runtime = self.clone();
            let call_id = call_id.to_owned();
            tokio::spawn(async move {
                runtime.resolve_profile(&call_id, &number).await;
            });
        }

        self.rooms
            .broadcast(
                call_id,
                &json!({
                    "type": "metadata_update",
                    "data": {"status": "received", "callId": call_id},
                }),
            )
            .await;
    }

    async fn resolve_profile(&self, call_id: &str, customer_number: &str) {
        tracing::info!(call_id = %call_id, "fetching customer profile");
        let Some(mut profile) = self.directory.fetch_profile(customer_number).await else {
            tracing::warn!(call_id = %call_id, "customer profile fetch failed");
            return;
        };
        profile.phone_number = customer_number.to_owned();
        self.sessions.set_profile(call_id, profile.clone());
        self.notifier.call_updated(call_id, &profile).await;
    }

    /// Turn frame: append to history, broadcast the transcript, and
    /// launch the orchestrator as a detached task. Returns the assigned
    /// turn id, or `None` when the turn was rejected (empty transcript,
    /// session already ended).
    pub async fn ingest_turn(&self, call_id: &str, turn: IncomingTurn) -> Option<u64> {
        if turn.transcript.trim().is_empty() {
            return None;
        }

        let record = self.sessions.append_turn(call_id, &turn)?;
        tracing::info!(
            call_id = %call_id,
            turn_id = record.turn_id,
            speaker = ?record.speaker,
            "turn ingested"
        );

        self.rooms
            .broadcast(
                call_id,
                &json!({
                    "type": "transcript_update",
                    "data": {
                        "speaker": record.speaker,
                        "transcript": record.transcript,
                        "turn_id": record.turn_id,
                        "session_id": call_id,
                    },
                }),
            )
            .await;

        let first_turn_profile = self.sessions.take_first_turn_profile(call_id);

        // Detached: the ingress loop moves on to the next frame while the
        // pipelines work. Subsequent turns may overlap in execution.
        let runtime = self.clone();
        let call_id = call_id.to_owned();
        let turn_id = record.turn_id;
        tokio::spawn(async move {
            runtime
                .process_turn_background(record, call_id, first_turn_profile)
                .await;
        });

        Some(turn_id)
    }

    async fn process_turn_background(
        &self,
        record: TurnRecord,
        call_id: String,
        first_turn_profile: Option<CustomerProfile>,
    ) {
        self.rooms
            .broadcast(
                &call_id,
                &json!({
                    "type": "processing",
                    "turn_id": record.turn_id,
                    "agent_type": "guidance",
                }),
            )
            .await;

        let turn_id = record.turn_id;
        let stream = self
            .agents
            .process_turn(record, call_id.clone(), first_turn_profile);
        pin_mut!(stream);

        while let Some(result) = stream.next().await {
            let frame = match serde_json::to_value(&result) {
                Ok(results) => json!({
                    "type": "result",
                    "agent_type": result.agent_type,
                    "turn_id": turn_id,
                    "results": results,
                }),
                Err(e) => {
                    tracing::error!(error = %e, "agent result serialization failed");
                    continue;
                }
            };
            self.rooms.broadcast(&call_id, &frame).await;
        }
    }

    /// End of call, from either the monitor's explicit CALL_ENDED or the
    /// ingress socket closing. Both paths may fire; the analysis slot in
    /// the session store makes sure only one analyzer runs.
    pub async fn finish_call(&self, call_id: &str) {
        tracing::info!(call_id = %call_id, "call ended");
        self.notifier.call_ended(call_id).await;

        let Some(snapshot) = self.sessions.finish(call_id) else {
            return;
        };
        if snapshot.history.is_empty() {
            tracing::info!(call_id = %call_id, "no history, nothing to analyze");
            return;
        }
        if !self.sessions.begin_analysis(call_id) {
            tracing::debug!(call_id = %call_id, "analysis already scheduled");
            return;
        }

        let runtime = self.clone();
        tokio::spawn(async move {
            runtime
                .analyzer
                .run(snapshot, runtime.archive.as_ref())
                .await;
        });
    }
}
