//! Agent orchestration.
//!
//! Every registered agent sees every turn. Handlers run concurrently and
//! their results are yielded in completion order: the fast pipeline's
//! answer reaches monitors while the slow one is still searching. A
//! handler failure is logged and contributes nothing; it never cancels
//! its siblings.

use std::sync::Arc;

use futures_util::stream::{FuturesUnordered, Stream, StreamExt};

use cp_domain::agent::{AgentResult, AgentType, NextStep};
use cp_domain::customer::CustomerProfile;
use cp_domain::error::Result;
use cp_domain::turn::TurnRecord;

/// One agent pipeline as seen by the orchestrator.
#[async_trait::async_trait]
pub trait CallAgent: Send + Sync {
    fn agent_type(&self) -> AgentType;

    /// Process one turn for one call. `first_turn_profile` is present
    /// exactly once per call, on the first dispatched turn.
    async fn handle(
        &self,
        turn: &TurnRecord,
        call_id: &str,
        first_turn_profile: Option<CustomerProfile>,
    ) -> Result<AgentResult>;
}

#[derive(Default)]
pub struct AgentRegistry {
    agents: Vec<Arc<dyn CallAgent>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, agent: Arc<dyn CallAgent>) {
        tracing::info!(agent = ?agent.agent_type(), "agent registered");
        self.agents.push(agent);
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Fan a turn out to every agent, yielding non-skip results as each
    /// handler completes. No ordering between agents is guaranteed.
    pub fn process_turn(
        &self,
        turn: TurnRecord,
        call_id: String,
        first_turn_profile: Option<CustomerProfile>,
    ) -> impl Stream<Item = AgentResult> + Send {
        let mut pending: FuturesUnordered<_> = self
            .agents
            .iter()
            .cloned()
            .map(|agent| {
                let turn = turn.clone();
                let call_id = call_id.clone();
                let profile = first_turn_profile.clone();
                async move {
                    let agent_type = agent.agent_type();
                    (agent_type, agent.handle(&turn, &call_id, profile).await)
                }
            })
            .collect();

        async_stream::stream! {
            while let Some((agent_type, outcome)) = pending.next().await {
                match outcome {
                    Ok(result) if result.next_step != NextStep::Skip => yield result,
                    Ok(result) => {
                        tracing::debug!(
                            agent = ?agent_type,
                            reason = result.reasoning.as_deref().unwrap_or(""),
                            "agent skipped turn"
                        );
                    }
                    Err(e) => {
                        tracing::warn!(agent = ?agent_type, error = %e, "agent handler failed");
                    }
                }
            }
        }
    }
}
