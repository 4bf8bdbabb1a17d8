//! Guidance pipeline.
//!
//! Three-node state machine per call: analyze → (conditionally) retrieve
//! → generate. Agent turns only accumulate in the message log; customer
//! turns run the full graph. Node state persists across turns through a
//! per-call checkpoint.

pub mod prompts;

use std::sync::Arc;

use serde::Deserialize;

use cp_domain::agent::{AgentResult, AgentType, NextStep};
use cp_domain::customer::CustomerProfile;
use cp_domain::error::Result;
use cp_domain::turn::{DialogueTurn, Speaker, TurnRecord};
use cp_providers::{chat_structured, ChatModel, ChatParams};
use cp_retrieval::SearchEngine;
use cp_sessions::Checkpoints;

use crate::agents::render_dialogue;
use crate::runtime::orchestrator::CallAgent;

/// How many trailing turns the nodes look at.
const CONTEXT_TURNS: usize = 5;

/// Dense hits fetched per category in the retrieve node.
const PER_CATEGORY_K: usize = 2;

/// Utterances below this length are never analyzed.
const MIN_ANALYZE_CHARS: usize = 2;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Checkpointed state
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Clone, Default)]
struct GuidanceState {
    messages: Vec<DialogueTurn>,
    customer_info: Option<CustomerProfile>,
}

// ── Structured node outputs ─────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct AnalysisOutput {
    next_step: NextStep,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    search_filter: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateOutput {
    recommended_answer: String,
    work_guide: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Agent
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct GuidanceAgent {
    llm: Arc<dyn ChatModel>,
    search: Arc<SearchEngine>,
    checkpoints: Checkpoints<GuidanceState>,
}

impl GuidanceAgent {
    pub fn new(llm: Arc<dyn ChatModel>, search: Arc<SearchEngine>) -> Self {
        Self {
            llm,
            search,
            checkpoints: Checkpoints::new(),
        }
    }

    // ── Node 1: analyze ────────────────────────────────────────────

    async fn analyze(&self, state: &GuidanceState) -> AnalysisOutput {
        let skip = |reasoning: &str| AnalysisOutput {
            next_step: NextStep::Skip,
            reasoning: reasoning.into(),
            search_filter: Vec::new(),
        };

        let Some(last) = state.messages.last() else {
            return skip("대화 없음");
        };
        if last.text.chars().count() < MIN_ANALYZE_CHARS {
            return skip("분석 불필요");
        }
        if last.speaker == Speaker::Agent {
            return skip("상담사가 말함");
        }

        let dialogue = render_dialogue(&state.messages, CONTEXT_TURNS);
        let user = format!("## 대화 기록 (Context)\n{dialogue}");
        match chat_structured::<AnalysisOutput>(
            self.llm.as_ref(),
            prompts::ANALYZE_PROMPT,
            &user,
            ChatParams::temperature(0.0),
        )
        .await
        {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(error = %e, "guidance analysis failed");
                skip("에러 발생 스킵")
            }
        }
    }

    // ── Node 2: retrieve ───────────────────────────────────────────

    async fn retrieve(&self, state: &GuidanceState, search_filter: &[String]) -> String {
        let dialogue = render_dialogue(&state.messages, CONTEXT_TURNS);
        let user = format!("### [상담 기록]\n{dialogue}\n\n### 검색 문구:");
        let query = match self
            .llm
            .chat_text(prompts::QUERY_GEN_PROMPT, &user, ChatParams::temperature(0.0))
            .await
        {
            Ok(q) => q.trim().to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "query generation failed, searching on raw dialogue");
                dialogue.clone()
            }
        };

        let mut context = String::new();
        for category in search_filter {
            match self
                .search
                .semantic(&query, PER_CATEGORY_K, Some(category.as_str()))
                .await
            {
                Ok(docs) => {
                    for doc in docs {
                        context.push_str(&format!("[{category}] {}\n\n", doc.content));
                    }
                }
                Err(e) => {
                    tracing::warn!(category = %category, error = %e, "guidance retrieval failed");
                }
            }
        }

        if context.is_empty() {
            "관련된 매뉴얼이나 약관 정보를 찾지 못했습니다.".into()
        } else {
            context
        }
    }

    // ── Node 3: generate ───────────────────────────────────────────

    async fn generate(&self, state: &GuidanceState, context: &str) -> Result<GenerateOutput> {
        let customer_info = state
            .customer_info
            .as_ref()
            .and_then(|p| serde_json::to_string(p).ok())
            .unwrap_or_else(|| "(고객 정보 없음)".into());
        let dialogue = render_dialogue(&state.messages, CONTEXT_TURNS);

        let system = prompts::GENERATE_PROMPT
            .replace("{customer_info}", &customer_info)
            .replace("{context}", context)
            .replace("{dialogue}", &dialogue);

        chat_structured::<GenerateOutput>(
            self.llm.as_ref(),
            &system,
            "",
            ChatParams::temperature(0.2),
        )
        .await
    }
}

#[async_trait::async_trait]
impl CallAgent for GuidanceAgent {
    fn agent_type(&self) -> AgentType {
        AgentType::Guidance
    }

    async fn handle(
        &self,
        turn: &TurnRecord,
        call_id: &str,
        first_turn_profile: Option<CustomerProfile>,
    ) -> Result<AgentResult> {
        // Accumulate the turn (and the once-per-call profile) first.
        let state = self.checkpoints.update(call_id, |state| {
            if let Some(profile) = first_turn_profile {
                state.customer_info = Some(profile);
            }
            state.messages.push(DialogueTurn {
                speaker: turn.speaker,
                text: turn.transcript.clone(),
            });
            state.clone()
        });

        // Counselor speech is context, not a trigger.
        if turn.speaker == Speaker::Agent {
            return Ok(AgentResult::skip(
                AgentType::Guidance,
                "counselor turn accumulated",
            ));
        }

        let analysis = self.analyze(&state).await;
        tracing::debug!(
            call_id = %call_id,
            next_step = ?analysis.next_step,
            reasoning = %analysis.reasoning,
            "guidance analysis"
        );

        let context = match analysis.next_step {
            NextStep::Skip => {
                return Ok(AgentResult::skip(AgentType::Guidance, analysis.reasoning));
            }
            NextStep::Retrieve => self.retrieve(&state, &analysis.search_filter).await,
            NextStep::Generate => "(근거 검색 생략)".to_string(),
        };

        let output = self.generate(&state, &context).await?;
        Ok(AgentResult {
            agent_type: AgentType::Guidance,
            next_step: analysis.next_step,
            recommended_answer: Some(output.recommended_answer.trim().to_string()),
            work_guide: Some(output.work_guide.trim().to_string()),
            reasoning: Some(analysis.reasoning),
            marketing_type: None,
            proposal: None,
        })
    }
}
