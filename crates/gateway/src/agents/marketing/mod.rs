//! Marketing pipeline.
//!
//! Gatekeeper → deep analysis → stage transition → (conditional)
//! retrieval → generation, with sticky conversational context: a
//! standing proposal survives follow-up objections, rejected products
//! stay blacklisted, and the stage machine walks
//! listening → proposing → negotiating → closing.

pub mod nodes;
pub mod prompts;
pub mod state;

use std::sync::Arc;

use cp_domain::agent::{AgentResult, AgentType, MarketingType, NextStep};
use cp_domain::customer::CustomerProfile;
use cp_domain::error::Result;
use cp_domain::turn::{DialogueTurn, Speaker, TurnRecord};
use cp_providers::{ChatModel, ChatParams};
use cp_retrieval::SearchEngine;
use cp_sessions::Checkpoints;

use crate::agents::gatekeeper::{GateOutcome, Gatekeeper};
use crate::agents::render_dialogue;
use crate::runtime::orchestrator::CallAgent;

use state::{transition, DeepAnalysis, MarketingState};

/// Turns of context given to the deep analyzer.
const ANALYSIS_TURNS: usize = 6;

/// Keywords folded into the retrieval query when the dialogue mentions
/// them (they anchor the search on the contractual topic at hand).
const QUERY_KEYWORDS: &[&str] = &[
    "해지", "위약금", "약정", "결합", "가족결합", "재결합", "요금제",
    "변경", "할인", "혜택", "동의", "개인정보", "인터넷", "IPTV",
];

const QUERY_MAX_CHARS: usize = 1400;

pub struct MarketingAgent {
    llm: Arc<dyn ChatModel>,
    search: Arc<SearchEngine>,
    gatekeeper: Arc<Gatekeeper>,
    checkpoints: Checkpoints<MarketingState>,
}

impl MarketingAgent {
    pub fn new(
        llm: Arc<dyn ChatModel>,
        search: Arc<SearchEngine>,
        gatekeeper: Arc<Gatekeeper>,
    ) -> Self {
        Self {
            llm,
            search,
            gatekeeper,
            checkpoints: Checkpoints::new(),
        }
    }

    /// Retrieval query: current plans, dialogue-matched keywords, then
    /// the dialogue itself, pipe-joined and truncated.
    fn build_query(state: &MarketingState) -> String {
        let dialogue = render_dialogue(&state.turns, 14);
        let keywords: Vec<&str> = QUERY_KEYWORDS
            .iter()
            .filter(|kw| dialogue.contains(**kw))
            .take(10)
            .copied()
            .collect();

        let mut parts: Vec<String> = Vec::new();
        if let Some(customer) = &state.customer {
            if !customer.rate_plan.is_empty() {
                parts.push(customer.rate_plan.clone());
            }
            if let Some(internet) = customer.internet_product.as_deref().filter(|s| !s.is_empty()) {
                parts.push(internet.to_string());
            }
        }
        if !keywords.is_empty() {
            parts.push(keywords.join(" "));
        }
        parts.push(dialogue);

        parts.join(" | ").chars().take(QUERY_MAX_CHARS).collect()
    }

    async fn deep_analyze(
        &self,
        state: &MarketingState,
        last_msg: &str,
        route: &crate::agents::gatekeeper::RouteDecision,
    ) -> Option<DeepAnalysis> {
        let customer = state.customer.clone().unwrap_or_default();
        let signals = customer.signals();
        let user = format!(
            "[ROUTER_HINT]\nintent={}, sentiment={}, marketing_opportunity={}\n\n\
             [대화 기록 (최근 상황)]\n{}\n\n[현재 고객 발언]\n\"{}\"\n\n\
             [고객 프로필]\n요금제: {}\n약정상태: {}개월 남음\n월납부액: {}원\n특이사항(Signals): {}",
            route.intent,
            route.sentiment,
            route.marketing_opportunity,
            render_dialogue(&state.turns, ANALYSIS_TURNS),
            crate::agents::pii::mask_pii(last_msg),
            customer.rate_plan,
            customer
                .remaining_months
                .map(|m| m.to_string())
                .unwrap_or_else(|| "-".into()),
            customer
                .monthly_fee_won
                .map(|f| f.to_string())
                .unwrap_or_else(|| "-".into()),
            if signals.is_empty() {
                "없음".to_string()
            } else {
                signals.join(", ")
            },
        );

        match self
            .llm
            .chat_json(
                prompts::DEEP_ANALYSIS_SYSTEM,
                &user,
                ChatParams::temperature(0.0),
            )
            .await
        {
            Ok(value) => match serde_json::from_value::<DeepAnalysis>(value) {
                Ok(analysis) => Some(analysis),
                Err(e) => {
                    tracing::warn!(error = %e, "deep analysis output malformed");
                    None
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "deep analysis failed");
                None
            }
        }
    }
}

#[async_trait::async_trait]
impl CallAgent for MarketingAgent {
    fn agent_type(&self) -> AgentType {
        AgentType::Marketing
    }

    async fn handle(
        &self,
        turn: &TurnRecord,
        call_id: &str,
        first_turn_profile: Option<CustomerProfile>,
    ) -> Result<AgentResult> {
        let state = self.checkpoints.update(call_id, |state| {
            if let Some(profile) = first_turn_profile {
                state.customer = Some(profile);
            }
            state.turns.push(DialogueTurn {
                speaker: turn.speaker,
                text: turn.transcript.clone(),
            });
            state.clone()
        });

        if turn.speaker == Speaker::Agent {
            return Ok(AgentResult::skip(AgentType::Marketing, "agent turn recorded"));
        }

        let last_msg = turn.transcript.as_str();

        // Previous agent utterance, for classifier disambiguation.
        let context = state
            .turns
            .iter()
            .rev()
            .skip(1)
            .find(|t| t.speaker == Speaker::Agent)
            .map(|t| t.text.clone())
            .unwrap_or_default();

        let route = match self.gatekeeper.evaluate(last_msg, &context).await {
            GateOutcome::Block(reason) => {
                return Ok(AgentResult::skip(
                    AgentType::Marketing,
                    format!("gatekeeper block: {reason}"),
                ));
            }
            GateOutcome::Skip(reason) => {
                return Ok(AgentResult::skip(
                    AgentType::Marketing,
                    format!("gatekeeper skip: {reason}"),
                ));
            }
            GateOutcome::Proceed(route) => route,
        };

        let Some(analysis) = self.deep_analyze(&state, last_msg, &route).await else {
            // Analysis failure leaves the stage untouched.
            return Ok(AgentResult::skip(AgentType::Marketing, "analysis error"));
        };

        let step = transition(state.stage, &analysis, last_msg);
        tracing::info!(
            call_id = %call_id,
            from = ?state.stage,
            to = ?step.next_stage,
            marketing_type = ?step.marketing_type,
            "marketing state transition"
        );

        let state = self.checkpoints.update(call_id, |s| {
            s.stage = step.next_stage;
            s.marketing_type = step.marketing_type;
            s.clone()
        });

        if !step.needed {
            return Ok(AgentResult::skip(AgentType::Marketing, "no marketing opportunity"));
        }

        let query = Self::build_query(&state);
        let retrieved = nodes::retrieve(
            &self.search,
            &state,
            step.marketing_type,
            &analysis,
            &query,
            last_msg,
        )
        .await?;

        self.checkpoints.update(call_id, |s| {
            s.rejected_proposals = retrieved.rejected.clone();
        });

        let generated = nodes::generate(
            self.llm.as_ref(),
            &state,
            step.marketing_type,
            &retrieved,
            &analysis.reasoning,
        )
        .await;

        // A delivered pitch becomes the standing proposal and part of the
        // dialogue context for the next turn.
        self.checkpoints.update(call_id, |s| {
            if generated.marketing_type.requires_candidates() && !retrieved.candidates.is_empty() {
                s.current_proposal = retrieved.candidates.clone();
            }
            if !generated.script.is_empty() {
                s.turns.push(DialogueTurn::agent(generated.script.clone()));
            }
        });

        Ok(AgentResult {
            agent_type: AgentType::Marketing,
            next_step: NextStep::Generate,
            recommended_answer: Some(generated.script),
            work_guide: Some(format!(
                "Marketing Type: {:?} (Stage: {:?})",
                generated.marketing_type, step.next_stage
            )),
            reasoning: Some(generated.reasoning),
            marketing_type: Some(generated.marketing_type),
            proposal: generated.proposal,
        })
    }
}
