//! Result types exchanged between the orchestrator and agent pipelines.

use serde::{Deserialize, Serialize};

/// Which pipeline produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentType {
    Guidance,
    Marketing,
}

/// What an agent decided to do with a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NextStep {
    Retrieve,
    Generate,
    Skip,
}

/// Marketing generation strategy selected by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MarketingType {
    #[default]
    None,
    Upsell,
    Retention,
    RetentionPrice,
    CostOptimization,
    Hybrid,
    Explanation,
    Alternative,
}

impl MarketingType {
    /// Types whose generation step pitches concrete products and
    /// therefore requires non-empty candidates.
    pub fn requires_candidates(&self) -> bool {
        matches!(
            self,
            MarketingType::Upsell
                | MarketingType::Retention
                | MarketingType::RetentionPrice
                | MarketingType::CostOptimization
                | MarketingType::Alternative
        )
    }
}

/// Marketing conversation stage. `Listening` is initial, `Closing` terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStage {
    #[default]
    Listening,
    Proposing,
    Negotiating,
    Closing,
}

/// The record an agent hands back to the orchestrator for one turn.
///
/// `next_step = Skip` results are filtered before reaching monitors; a
/// handler that has nothing to say returns [`AgentResult::skip`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResult {
    pub agent_type: AgentType,
    pub next_step: NextStep,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommended_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_guide: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marketing_type: Option<MarketingType>,
    /// Before-vs-After proposal card for the operator console.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposal: Option<serde_json::Value>,
}

impl AgentResult {
    pub fn skip(agent_type: AgentType, reasoning: impl Into<String>) -> Self {
        Self {
            agent_type,
            next_step: NextStep::Skip,
            recommended_answer: None,
            work_guide: None,
            reasoning: Some(reasoning.into()),
            marketing_type: None,
            proposal: None,
        }
    }
}
