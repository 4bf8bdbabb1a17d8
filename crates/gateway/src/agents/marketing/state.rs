//! Marketing conversation state and the stage-transition table.

use serde::{Deserialize, Serialize};

use cp_domain::agent::{ConversationStage, MarketingType};
use cp_domain::customer::CustomerProfile;
use cp_domain::turn::DialogueTurn;

/// A product candidate on the table, distilled from a `marketing`
/// category document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductCandidate {
    pub product_id: String,
    pub name: String,
    pub price_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_won: Option<i64>,
    pub description: String,
    #[serde(default)]
    pub benefits: String,
    #[serde(default)]
    pub url: String,
}

/// Checkpointed per-call state.
#[derive(Debug, Clone, Default)]
pub struct MarketingState {
    pub turns: Vec<DialogueTurn>,
    pub stage: ConversationStage,
    pub marketing_type: MarketingType,
    /// Products currently pitched; reused verbatim for follow-up
    /// objections/questions (sticky context).
    pub current_proposal: Vec<ProductCandidate>,
    /// Product names the customer has turned down. Retrieval never
    /// returns a match for these again within the call.
    pub rejected_proposals: Vec<String>,
    pub customer: Option<CustomerProfile>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Deep-analysis output
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Marketing,
    Support,
    Complaint,
    Neutral,
    Objection,
    Question,
    Alternative,
    Churn,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeepAnalysis {
    #[serde(default)]
    pub marketing_opportunity: bool,
    #[serde(default = "d_neutral_intent")]
    pub intent: Intent,
    #[serde(default)]
    pub sentiment: String,
    #[serde(default = "d_unknown")]
    pub churn_reason: String,
    #[serde(default = "d_unknown")]
    pub objection_reason: String,
    #[serde(default)]
    pub reasoning: String,
}

fn d_neutral_intent() -> Intent {
    Intent::Neutral
}
fn d_unknown() -> String {
    "unknown".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Transition table
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next_stage: ConversationStage,
    pub marketing_type: MarketingType,
    pub needed: bool,
}

impl Transition {
    fn stay(stage: ConversationStage) -> Self {
        Self {
            next_stage: stage,
            marketing_type: MarketingType::None,
            needed: false,
        }
    }

    fn to(next_stage: ConversationStage, marketing_type: MarketingType) -> Self {
        Self {
            next_stage,
            marketing_type,
            needed: true,
        }
    }
}

/// "Show me something else" phrasings that force the alternative branch
/// even when the classifier labeled the turn as a question.
pub fn wants_alternative(text: &str) -> bool {
    ["다른", "딴거", "그거 말고", "제외하고"]
        .iter()
        .any(|kw| text.contains(kw))
}

/// The marketing stage machine. `last_msg` carries the keyword
/// heuristics that override the classifier on churn/price/alternative.
pub fn transition(
    stage: ConversationStage,
    analysis: &DeepAnalysis,
    last_msg: &str,
) -> Transition {
    use ConversationStage::*;
    use MarketingType::*;

    match stage {
        Listening => {
            if !analysis.marketing_opportunity {
                return Transition::stay(Listening);
            }
            let churn_intent = last_msg.contains("해지")
                || last_msg.contains("탈퇴")
                || analysis.intent == Intent::Churn;
            let price_sensitive = analysis.churn_reason == "price"
                || analysis.objection_reason == "price"
                || last_msg.contains("싸")
                || last_msg.contains("저렴");

            if churn_intent {
                if analysis.churn_reason == "quality" {
                    Transition::to(Proposing, Retention)
                } else {
                    Transition::to(Proposing, RetentionPrice)
                }
            } else if price_sensitive {
                Transition::to(Proposing, CostOptimization)
            } else {
                Transition::to(Proposing, Upsell)
            }
        }

        Proposing => match analysis.intent {
            Intent::Objection if analysis.objection_reason == "price" => {
                Transition::to(Proposing, CostOptimization)
            }
            Intent::Objection | Intent::Question => {
                if wants_alternative(last_msg) {
                    Transition::to(Proposing, Alternative)
                } else {
                    Transition::to(Negotiating, Explanation)
                }
            }
            Intent::Alternative => Transition::to(Proposing, Alternative),
            Intent::Neutral if !analysis.marketing_opportunity => {
                if wants_alternative(last_msg) {
                    Transition::to(Proposing, Alternative)
                } else {
                    Transition::stay(Listening)
                }
            }
            _ if analysis.marketing_opportunity => Transition::to(Proposing, Upsell),
            _ => Transition::stay(Proposing),
        },

        Negotiating => match analysis.intent {
            Intent::Alternative => Transition::to(Proposing, Alternative),
            Intent::Objection | Intent::Question => Transition::to(Negotiating, Explanation),
            Intent::Marketing => Transition::to(Closing, Hybrid),
            _ => Transition::stay(Negotiating),
        },

        Closing => Transition::stay(Closing),
    }
}
