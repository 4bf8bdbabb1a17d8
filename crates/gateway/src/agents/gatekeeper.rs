//! Gatekeeper: tiered safety and intent filter.
//!
//! Tier 0 is pure regex (abusive language, sensitive topics, opportunity
//! keywords). Tier 1 is zero-cost heuristics on top of it. Tier 2 is a
//! fast-LLM JSON classifier, consulted only for utterances that survive
//! the cheap tiers, with decisions cached by normalized utterance. Any
//! LLM failure falls back to the regex result.

use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};

use cp_domain::error::{Error, Result};
use cp_providers::{ChatModel, ChatParams};

use crate::agents::cache::SemanticCache;

const CACHE_CAPACITY: usize = 1000;

/// Utterances shorter than this with no opportunity keyword are not
/// worth a classification call.
const MIN_ROUTE_CHARS: usize = 6;

const ABUSIVE_PATTERNS: &[&str] = &[
    "개새끼", "미친", "씨발", "닥쳐", "장난해", "임마", "자식", "새끼", "꺼져",
    "팀장", "상급자", "책임자", "소보원", "고발", "신고",
    "말귀", "몇 번을 말해", "안 산다", "짜증",
];

const SENSITIVE_PATTERNS: &[&str] = &[
    "사망", "별세", "장례", "독촉", "압류", "파산",
    "소송", "법적", "경찰", "병원", "응급실",
];

const OPPORTUNITY_PATTERNS: &[&str] = &[
    "요금", "할인", "약정", "만료", "바꾸", "변경",
    "인터넷", "데이터", "부족", "느려", "답답", "비싸",
    "해지", "탈퇴", "그만", "끊어", "다른",
];

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Results
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Tier-2 classification consumed by the marketing analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteDecision {
    #[serde(default)]
    pub intent: String,
    #[serde(default)]
    pub sentiment: String,
    #[serde(default)]
    pub marketing_opportunity: bool,
}

/// The gatekeeper's verdict for one customer utterance.
#[derive(Debug, Clone)]
pub enum GateOutcome {
    /// Unsafe context; the pipeline must not market on this turn.
    Block(String),
    /// Safe but not worth analyzing (too short, no trigger).
    Skip(String),
    /// Proceed; the decision is the analyzer's router hint.
    Proceed(RouteDecision),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Gatekeeper
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct Gatekeeper {
    abusive: Regex,
    sensitive: Regex,
    opportunity: Regex,
    fast_llm: Option<Arc<dyn ChatModel>>,
    cache: SemanticCache,
}

impl Gatekeeper {
    /// `fast_llm = None` runs regex-only classification (degraded mode).
    pub fn new(fast_llm: Option<Arc<dyn ChatModel>>) -> Result<Self> {
        let compile = |patterns: &[&str]| {
            Regex::new(&patterns.join("|"))
                .map_err(|e| Error::Config(format!("gatekeeper pattern: {e}")))
        };
        Ok(Self {
            abusive: compile(ABUSIVE_PATTERNS)?,
            sensitive: compile(SENSITIVE_PATTERNS)?,
            opportunity: compile(OPPORTUNITY_PATTERNS)?,
            fast_llm,
            cache: SemanticCache::new(CACHE_CAPACITY),
        })
    }

    // ── Tier 0: regex ──────────────────────────────────────────────

    /// `Err(reason)` means the utterance is unsafe for marketing.
    pub fn check_safety(&self, text: &str) -> std::result::Result<(), String> {
        if text.is_empty() {
            return Ok(());
        }
        if self.abusive.is_match(text) {
            return Err("abusive or escalating language".into());
        }
        if self.sensitive.is_match(text) {
            return Err("sensitive topic (legal/health/death)".into());
        }
        Ok(())
    }

    fn classify_topic(&self, text: &str) -> &'static str {
        if self.abusive.is_match(text) {
            "complaint"
        } else if self.opportunity.is_match(text) {
            "marketing"
        } else {
            "neutral"
        }
    }

    fn regex_decision(&self, text: &str) -> RouteDecision {
        let topic = self.classify_topic(text);
        RouteDecision {
            intent: topic.to_string(),
            sentiment: "neutral".into(),
            marketing_opportunity: topic == "marketing",
        }
    }

    // ── Tiered evaluation ──────────────────────────────────────────

    /// Full tiered pass over one customer utterance. `context` is the
    /// previous agent turn, given to the classifier for disambiguation.
    pub async fn evaluate(&self, text: &str, context: &str) -> GateOutcome {
        if let Err(reason) = self.check_safety(text) {
            tracing::info!(reason = %reason, "gatekeeper block");
            return GateOutcome::Block(reason);
        }

        let topic = self.classify_topic(text);
        if text.chars().count() < MIN_ROUTE_CHARS && topic != "marketing" {
            return GateOutcome::Skip("too short, no trigger keyword".into());
        }

        GateOutcome::Proceed(self.semantic_route(text, context).await)
    }

    /// Tier 2: fast-LLM classification with caching. Falls back to the
    /// regex decision when no client is configured or the call fails.
    pub async fn semantic_route(&self, text: &str, context: &str) -> RouteDecision {
        let Some(fast_llm) = &self.fast_llm else {
            return self.regex_decision(text);
        };

        if let Some(cached) = self.cache.get(text) {
            if let Ok(decision) = serde_json::from_value::<RouteDecision>(cached) {
                return decision;
            }
        }

        let prompt = format!(
            "Analyze this customer call transcript. Extract JSON: \
             {{\"intent\": \"marketing\"|\"support\"|\"complaint\"|\"neutral\", \
             \"sentiment\": \"positive\"|\"neutral\"|\"negative\"|\"furious\", \
             \"marketing_opportunity\": boolean}}.\n\
             Previous System Turn: \"{context}\"\n\
             Customer Input: \"{text}\"\n\
             CRITICAL RULES (Sniper Mode):\n\
             0. [RETENTION] If user mentions 'Cancel', 'Terminate', 'Unsubscribe' (해지, 탈퇴) \
             -> SET 'marketing_opportunity': true (Retention Opportunity).\n\
             1. [SOLVER] If complaint is about 'Price', 'Data Cap', or 'Slow Speed' (that can \
             be fixed by plan upgrade) -> SET 'marketing_opportunity': true.\n\
             2. [RESOLUTION] If customer says 'Fixed', 'Thanks', 'Solved' -> SET \
             'marketing_opportunity': true (Post-resolution Offer).\n\
             3. [SKIP] If problem is purely technical (Device broken, No Signal, WiFi setting, \
             Login failed) AND not resolved yet -> SET 'marketing_opportunity': false.\n\
             4. [SKIP] If customer is FURIOUS -> SET 'marketing_opportunity': false.\n\
             5. [INQUIRY] If customer asks about 'Plans', 'Discounts', 'Benefits', 'Join' \
             (가입, 결합, 할인) -> SET 'marketing_opportunity': true."
        );

        match fast_llm
            .chat_json(
                "You are a JSON classifier.",
                &prompt,
                ChatParams::temperature(0.0).with_max_tokens(100),
            )
            .await
        {
            Ok(value) => {
                self.cache.set(text, value.clone());
                serde_json::from_value(value).unwrap_or_else(|_| self.regex_decision(text))
            }
            Err(e) => {
                tracing::warn!(error = %e, "fast classifier failed, using regex fallback");
                self.regex_decision(text)
            }
        }
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache.hit_count()
    }
}
