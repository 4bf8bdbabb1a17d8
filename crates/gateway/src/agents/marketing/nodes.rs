//! Retrieve and generate nodes of the marketing pipeline.

use serde_json::{json, Value};

use cp_domain::agent::MarketingType;
use cp_domain::error::Result;
use cp_providers::{ChatModel, ChatParams};
use cp_retrieval::{build_context, RetrievedItem, SearchEngine, StagedQuery};

use super::prompts;
use super::state::{DeepAnalysis, MarketingState, ProductCandidate};
use crate::agents::render_dialogue;

/// Product candidates passed to generation, at most.
const MAX_CANDIDATES: usize = 4;

/// Price headroom allowed for `retention_price` offers.
const RETENTION_PRICE_BUFFER: f64 = 1.1;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Retrieve
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
pub struct RetrieveOutcome {
    pub context_text: String,
    pub candidates: Vec<ProductCandidate>,
    /// The rejection list after this node ran (it grows on pivots).
    pub rejected: Vec<String>,
    /// False when sticky context reused the standing proposal.
    pub searched: bool,
}

/// Price ceiling for product candidates, by strategy.
///
/// Strict cap (current fee) for pure cost saving and price-driven
/// pivots; 10% headroom when defending a price-motivated churn.
fn price_cap(
    mtype: MarketingType,
    monthly_fee: Option<i64>,
    price_driven_alternative: bool,
) -> Option<i64> {
    let fee = monthly_fee?;
    match mtype {
        MarketingType::CostOptimization => Some(fee),
        MarketingType::Alternative if price_driven_alternative => Some(fee),
        MarketingType::RetentionPrice => Some((fee as f64 * RETENTION_PRICE_BUFFER) as i64),
        _ => None,
    }
}

fn candidate_from_item(item: &RetrievedItem) -> ProductCandidate {
    ProductCandidate {
        product_id: item.doc_id.clone(),
        name: item.title().to_string(),
        price_text: item
            .price_won()
            .map(|p| format!("{p}원"))
            .unwrap_or_else(|| "가격 정보 없음".into()),
        price_won: item.price_won(),
        description: item.content.chars().take(200).collect(),
        benefits: item
            .metadata
            .get("summary")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
        url: item.url().to_string(),
    }
}

/// Run retrieval for one turn, honoring sticky context, the rejection
/// list, and the price constraint.
pub async fn retrieve(
    search: &SearchEngine,
    state: &MarketingState,
    mtype: MarketingType,
    analysis: &DeepAnalysis,
    query: &str,
    last_msg: &str,
) -> Result<RetrieveOutcome> {
    // Sticky context: a follow-up objection/question re-explains the
    // standing proposal; re-searching would desynchronize the pitch.
    if mtype == MarketingType::Explanation && !state.current_proposal.is_empty() {
        tracing::debug!(
            products = state.current_proposal.len(),
            "sticky context active, reusing current proposal"
        );
        return Ok(RetrieveOutcome {
            context_text: "(이전 제안 설명)".into(),
            candidates: state.current_proposal.clone(),
            rejected: state.rejected_proposals.clone(),
            searched: false,
        });
    }

    // Pivots implicitly reject whatever was on the table.
    let mut rejected = state.rejected_proposals.clone();
    if matches!(
        mtype,
        MarketingType::Alternative | MarketingType::RetentionPrice | MarketingType::CostOptimization
    ) {
        for candidate in &state.current_proposal {
            if !rejected.contains(&candidate.name) {
                rejected.push(candidate.name.clone());
            }
        }
    }

    let weights: Vec<(&str, f64)> = match mtype {
        MarketingType::Retention => vec![("marketing", 1.55), ("guideline", 1.2), ("terms", 1.05)],
        MarketingType::Upsell => vec![("marketing", 1.45), ("guideline", 1.15), ("terms", 1.0)],
        MarketingType::RetentionPrice | MarketingType::CostOptimization => {
            vec![("marketing", 1.6), ("guideline", 1.0), ("terms", 1.0)]
        }
        _ => vec![("marketing", 1.2), ("guideline", 1.1), ("terms", 1.0)],
    };

    let staged = StagedQuery::new(query)
        .final_k(8)
        .categories(["marketing", "guideline", "terms"])
        .weights(weights)
        .always_include([("terms", 2usize)]);
    let items = search.staged_category_search(&staged).await?;

    // Split: marketing documents are product candidates, the rest is
    // compliance/guidance evidence for the generator.
    let (products, evidence): (Vec<_>, Vec<_>) =
        items.into_iter().partition(|i| i.category() == "marketing");

    let price_driven_alternative = mtype == MarketingType::Alternative
        && (last_msg.contains("비싸")
            || last_msg.contains("가격")
            || last_msg.contains("요금")
            || analysis.objection_reason == "price");
    let max_price = price_cap(
        mtype,
        state.customer.as_ref().and_then(|c| c.monthly_fee_won),
        price_driven_alternative,
    );
    if let Some(cap) = max_price {
        tracing::debug!(cap, ?mtype, "price constraint active");
    }

    let candidates: Vec<ProductCandidate> = products
        .iter()
        .filter(|item| {
            let name = item.title();
            !rejected.iter().any(|r| !r.is_empty() && name.contains(r.as_str()))
        })
        .filter(|item| match (max_price, item.price_won()) {
            (Some(cap), Some(price)) => price <= cap,
            _ => true,
        })
        .take(MAX_CANDIDATES)
        .map(candidate_from_item)
        .collect();

    let (context_text, _evidence_refs) = build_context(&evidence);
    Ok(RetrieveOutcome {
        context_text,
        candidates,
        rejected,
        searched: true,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Generate
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
pub struct GenerateOutcome {
    pub script: String,
    pub marketing_type: MarketingType,
    pub reasoning: String,
    pub proposal: Option<Value>,
}

fn strategy_for(mtype: MarketingType) -> &'static str {
    match mtype {
        MarketingType::Upsell => prompts::STRATEGY_UPSELL,
        MarketingType::Retention => prompts::STRATEGY_RETENTION,
        MarketingType::RetentionPrice => prompts::STRATEGY_RETENTION_PRICE,
        MarketingType::CostOptimization => prompts::STRATEGY_COST_OPTIMIZATION,
        MarketingType::Explanation => prompts::STRATEGY_EXPLANATION,
        MarketingType::Alternative => prompts::STRATEGY_ALTERNATIVE,
        _ => prompts::STRATEGY_DEFAULT,
    }
}

/// Rule-based Before-vs-After card, used when the model pitched a
/// product but returned no proposal structure.
fn fallback_proposal(state: &MarketingState, best: &ProductCandidate) -> Value {
    let current_plan = state
        .customer
        .as_ref()
        .map(|c| c.rate_plan.clone())
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| "현재 요금제".into());
    let current_fee = state
        .customer
        .as_ref()
        .and_then(|c| c.monthly_fee_won)
        .map(|f| format!("{f}원"))
        .unwrap_or_else(|| "요금 확인 필요".into());

    json!({
        "card_title": format!("{} 제안", best.name),
        "comparison": {
            "before": {"label": "현재", "desc": current_plan, "price_text": current_fee},
            "after": {
                "label": "제안",
                "desc": best.name,
                "price_text": best.price_text,
                "highlight": true,
            },
        },
        "arrow_text": "스펙 업그레이드",
        "benefits": [if best.benefits.is_empty() { "상세 혜택" } else { best.benefits.as_str() }],
    })
}

/// Assemble the pitch prompt and call the model. Never fails upward:
/// generation errors degrade to a canned apology script.
pub async fn generate(
    llm: &dyn ChatModel,
    state: &MarketingState,
    mtype: MarketingType,
    retrieved: &RetrieveOutcome,
    analysis_reasoning: &str,
) -> GenerateOutcome {
    // No products to pitch with a pitch-type strategy: bail out with a
    // neutral clarifying sentence rather than hallucinating a product.
    if mtype.requires_candidates() && retrieved.candidates.is_empty() {
        tracing::info!(?mtype, "no product candidates, suppressing pitch");
        return GenerateOutcome {
            script: "고객님, 현재 고객님의 조건에 딱 맞는 추천 상품이 확인되지 않습니다. \
                     혹시 다른 불편한 점이 있으신가요?"
                .into(),
            marketing_type: MarketingType::None,
            reasoning: "조건에 맞는 상품 없음".into(),
            proposal: None,
        };
    }

    let customer_profile = state
        .customer
        .as_ref()
        .and_then(|c| serde_json::to_string(c).ok())
        .unwrap_or_else(|| "(고객 정보 없음)".into());
    let product_candidates =
        serde_json::to_string(&retrieved.candidates).unwrap_or_else(|_| "[]".into());

    let system = prompts::GENERATE_SYSTEM
        .replace("{customer_profile}", &customer_profile)
        .replace("{product_candidates}", &product_candidates)
        .replace("{dialogue}", &render_dialogue(&state.turns, 12))
        .replace(
            "{evidence}",
            if retrieved.context_text.is_empty() {
                "(근거 없음)"
            } else {
                &retrieved.context_text
            },
        );

    let user = format!(
        "{}\n\n[고객의 마케팅 니즈]\n{}\n\n[지시사항]\n위 정보를 바탕으로 마케팅 전략을 수행하라. \
         상품을 추천한다면 반드시 'marketing_proposal' 필드에 \"Before vs After\" 비교 정보를 채워라.",
        strategy_for(mtype),
        if analysis_reasoning.is_empty() {
            "분석 불가"
        } else {
            analysis_reasoning
        },
    );

    let value = match llm
        .chat_json(&system, &user, ChatParams::temperature(0.3).with_max_tokens(600))
        .await
    {
        Ok(value) => value,
        Err(e) => {
            tracing::error!(error = %e, "marketing generation failed");
            return GenerateOutcome {
                script: "죄송합니다. 잠시 시스템 확인 후 안내드리겠습니다.".into(),
                marketing_type: MarketingType::None,
                reasoning: "생성 실패".into(),
                proposal: None,
            };
        }
    };

    let script = value
        .get("recommended_pitch")
        .and_then(Value::as_str)
        .unwrap_or("")
        .trim()
        .to_string();
    let reasoning = value
        .get("reasoning")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    let marketing_type = value
        .get("marketing_type")
        .cloned()
        .and_then(|v| serde_json::from_value::<MarketingType>(v).ok())
        .unwrap_or(mtype);

    let mut proposal = value.get("marketing_proposal").cloned().filter(|p| !p.is_null());
    if proposal.is_none() {
        if let Some(best) = retrieved.candidates.first() {
            tracing::warn!(product = %best.name, "model returned no proposal, using rule-based card");
            proposal = Some(fallback_proposal(state, best));
        }
    }

    GenerateOutcome {
        script,
        marketing_type,
        reasoning,
        proposal,
    }
}
