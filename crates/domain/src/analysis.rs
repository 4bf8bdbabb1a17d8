//! End-of-call analysis schemas.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::turn::TurnRecord;

/// Structured output of the end-of-call analysis LLM call.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CallAnalysis {
    pub summary_text: String,
    /// Estimated cost implied by the consultation, in won. 0 when none.
    #[serde(default)]
    pub estimated_cost: i64,
    /// Customer effort score, 0–10 (lower is better).
    #[serde(default)]
    pub ces_score: f64,
    /// Customer satisfaction, 0–100.
    #[serde(default)]
    pub csat_score: f64,
    /// Recommendation score, 0–10.
    #[serde(default)]
    pub rps_score: f64,
    #[serde(default)]
    pub keyword: Vec<String>,
    /// Count of abusive customer utterances.
    #[serde(default)]
    pub violence_count: i64,
}

/// Payload posted to the call archive when a call ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallEndPayload {
    pub transcripts: Vec<TurnRecord>,
    pub summary_text: String,
    pub estimated_cost: i64,
    pub ces_score: f64,
    pub csat_score: f64,
    pub rps_score: f64,
    pub keyword: Vec<String>,
    pub violence_count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: DateTime<Utc>,
    /// Call length in seconds.
    pub duration: i64,
    /// Billable seconds. Product convention: `round(0.7 × duration)`.
    pub billsec: i64,
}

/// Billable-seconds derivation. The 0.7 ratio is a product convention
/// that downstream consumers depend on; change it only with the billing
/// team's sign-off.
pub fn billsec_for(duration: i64) -> i64 {
    (duration as f64 * 0.7).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn billsec_is_seventy_percent_rounded() {
        assert_eq!(billsec_for(0), 0);
        assert_eq!(billsec_for(100), 70);
        assert_eq!(billsec_for(10), 7);
        // 0.7 * 121 = 84.7 -> 85
        assert_eq!(billsec_for(121), 85);
    }
}
