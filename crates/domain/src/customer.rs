//! Customer profile as returned by the back-office directory.
//!
//! The upstream service exposes Korean column names; serde aliases map
//! them onto the field names used throughout the pipelines.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CustomerProfile {
    #[serde(alias = "고객 ID", default)]
    pub customer_id: String,
    #[serde(alias = "이름", default)]
    pub name: String,
    #[serde(alias = "전화번호", default)]
    pub phone_number: String,
    #[serde(alias = "요금제명", default)]
    pub rate_plan: String,
    #[serde(alias = "인터넷상품명", default)]
    pub internet_product: Option<String>,
    #[serde(alias = "IPTV 상품 명", default)]
    pub iptv_product: Option<String>,
    #[serde(alias = "결합상품명", default)]
    pub combination_product: Option<String>,
    #[serde(alias = "월 기본료", default)]
    pub monthly_fee_won: Option<i64>,
    #[serde(alias = "약정기간", default)]
    pub contract_months: Option<i32>,
    #[serde(alias = "잔여개월", default)]
    pub remaining_months: Option<i32>,
    #[serde(alias = "선택약정(Y/N)", default)]
    pub optional_contract: Option<String>,
    #[serde(alias = "초과 요금 발생 여부(1개월 전)", default)]
    pub overcharge_1_month_ago: Option<String>,
    #[serde(alias = "초과 요금 발생 여부(2개월 전)", default)]
    pub overcharge_2_months_ago: Option<String>,
    #[serde(alias = "데이터 이월 여부(Y/N)", default)]
    pub data_carryover: Option<String>,
    #[serde(alias = "쉐어링 사용 여부(Y/N)", default)]
    pub data_sharing: Option<String>,
    #[serde(alias = "1인가구/가족 가구", default)]
    pub household_type: Option<String>,
    #[serde(alias = "재택 근무", default)]
    pub remote_work: Option<String>,
}

impl CustomerProfile {
    /// Placeholder profile used until the directory lookup resolves.
    pub fn unknown() -> Self {
        Self {
            customer_id: "UNKNOWN".into(),
            name: "알 수 없음".into(),
            rate_plan: "Basic".into(),
            ..Self::default()
        }
    }

    fn is_yes(v: &Option<String>) -> bool {
        v.as_deref()
            .map(|s| s.trim().eq_ignore_ascii_case("y"))
            .unwrap_or(false)
    }

    /// Opportunity signals derived from the structured profile.
    ///
    /// These feed the marketing analyzer's prompt alongside the dialogue,
    /// so each entry is a short Korean phrase the model can quote.
    pub fn signals(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.remaining_months.map(|m| m <= 1).unwrap_or(false) {
            out.push("약정 만료 임박(재약정/요금 최적화/이탈 방어 기회)".to_string());
        }
        if Self::is_yes(&self.overcharge_1_month_ago) || Self::is_yes(&self.overcharge_2_months_ago)
        {
            out.push("최근 초과요금 발생(상향/옵션/무제한 제안 기회)".to_string());
        }
        if self
            .internet_product
            .as_deref()
            .map(|s| !s.trim().is_empty())
            .unwrap_or(false)
        {
            out.push("인터넷 결합 보유/가능(결합 할인/재결합/상향 여지)".to_string());
        }
        if self
            .household_type
            .as_deref()
            .map(|s| s.contains("가족"))
            .unwrap_or(false)
        {
            out.push("가족 가구(가족결합/공유데이터/추가회선 여지)".to_string());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_korean_aliases() {
        let raw = serde_json::json!({
            "고객 ID": "C-001",
            "이름": "김민수",
            "전화번호": "010-1234-5678",
            "요금제명": "5G 스탠다드",
            "월 기본료": 55000,
            "잔여개월": 1,
        });
        let profile: CustomerProfile = serde_json::from_value(raw).unwrap();
        assert_eq!(profile.customer_id, "C-001");
        assert_eq!(profile.monthly_fee_won, Some(55_000));
        assert_eq!(profile.remaining_months, Some(1));
    }

    #[test]
    fn signals_flag_expiring_contract_and_overage() {
        let profile = CustomerProfile {
            remaining_months: Some(0),
            overcharge_1_month_ago: Some("Y".into()),
            ..CustomerProfile::default()
        };
        let signals = profile.signals();
        assert_eq!(signals.len(), 2);
        assert!(signals[0].contains("약정 만료"));
        assert!(signals[1].contains("초과요금"));
    }

    #[test]
    fn signals_empty_for_plain_profile() {
        assert!(CustomerProfile::default().signals().is_empty());
    }
}
