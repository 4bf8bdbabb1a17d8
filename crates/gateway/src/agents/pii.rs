//! PII masking.
//!
//! Applied to every piece of dialogue before it is rendered into a
//! prompt. Rules cover Korean phone numbers, long digit runs, road
//! addresses, unit numbers, and name patterns around common honorifics.

use std::sync::OnceLock;

use regex::Regex;

struct Rule {
    pattern: Regex,
    replacement: &'static str,
}

fn rules() -> &'static Vec<Rule> {
    static RULES: OnceLock<Vec<Rule>> = OnceLock::new();
    RULES.get_or_init(|| {
        // Order matters: phone numbers must be masked before the bare
        // digit-run rule would swallow them.
        let table: &[(&str, &str)] = &[
            (r"\b01[0-9][- ]?\d{3,4}[- ]?\d{4}\b", "<PHONE>"),
            (r"\b\d{6,}\b", "<NUM>"),
            (r"[가-힣]{1,10}(?:로|길)\s*\d+[가-힣0-9\s\-]*", "<ADDRESS>"),
            (r"\b\d+\s*호\b", "<HO>"),
            (r"(성함이)\s*[가-힣]{2,4}", "$1 <NAME>"),
            (r"(상담사)\s*[가-힣]{2,4}", "$1 <NAME>"),
            (r"[가-힣]{2,4}\s*고객님", "<NAME> 고객님"),
        ];
        table
            .iter()
            .filter_map(|(pattern, replacement)| {
                match Regex::new(pattern) {
                    Ok(re) => Some(Rule {
                        pattern: re,
                        replacement,
                    }),
                    Err(e) => {
                        tracing::error!(pattern, error = %e, "PII rule failed to compile");
                        None
                    }
                }
            })
            .collect()
    })
}

/// Replace personally identifying fragments with placeholder tags.
pub fn mask_pii(text: &str) -> String {
    let mut out = text.to_owned();
    for rule in rules() {
        out = rule.pattern.replace_all(&out, rule.replacement).into_owned();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_phone_numbers() {
        assert_eq!(mask_pii("010-1234-5678로 연락주세요"), "<PHONE>로 연락주세요");
        assert_eq!(mask_pii("01012345678 입니다"), "<PHONE> 입니다");
    }

    #[test]
    fn masks_long_digit_runs() {
        assert_eq!(mask_pii("계약번호 9912345 입니다"), "계약번호 <NUM> 입니다");
    }

    #[test]
    fn keeps_short_numbers() {
        assert_eq!(mask_pii("5기가 요금제"), "5기가 요금제");
    }

    #[test]
    fn masks_addresses_and_units() {
        let masked = mask_pii("주소는 테헤란로 123 입니다");
        assert!(masked.contains("<ADDRESS>"), "{masked}");
        assert_eq!(mask_pii("302 호 입니다"), "<HO> 입니다");
    }

    #[test]
    fn masks_names_near_honorifics() {
        assert_eq!(mask_pii("성함이 김민수 맞으세요"), "성함이 <NAME> 맞으세요");
        assert_eq!(mask_pii("김민수 고객님 안녕하세요"), "<NAME> 고객님 안녕하세요");
    }

    #[test]
    fn empty_text_stays_empty() {
        assert_eq!(mask_pii(""), "");
    }
}
