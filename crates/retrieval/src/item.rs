//! Retrieved documents and prompt-context rendering.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Character budget for a full evidence block.
const CONTEXT_MAX_CHARS: usize = 8_500;

/// Character budget for a single document inside the block.
const PER_DOC_CHARS: usize = 850;

/// One document returned by the vector store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedItem {
    pub doc_id: String,
    pub score: f64,
    pub content: String,
    /// Payload metadata: category, source, title, url, price_won…
    pub metadata: Value,
}

impl RetrievedItem {
    fn meta_str(&self, key: &str) -> &str {
        self.metadata.get(key).and_then(Value::as_str).unwrap_or("")
    }

    pub fn category(&self) -> &str {
        self.meta_str("category")
    }

    pub fn source(&self) -> &str {
        self.meta_str("source")
    }

    pub fn title(&self) -> &str {
        self.meta_str("title")
    }

    pub fn url(&self) -> &str {
        self.meta_str("url")
    }

    pub fn price_won(&self) -> Option<i64> {
        self.metadata.get("price_won").and_then(Value::as_i64)
    }

    /// Deduplication identity: `(source, title, content[:120])`.
    pub fn dedupe_key(&self) -> String {
        let head: String = self.content.chars().take(120).collect();
        format!("{}||{}||{}", self.source(), self.title(), head)
    }
}

/// Compact evidence reference kept alongside the rendered context so the
/// generator can cite `doc_id`s it was actually shown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evidence {
    pub doc_id: String,
    pub category: String,
    pub title: String,
    pub source: String,
    pub excerpt: String,
    pub score: f64,
}

/// Render retrieved items into a prompt block, stopping at the character
/// budget. Returns the block and the evidence list for the items included.
pub fn build_context(items: &[RetrievedItem]) -> (String, Vec<Evidence>) {
    let mut blocks = Vec::new();
    let mut evidence = Vec::new();
    let mut used = 0usize;

    for item in items {
        let text = collapse_blank_runs(item.content.trim());
        let text: String = text.chars().take(PER_DOC_CHARS).collect();
        let block = format!(
            "[{}]\n- category: {}\n- title: {}\n- source: {}\n- content:\n{}\n",
            item.doc_id,
            item.category(),
            item.title(),
            item.source(),
            text,
        );
        if used + block.len() > CONTEXT_MAX_CHARS {
            break;
        }
        used += block.len();
        blocks.push(block);
        evidence.push(Evidence {
            doc_id: item.doc_id.clone(),
            category: item.category().to_string(),
            title: item.title().to_string(),
            source: item.source().to_string(),
            excerpt: text.chars().take(240).collect(),
            score: item.score,
        });
    }

    (blocks.join("\n\n").trim().to_string(), evidence)
}

/// Collapse runs of 3+ newlines down to a paragraph break.
fn collapse_blank_runs(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut newlines = 0usize;
    for ch in text.chars() {
        if ch == '\n' {
            newlines += 1;
            if newlines <= 2 {
                out.push(ch);
            }
        } else {
            newlines = 0;
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn item(doc_id: &str, category: &str, title: &str, content: &str) -> RetrievedItem {
        RetrievedItem {
            doc_id: doc_id.into(),
            score: 0.5,
            content: content.into(),
            metadata: json!({"category": category, "title": title, "source": "unit"}),
        }
    }

    #[test]
    fn context_includes_doc_ids_and_categories() {
        let items = vec![
            item("DOC1", "terms", "해지 위약금", "위약금은 잔여 약정에 따라 산정된다."),
            item("DOC2", "guideline", "상담 가이드", "해지 문의 시 재약정 혜택을 안내한다."),
        ];
        let (context, evidence) = build_context(&items);
        assert!(context.contains("[DOC1]"));
        assert!(context.contains("- category: terms"));
        assert!(context.contains("[DOC2]"));
        assert_eq!(evidence.len(), 2);
        assert_eq!(evidence[0].doc_id, "DOC1");
    }

    #[test]
    fn context_respects_total_budget() {
        let long = "가".repeat(900);
        let items: Vec<_> = (0..20).map(|i| item(&format!("DOC{i}"), "terms", "t", &long)).collect();
        let (context, evidence) = build_context(&items);
        assert!(context.len() <= CONTEXT_MAX_CHARS * 3); // UTF-8: 가 is 3 bytes
        assert!(evidence.len() < items.len());
    }

    #[test]
    fn blank_runs_are_collapsed() {
        assert_eq!(collapse_blank_runs("a\n\n\n\nb"), "a\n\nb");
    }

    #[test]
    fn dedupe_key_truncates_content_at_120_chars() {
        let a = item("DOC1", "terms", "t", &"x".repeat(300));
        let b = item("DOC2", "terms", "t", &format!("{}{}", "x".repeat(120), "DIFFERENT TAIL"));
        assert_eq!(a.dedupe_key(), b.dedupe_key());
    }
}
