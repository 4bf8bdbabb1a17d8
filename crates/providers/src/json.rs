//! JSON extraction from model output.
//!
//! Models occasionally wrap their object in markdown fences or prose even
//! in JSON mode. Parse order: direct parse, then the substring between
//! the first `{` and the last `}`. Anything beyond that is the caller's
//! repair pass.

use cp_domain::error::{Error, Result};
use serde_json::Value;

/// Remove a leading/trailing markdown code fence, if present.
pub fn strip_code_fences(text: &str) -> &str {
    let t = text.trim();
    let Some(rest) = t.strip_prefix("```") else {
        return t;
    };
    // Skip the language tag on the opening fence line.
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.trim_end().trim_end_matches("```").trim()
}

/// Extract a JSON object from model output.
pub fn extract_json(text: &str) -> Result<Value> {
    let text = strip_code_fences(text);

    if let Ok(v) = serde_json::from_str::<Value>(text) {
        if v.is_object() {
            return Ok(v);
        }
    }

    let start = text.find('{');
    let end = text.rfind('}');
    if let (Some(s), Some(e)) = (start, end) {
        if e > s {
            if let Ok(v) = serde_json::from_str::<Value>(&text[s..=e]) {
                return Ok(v);
            }
        }
    }

    Err(Error::Other(format!(
        "JSON parse failed (first 120 chars: {:?})",
        text.chars().take(120).collect::<String>()
    )))
}
