use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM endpoint
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Settings for the OpenAI-compatible chat endpoint.
///
/// Two model names are configured: `model` carries the main generation
/// work (pipelines, end-of-call analysis); `fast_model` serves the
/// gatekeeper's low-latency classification tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "d_base_url")]
    pub base_url: String,
    /// Environment variable holding the bearer API key.
    #[serde(default = "d_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "d_model")]
    pub model: String,
    #[serde(default = "d_fast_model")]
    pub fast_model: String,
    /// Per-request timeout in seconds.
    #[serde(default = "d_timeout")]
    pub timeout_sec: u64,
    /// When true, a 4xx rejection of JSON mode falls back to plain text
    /// instead of erroring. Off by default: downstream parsing expects
    /// a JSON object.
    #[serde(default)]
    pub allow_plain_fallback: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: d_base_url(),
            api_key_env: d_api_key_env(),
            model: d_model(),
            fast_model: d_fast_model(),
            timeout_sec: d_timeout(),
            allow_plain_fallback: false,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn d_api_key_env() -> String {
    "LLM_API_KEY".into()
}
fn d_model() -> String {
    "gpt-4o-mini".into()
}
fn d_fast_model() -> String {
    "gpt-4o-mini".into()
}
fn d_timeout() -> u64 {
    60
}
