use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Back office (profile directory + call archive)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Settings for the system-of-record HTTP service: customer profile
/// lookups during the call and the end-of-call upload afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackofficeConfig {
    #[serde(default = "d_base_url")]
    pub base_url: String,
    /// Environment variable holding the shared `X-API-KEY` value.
    #[serde(default = "d_api_key_env")]
    pub api_key_env: String,
    /// Timeout for profile lookups, in seconds.
    #[serde(default = "d_profile_timeout")]
    pub profile_timeout_sec: u64,
    /// Timeout for the end-of-call upload, in seconds.
    #[serde(default = "d_archive_timeout")]
    pub archive_timeout_sec: u64,
}

impl Default for BackofficeConfig {
    fn default() -> Self {
        Self {
            base_url: d_base_url(),
            api_key_env: d_api_key_env(),
            profile_timeout_sec: d_profile_timeout(),
            archive_timeout_sec: d_archive_timeout(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_base_url() -> String {
    "http://localhost:8080/api/v1".into()
}
fn d_api_key_env() -> String {
    "BACKOFFICE_API_KEY".into()
}
fn d_profile_timeout() -> u64 {
    5
}
fn d_archive_timeout() -> u64 {
    10
}
