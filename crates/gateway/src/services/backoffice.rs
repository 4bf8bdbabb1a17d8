//! Back-office HTTP adapters.
//!
//! Two thin JSON clients against the system of record: customer profile
//! lookup during the call and the end-of-call upload afterwards. Both are
//! timeout-bounded and swallow failures with a log entry; a directory
//! outage must never abort a live call.

use cp_domain::analysis::CallEndPayload;
use cp_domain::config::BackofficeConfig;
use cp_domain::customer::CustomerProfile;
use cp_domain::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Seams
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
pub trait ProfileDirectory: Send + Sync {
    /// Look up a customer by phone number. `None` covers both "unknown
    /// customer" (404) and transient failures; callers keep the
    /// placeholder profile either way.
    async fn fetch_profile(&self, phone_number: &str) -> Option<CustomerProfile>;
}

#[async_trait::async_trait]
pub trait CallArchive: Send + Sync {
    /// Persist the end-of-call payload. Failures are logged, not raised.
    async fn upload(&self, payload: &CallEndPayload);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// HTTP implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct BackofficeClient {
    base_url: String,
    api_key: Option<String>,
    profile_client: reqwest::Client,
    archive_client: reqwest::Client,
}

impl BackofficeClient {
    pub fn from_config(cfg: &BackofficeConfig) -> Result<Self> {
        let api_key = std::env::var(&cfg.api_key_env).ok();
        if api_key.is_none() {
            tracing::warn!(env = %cfg.api_key_env, "back-office API key not set");
        }
        let build = |secs: u64| {
            reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(secs))
                .build()
                .map_err(|e| Error::Http(e.to_string()))
        };
        Ok(Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
            profile_client: build(cfg.profile_timeout_sec)?,
            archive_client: build(cfg.archive_timeout_sec)?,
        })
    }

    fn with_key(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.header("X-API-KEY", key),
            None => req,
        }
    }
}

#[async_trait::async_trait]
impl ProfileDirectory for BackofficeClient {
    async fn fetch_profile(&self, phone_number: &str) -> Option<CustomerProfile> {
        let url = format!("{}/customers/search", self.base_url);
        let req = self
            .profile_client
            .get(&url)
            .query(&[("phoneNumber", phone_number)]);

        let resp = match self.with_key(req).send().await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::error!(error = %e, "customer profile fetch failed");
                return None;
            }
        };

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            tracing::warn!(phone_number = %phone_number, "customer not found");
            return None;
        }
        if !resp.status().is_success() {
            tracing::error!(status = %resp.status(), "customer profile fetch rejected");
            return None;
        }

        match resp.json::<CustomerProfile>().await {
            Ok(profile) => Some(profile),
            Err(e) => {
                tracing::error!(error = %e, "customer profile body malformed");
                None
            }
        }
    }
}

#[async_trait::async_trait]
impl CallArchive for BackofficeClient {
    async fn upload(&self, payload: &CallEndPayload) {
        let url = format!("{}/calls/end", self.base_url);
        let req = self.archive_client.post(&url).json(payload);

        match self.with_key(req).send().await {
            Ok(resp) if resp.status().is_success() => {
                tracing::info!(status = %resp.status(), "call data uploaded");
            }
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                tracing::error!(status = %status, body = %body, "call data upload rejected");
            }
            Err(e) => {
                tracing::error!(error = %e, "call data upload failed");
            }
        }
    }
}
