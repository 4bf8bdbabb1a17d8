use cp_domain::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request parameters
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Sampling parameters for a single chat call.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChatParams {
    /// Sampling temperature. `None` lets the endpoint choose.
    pub temperature: Option<f32>,
    /// Maximum tokens in the response. `None` lets the endpoint choose.
    pub max_tokens: Option<u32>,
}

impl ChatParams {
    pub fn temperature(t: f32) -> Self {
        Self {
            temperature: Some(t),
            max_tokens: None,
        }
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Core trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The seam between the pipelines and the model endpoint.
///
/// `chat_json` must return a parsed JSON object or an error, never raw
/// text, so every caller can index into the result directly. Recovery
/// (substring extraction, repair calls) is the implementation's job.
#[async_trait::async_trait]
pub trait ChatModel: Send + Sync {
    /// Plain-text completion (used for search-query generation).
    async fn chat_text(&self, system: &str, user: &str, params: ChatParams) -> Result<String>;

    /// Strict-JSON completion.
    async fn chat_json(&self, system: &str, user: &str, params: ChatParams) -> Result<Value>;

    /// The model name, for logging.
    fn model_id(&self) -> &str;
}

/// Run a JSON-mode call and deserialize the object into `T`.
pub async fn chat_structured<T: DeserializeOwned>(
    model: &dyn ChatModel,
    system: &str,
    user: &str,
    params: ChatParams,
) -> Result<T> {
    let value = model.chat_json(system, user, params).await?;
    serde_json::from_value(value).map_err(|e| Error::Llm {
        model: model.model_id().to_owned(),
        message: format!("structured output mismatch: {e}"),
    })
}
