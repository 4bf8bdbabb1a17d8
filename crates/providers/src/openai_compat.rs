//! OpenAI-compatible adapter.
//!
//! Works with OpenAI, Azure-style gateways, vLLM and any other endpoint
//! following the chat-completions contract. JSON-mode calls implement the
//! full recovery ladder:
//!
//! 1. request with `response_format = json_object`
//! 2. 4xx rejecting JSON mode → error, or plain retry when
//!    `allow_plain_fallback` is set
//! 3. `finish_reason = length` → one retry with a compact-output
//!    instruction and doubled (capped) `max_tokens`
//! 4. parse → brace-substring → one repair call requesting the same schema

use cp_domain::config::LlmConfig;
use cp_domain::error::{Error, Result};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::json::extract_json;
use crate::traits::{ChatModel, ChatParams};

/// Default output budget for JSON-mode calls when the caller does not set one.
const DEFAULT_JSON_MAX_TOKENS: u32 = 1400;

/// Hard cap for the doubled budget on length and repair retries.
const RETRY_TOKEN_CAP: u32 = 3200;

const COMPACT_INSTRUCTION: &str = "직전 출력이 길이 제한으로 잘렸다. 스키마/키 구조는 절대 바꾸지 말고, \
     각 문자열/리스트를 더 짧게 요약해서 JSON 단일 객체로 다시 출력하라.";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct OpenAiCompatClient {
    base_url: String,
    api_key: String,
    model: String,
    allow_plain_fallback: bool,
    client: reqwest::Client,
}

impl OpenAiCompatClient {
    /// Build a client for `model` from the shared LLM config.
    ///
    /// The API key is read once from the configured env var; the main and
    /// fast tiers are separate instances sharing the same credentials.
    pub fn from_config(cfg: &LlmConfig, model: impl Into<String>) -> Result<Self> {
        let api_key = std::env::var(&cfg.api_key_env)
            .map_err(|_| Error::Config(format!("LLM env missing: {}", cfg.api_key_env)))?;
        Self::new(
            &cfg.base_url,
            api_key,
            model,
            std::time::Duration::from_secs(cfg.timeout_sec),
            cfg.allow_plain_fallback,
        )
    }

    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: std::time::Duration,
        allow_plain_fallback: bool,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            allow_plain_fallback,
            client,
        })
    }

    // ── Internal: request plumbing ─────────────────────────────────

    fn chat_body(
        &self,
        system: &str,
        user: &str,
        temperature: Option<f32>,
        max_tokens: Option<u32>,
    ) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
        });
        if let Some(t) = temperature {
            body["temperature"] = json!(t);
        }
        if let Some(max) = max_tokens {
            body["max_tokens"] = json!(max);
        }
        body
    }

    async fn post_completion(&self, body: &Value) -> Result<reqwest::Response> {
        self.client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(format!("chat/completions ({})", self.model))
                } else {
                    Error::Http(e.to_string())
                }
            })
    }

    /// Read the first choice's content and finish_reason, surfacing
    /// non-2xx statuses as errors.
    async fn read_choice(&self, resp: reqwest::Response) -> Result<(String, Option<String>)> {
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::Llm {
                model: self.model.clone(),
                message: format!("HTTP {status}: {}", snippet(&text, 300)),
            });
        }
        let completion: ChatCompletion = resp.json().await.map_err(|e| Error::Llm {
            model: self.model.clone(),
            message: format!("malformed completion body: {e}"),
        })?;
        let choice = completion.choices.into_iter().next().ok_or_else(|| Error::Llm {
            model: self.model.clone(),
            message: "completion contained no choices".into(),
        })?;
        let content = choice.message.content.unwrap_or_default().trim().to_string();
        Ok((content, choice.finish_reason))
    }

    /// One repair call: feed the unparseable output back and request the
    /// same schema as a bare JSON object. Failure here is final.
    async fn repair_json(&self, system: &str, broken: &str, max_tokens: u32) -> Result<Value> {
        tracing::warn!(model = %self.model, "JSON parse failed, attempting repair call");

        let shown: String = broken.chars().take(6000).collect();
        let repair_prompt = format!(
            "직전 출력이 JSON 파싱에 실패했다. 오직 JSON 단일 객체만, 스키마 그대로 재출력하라.\n\
             다른 텍스트/마크다운/설명 금지.\n\
             문자열 내 따옴표/개행은 JSON 규칙에 맞게 이스케이프하라.\n\n\
             직전 출력(일부):\n{shown}"
        );

        let mut body = self.chat_body(
            system,
            &repair_prompt,
            Some(0.0),
            Some((max_tokens * 2).min(RETRY_TOKEN_CAP)),
        );
        body["response_format"] = json!({"type": "json_object"});

        let mut resp = self.post_completion(&body).await?;
        if resp.status().is_client_error() && self.allow_plain_fallback {
            if let Some(obj) = body.as_object_mut() {
                obj.remove("response_format");
            }
            resp = self.post_completion(&body).await?;
        }

        let (content, _) = self.read_choice(resp).await?;
        extract_json(&content)
    }
}

#[async_trait::async_trait]
impl ChatModel for OpenAiCompatClient {
    async fn chat_text(&self, system: &str, user: &str, params: ChatParams) -> Result<String> {
        let body = self.chat_body(system, user, params.temperature, params.max_tokens);
        let resp = self.post_completion(&body).await?;
        let (content, _) = self.read_choice(resp).await?;
        Ok(content)
    }

    async fn chat_json(&self, system: &str, user: &str, params: ChatParams) -> Result<Value> {
        let max_tokens = params.max_tokens.unwrap_or(DEFAULT_JSON_MAX_TOKENS);

        let mut body = self.chat_body(system, user, params.temperature, Some(max_tokens));
        body["response_format"] = json!({"type": "json_object"});

        let resp = self.post_completion(&body).await?;
        let resp = if resp.status().is_client_error() {
            if self.allow_plain_fallback {
                tracing::warn!(
                    model = %self.model,
                    status = %resp.status(),
                    "JSON mode rejected, retrying as plain text"
                );
                let plain = self.chat_body(system, user, params.temperature, Some(max_tokens));
                self.post_completion(&plain).await?
            } else {
                let status = resp.status();
                let text = resp.text().await.unwrap_or_default();
                return Err(Error::Llm {
                    model: self.model.clone(),
                    message: format!(
                        "JSON mode rejected (HTTP {status}): {}. Use a model that supports \
                         response_format=json_object, or set llm.allow_plain_fallback",
                        snippet(&text, 300)
                    ),
                });
            }
        } else {
            resp
        };

        let (mut content, finish_reason) = self.read_choice(resp).await?;

        // Truncated by the token budget: one retry with a compact-output
        // instruction and a doubled (capped) budget.
        if finish_reason.as_deref() == Some("length") {
            tracing::debug!(model = %self.model, "completion truncated, retrying compact");
            let retry_user = format!("{user}\n\n[추가 지시]\n{COMPACT_INSTRUCTION}");
            let mut retry = self.chat_body(
                system,
                &retry_user,
                Some(0.0),
                Some((max_tokens * 2).min(RETRY_TOKEN_CAP)),
            );
            retry["response_format"] = json!({"type": "json_object"});
            let resp = self.post_completion(&retry).await?;
            (content, _) = self.read_choice(resp).await?;
        }

        match extract_json(&content) {
            Ok(v) => Ok(v),
            Err(_) => self.repair_json(system, &content, max_tokens).await,
        }
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Wire types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

fn snippet(text: &str, max: usize) -> String {
    let mut s: String = text.chars().take(max).collect();
    if text.chars().count() > max {
        s.push('…');
    }
    s
}
