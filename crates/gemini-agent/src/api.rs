use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use gemini_core::{ApiKey, Config};
use serde_json::{json, Value};

use crate::error::ApiError;

/// Longest slice of an error body kept in [`ApiError::Status`].
const MAX_ERROR_BODY: usize = 500;

// ─── HostedBackend ────────────────────────────────────────────────────────

/// A hosted text-generation endpoint. The invoker only needs "prompt and
/// model in, text out"; tests substitute their own implementation.
pub trait HostedBackend: Send + Sync {
    fn generate<'a>(
        &'a self,
        prompt: &'a str,
        model: &'a str,
    ) -> BoxFuture<'a, Result<String, ApiError>>;
}

// ─── GenerativeLanguageClient ─────────────────────────────────────────────

/// `POST {base}/models/{model}:generateContent` over reqwest.
pub struct GenerativeLanguageClient {
    http: reqwest::Client,
    base_url: String,
    api_key: ApiKey,
}

impl GenerativeLanguageClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: ApiKey,
        request_timeout: Duration,
    ) -> Result<Self, ApiError> {
        if !api_key.is_plausible() {
            return Err(ApiError::MissingKey);
        }
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key,
        })
    }

    /// Build from configuration; fails when no usable key is configured.
    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        let key = config.usable_api_key().ok_or(ApiError::MissingKey)?;
        Self::new(
            config.api.base_url.clone(),
            key.clone(),
            Duration::from_secs(config.api.request_timeout_secs),
        )
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            model
        )
    }

    async fn generate_content(&self, prompt: &str, model: &str) -> Result<String, ApiError> {
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let response = self
            .http
            .post(self.endpoint(model))
            .header("x-goog-api-key", self.api_key.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: text.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        let value: Value =
            serde_json::from_str(&text).map_err(|e| ApiError::Malformed(e.to_string()))?;
        extract_text(&value)
    }
}

impl HostedBackend for GenerativeLanguageClient {
    fn generate<'a>(
        &'a self,
        prompt: &'a str,
        model: &'a str,
    ) -> BoxFuture<'a, Result<String, ApiError>> {
        self.generate_content(prompt, model).boxed()
    }
}

/// Concatenate `candidates[0].content.parts[*].text`.
pub(crate) fn extract_text(value: &Value) -> Result<String, ApiError> {
    let parts = value
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array);

    let Some(parts) = parts else {
        if let Some(reason) = value
            .pointer("/promptFeedback/blockReason")
            .and_then(Value::as_str)
        {
            return Err(ApiError::Blocked(reason.to_string()));
        }
        return Err(ApiError::EmptyResponse);
    };

    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();

    if text.is_empty() {
        Err(ApiError::EmptyResponse)
    } else {
        Ok(text)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────
