use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

use docsight_types::{DocsightError, Result};

use crate::prompt::{system_prompt, user_prompt};
use crate::{GenerationConfig, GenerationRequest, TextGenerator};

// ---------------------------------------------------------------------------
// ChatCompletionsGenerator
// ---------------------------------------------------------------------------

/// Generator backed by an OpenAI-compatible `/v1/chat/completions` endpoint.
#[derive(Debug)]
pub struct ChatCompletionsGenerator {
    api_key: String,
    client: reqwest::Client,
    config: GenerationConfig,
}

impl ChatCompletionsGenerator {
    pub fn new(api_key: String, config: GenerationConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DocsightError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            api_key,
            client,
            config,
        })
    }

    /// Read the key from `DOCSIGHT_API_KEY`, falling back to `OPENAI_API_KEY`.
    pub fn from_env(config: GenerationConfig) -> Result<Self> {
        let key = std::env::var("DOCSIGHT_API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .map_err(|_| DocsightError::AuthError {
                provider: config.provider.clone(),
            })?;
        Self::new(key, config.with_env_overrides())
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    fn build_request_body(&self, request: &GenerationRequest) -> serde_json::Value {
        json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": system_prompt(&request.system_message) },
                { "role": "user", "content": user_prompt(&request.prompt, &request.context) },
            ],
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        })
    }

    fn parse_response(&self, body: &serde_json::Value) -> Result<String> {
        body["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.trim().to_string())
            .ok_or_else(|| DocsightError::ProviderError {
                provider: self.config.provider.clone(),
                status: 200,
                message: "response has no choices[0].message.content".into(),
                retryable: false,
            })
    }

    fn transport_error(&self, err: reqwest::Error) -> DocsightError {
        if err.is_timeout() {
            DocsightError::RequestTimeout {
                provider: self.config.provider.clone(),
                timeout_ms: self.config.timeout_secs * 1000,
            }
        } else {
            DocsightError::ProviderError {
                provider: self.config.provider.clone(),
                status: 0,
                message: err.to_string(),
                retryable: true,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

fn map_error(provider: &str, status: reqwest::StatusCode, body: &str) -> DocsightError {
    let status_u16 = status.as_u16();
    match status_u16 {
        429 => {
            let retry_ms = serde_json::from_str::<serde_json::Value>(body)
                .ok()
                .and_then(|v| v["error"]["retry_after"].as_f64())
                .map(|s| (s * 1000.0) as u64)
                .unwrap_or(1000);
            DocsightError::RateLimited {
                provider: provider.into(),
                retry_after_ms: retry_ms,
            }
        }
        401 | 403 => DocsightError::AuthError {
            provider: provider.into(),
        },
        500 | 502 | 503 | 504 => DocsightError::ProviderError {
            provider: provider.into(),
            status: status_u16,
            message: extract_error_message(body),
            retryable: true,
        },
        _ => DocsightError::ProviderError {
            provider: provider.into(),
            status: status_u16,
            message: extract_error_message(body),
            retryable: false,
        },
    }
}

fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(String::from))
        .unwrap_or_else(|| body.to_string())
}

// ---------------------------------------------------------------------------
// TextGenerator implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl TextGenerator for ChatCompletionsGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let body = self.build_request_body(request);
        let url = format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        tracing::debug!(model = %self.config.model, %url, "Sending chat completion");

        let resp = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        let response_body = resp.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(map_error(&self.config.provider, status, &response_body));
        }

        let json: serde_json::Value =
            serde_json::from_str(&response_body).map_err(|e| DocsightError::ProviderError {
                provider: self.config.provider.clone(),
                status: status.as_u16(),
                message: format!("Failed to parse response JSON: {e}"),
                retryable: false,
            })?;

        self.parse_response(&json)
    }

    fn name(&self) -> &str {
        &self.config.provider
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
