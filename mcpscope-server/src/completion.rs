// mcpscope-server/src/completion.rs
//
// Anthropic Messages API client used for URL analysis. One request, one
// reply; failures are classified into `ServiceError` kinds and never retried.

use crate::config::CompletionSettings;
use crate::error::ServiceError;
use crate::traits::CompletionBackend;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use tracing::{debug, info};

/// Current Anthropic API version header value.
const API_VERSION: &str = "2023-06-01";

const SYSTEM_PROMPT: &str =
    "You are an expert API analyst. You answer with a single JSON object and no other text.";

// -- Messages API request/response types --

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    system: &'a str,
    messages: Vec<ApiMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

// Non-text blocks (tool_use, thinking, ...) are skipped.
#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}

pub struct AnthropicBackend {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
    max_tokens: u32,
    temperature: f64,
}

impl AnthropicBackend {
    /// Fails with a configuration error when no API key is set.
    pub fn new(settings: &CompletionSettings) -> Result<Self, ServiceError> {
        let api_key = settings
            .api_key
            .clone()
            .ok_or_else(|| ServiceError::Configuration("completion API key is not set".to_string()))?;

        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| ServiceError::Configuration(format!("could not build HTTP client: {}", e)))?;

        Ok(AnthropicBackend {
            client,
            api_key,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
        })
    }

    async fn send(&self, prompt: &str) -> Result<String, ServiceError> {
        let url = format!("{}/v1/messages", self.api_base);
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system: SYSTEM_PROMPT,
            messages: vec![ApiMessage { role: "user", content: prompt }],
        };

        debug!("POST {} (model {}, {} prompt chars)", url, self.model, prompt.len());
        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ServiceError::Transport(format!("completion request timed out: {}", e))
                } else {
                    ServiceError::Transport(format!("completion request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, &body));
        }

        let reply: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Model(format!("malformed completion reply: {}", e)))?;

        let text = reply
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .and_then(|block| block.text)
            .ok_or_else(|| ServiceError::Model("completion reply contained no text".to_string()))?;

        info!("Received completion ({} chars)", text.len());
        Ok(text)
    }
}

/// Map a non-success HTTP status from the completion API onto an error kind.
fn classify_failure(status: StatusCode, body: &str) -> ServiceError {
    let detail = serde_json::from_str::<ApiErrorResponse>(body)
        .map(|e| format!("{} ({})", e.error.message, e.error.error_type))
        .unwrap_or_else(|_| format!("HTTP {}: {}", status, body.chars().take(200).collect::<String>()));

    match status.as_u16() {
        401 | 403 => ServiceError::Authentication(detail),
        429 => ServiceError::RateLimit(detail),
        408 | 500..=599 => ServiceError::Transport(detail),
        _ => ServiceError::Model(detail),
    }
}

impl CompletionBackend for AnthropicBackend {
    fn complete<'a>(&'a self, prompt: &'a str)
        -> Pin<Box<dyn Future<Output = Result<String, ServiceError>> + Send + 'a>> {
        Box::pin(self.send(prompt))
    }

    fn model(&self) -> &str {
        &self.model
    }
}
