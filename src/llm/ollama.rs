// ABOUTME: Ollama provider backing the local engine (`model: "llm"`)
// ABOUTME: Talks to the native /api/chat endpoint with streaming disabled
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Ollama Provider
//!
//! Local inference through Ollama's native chat API. System instructions and
//! prior turns are sent as ordinary messages; `format: "json"` forces a JSON
//! body when the request asks for JSON mode.
//!
//! ## Configuration
//!
//! - `OLLAMA_API_URL` (or `LOCAL_LLM_BASE_URL`): server URL, default `http://localhost:11434`
//! - `LOCAL_LLM_MODEL`: model tag, default `mistral:7b-instruct`
//! - `LOCAL_LLM_TIMEOUT_SECS`: whole-request budget, default 300

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use super::{ChatMessage, ChatRequest, ChatResponse, LlmCapabilities, LlmProvider, TokenUsage};
use crate::config::OllamaConfig;
use crate::errors::{AppError, ErrorCode};

// ============================================================================
// API Request/Response Types
// ============================================================================

/// `/api/chat` request body
#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

/// Message in Ollama's wire format
#[derive(Debug, Serialize)]
struct OllamaMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> From<&'a ChatMessage> for OllamaMessage<'a> {
    fn from(msg: &'a ChatMessage) -> Self {
        Self {
            role: msg.role.as_str(),
            content: &msg.content,
        }
    }
}

/// Sampling options
#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

/// `/api/chat` response body (non-streaming)
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    model: Option<String>,
    message: Option<OllamaResponseMessage>,
    done_reason: Option<String>,
    prompt_eval_count: Option<u32>,
    eval_count: Option<u32>,
}

/// Assistant message inside a response
#[derive(Debug, Deserialize)]
struct OllamaResponseMessage {
    #[serde(default)]
    content: String,
}

/// Error body returned by Ollama
#[derive(Debug, Deserialize)]
struct OllamaErrorResponse {
    error: String,
}

// ============================================================================
// Provider Implementation
// ============================================================================

/// Ollama provider for the local engine
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    default_model: String,
}

impl OllamaProvider {
    /// Create a new provider from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: &OllamaConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {e}")))?;

        info!(
            "Initializing Ollama provider: base_url={}, model={}",
            config.base_url, config.model
        );

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            default_model: config.model.clone(),
        })
    }

    /// Build the API URL for a given endpoint
    fn api_url(&self, endpoint: &str) -> String {
        format!("{}/{endpoint}", self.base_url)
    }

    fn build_request<'a>(request: &'a ChatRequest, model: &'a str) -> OllamaChatRequest<'a> {
        let options = (request.temperature.is_some() || request.max_tokens.is_some()).then(|| {
            OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            }
        });

        OllamaChatRequest {
            model,
            messages: request.messages.iter().map(OllamaMessage::from).collect(),
            stream: false,
            format: request.json_mode.then_some("json"),
            options,
        }
    }

    /// Map a transport failure, calling out an unreachable server
    fn map_send_error(&self, e: &reqwest::Error) -> AppError {
        if e.is_connect() {
            AppError::new(
                ErrorCode::ExternalServiceUnavailable,
                format!(
                    "Ollama: Cannot connect to Ollama at {}. Is the server running?",
                    self.base_url
                ),
            )
        } else if e.is_timeout() {
            AppError::external_service("Ollama", format!("Request timed out: {e}"))
        } else {
            AppError::external_service("Ollama", format!("Failed to connect: {e}"))
        }
    }

    /// Parse error response from API
    fn parse_error_response(status: reqwest::StatusCode, body: &str) -> AppError {
        if let Ok(error_response) = serde_json::from_str::<OllamaErrorResponse>(body) {
            match status.as_u16() {
                404 => AppError::not_found(format!(
                    "Model or endpoint ({})",
                    error_response.error
                )),
                400 => AppError::invalid_input(format!(
                    "Ollama rejected the request: {}",
                    error_response.error
                )),
                _ => AppError::external_service(
                    "Ollama",
                    format!("API error ({status}): {}", error_response.error),
                ),
            }
        } else {
            match status.as_u16() {
                502..=504 => AppError::external_service(
                    "Ollama",
                    "Local LLM server is not responding. Is Ollama running?",
                ),
                _ => AppError::external_service(
                    "Ollama",
                    format!(
                        "API error ({status}): {}",
                        body.chars().take(200).collect::<String>()
                    ),
                ),
            }
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &'static str {
        "ollama"
    }

    fn display_name(&self) -> &'static str {
        "Ollama (Local)"
    }

    fn capabilities(&self) -> LlmCapabilities {
        LlmCapabilities::chat() | LlmCapabilities::JSON_MODE
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    #[instrument(skip(self, request), fields(model = %request.model.as_deref().unwrap_or(&self.default_model)))]
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, AppError> {
        let model = request.model.as_deref().unwrap_or(&self.default_model);
        let body = Self::build_request(request, model);

        debug!(
            messages = body.messages.len(),
            json_mode = request.json_mode,
            "Sending chat request to Ollama"
        );

        let response = self
            .client
            .post(self.api_url("api/chat"))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to send request to Ollama: {}", e);
                self.map_send_error(&e)
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            error!("Failed to read Ollama response: {}", e);
            AppError::external_service("Ollama", format!("Failed to read response: {e}"))
        })?;

        if !status.is_success() {
            return Err(Self::parse_error_response(status, &text));
        }

        let parsed: OllamaChatResponse = serde_json::from_str(&text).map_err(|e| {
            error!("Failed to parse Ollama response: {}", e);
            AppError::external_service("Ollama", format!("Failed to parse response: {e}"))
        })?;

        let content = parsed
            .message
            .map(|m| m.content)
            .ok_or_else(|| AppError::external_service("Ollama", "Response has no message"))?;

        debug!(
            "Received response from Ollama: {} chars, done_reason: {:?}",
            content.len(),
            parsed.done_reason
        );

        let usage = match (parsed.prompt_eval_count, parsed.eval_count) {
            (None, None) => None,
            (prompt, completion) => {
                let prompt_tokens = prompt.unwrap_or(0);
                let completion_tokens = completion.unwrap_or(0);
                Some(TokenUsage {
                    prompt_tokens,
                    completion_tokens,
                    total_tokens: prompt_tokens + completion_tokens,
                })
            }
        };

        Ok(ChatResponse {
            content,
            model: parsed.model.unwrap_or_else(|| model.to_owned()),
            usage,
            finish_reason: parsed.done_reason,
        })
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<bool, AppError> {
        debug!("Performing Ollama health check at {}", self.base_url);

        let response = self
            .client
            .get(self.api_url("api/tags"))
            .send()
            .await
            .map_err(|e| {
                error!("Ollama health check failed: {}", e);
                self.map_send_error(&e)
            })?;

        let healthy = response.status().is_success();
        if !healthy {
            warn!(
                "Ollama health check failed with status: {}",
                response.status()
            );
        }
        Ok(healthy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let request = ChatRequest::new(vec![
            ChatMessage::system("rules"),
            ChatMessage::user("Сколько транзакций?"),
        ])
        .with_temperature(0.0)
        .with_max_tokens(5000)
        .with_json_mode();
        let body = serde_json::to_value(OllamaProvider::build_request(&request, "mistral")).unwrap();
        assert_eq!(body["stream"], false);
        assert_eq!(body["format"], "json");
        assert_eq!(body["options"]["num_predict"], 5000);
        assert_eq!(body["messages"][0]["role"], "system");
    }

    #[test]
    fn test_plain_request_omits_format_and_options() {
        let request = ChatRequest::new(vec![ChatMessage::user("hi")]);
        let body = serde_json::to_value(OllamaProvider::build_request(&request, "m")).unwrap();
        assert!(body.get("format").is_none());
        assert!(body.get("options").is_none());
    }

    #[test]
    fn test_parse_error_response() {
        let error = OllamaProvider::parse_error_response(
            reqwest::StatusCode::NOT_FOUND,
            r#"{"error":"model 'llama9' not found"}"#,
        );
        assert_eq!(error.code, ErrorCode::ResourceNotFound);

        let error =
            OllamaProvider::parse_error_response(reqwest::StatusCode::BAD_GATEWAY, "<html>");
        assert_eq!(error.code, ErrorCode::ExternalServiceError);
    }
}
