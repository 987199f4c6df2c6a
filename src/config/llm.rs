// ABOUTME: LLM engine configuration for the cloud (Gemini) and local (Ollama) backends
// ABOUTME: Reads credentials, endpoints, and model names from the environment
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fmt::{Debug, Formatter, Result as FmtResult};

use super::{env_parse_or, env_var_opt, env_var_or};
use crate::errors::AppResult;

/// Default Gemini API base URL
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default Gemini model
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

/// Default Ollama endpoint
pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// Default local model
pub const DEFAULT_OLLAMA_MODEL: &str = "mistral:7b-instruct";

/// Settings for both engines
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    /// Cloud engine (`model: "api"`)
    pub gemini: GeminiConfig,
    /// Local engine (`model: "llm"`)
    pub ollama: OllamaConfig,
}

impl LlmConfig {
    /// Load both engine configurations from environment
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric timeout is malformed.
    pub fn from_env() -> AppResult<Self> {
        Ok(Self {
            gemini: GeminiConfig::from_env()?,
            ollama: OllamaConfig::from_env()?,
        })
    }
}

/// Gemini (`generateContent`) configuration
#[derive(Clone)]
pub struct GeminiConfig {
    /// API key (`GEMINI_API_KEY`, falling back to `LLM_API_KEY`)
    pub api_key: Option<String>,
    /// API base URL (`LLM_API_URL`)
    pub base_url: String,
    /// Model name (`GEMINI_MODEL`)
    pub model: String,
    /// Whole-request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_GEMINI_BASE_URL.to_owned(),
            model: DEFAULT_GEMINI_MODEL.to_owned(),
            request_timeout_secs: 60,
        }
    }
}

impl GeminiConfig {
    /// Load Gemini configuration from environment
    ///
    /// # Errors
    ///
    /// Returns an error if `GEMINI_TIMEOUT_SECS` is malformed.
    pub fn from_env() -> AppResult<Self> {
        Ok(Self {
            api_key: env_var_opt("GEMINI_API_KEY").or_else(|| env_var_opt("LLM_API_KEY")),
            base_url: env_var_or("LLM_API_URL", DEFAULT_GEMINI_BASE_URL),
            model: env_var_or("GEMINI_MODEL", DEFAULT_GEMINI_MODEL),
            request_timeout_secs: env_parse_or("GEMINI_TIMEOUT_SECS", 60)?,
        })
    }
}

impl Debug for GeminiConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("GeminiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

/// Ollama (`/api/chat`) configuration
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Server URL (`OLLAMA_API_URL`, falling back to `LOCAL_LLM_BASE_URL`)
    pub base_url: String,
    /// Model name (`LOCAL_LLM_MODEL`)
    pub model: String,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// Whole-request timeout in seconds (local inference is slow)
    pub request_timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OLLAMA_BASE_URL.to_owned(),
            model: DEFAULT_OLLAMA_MODEL.to_owned(),
            connect_timeout_secs: 30,
            request_timeout_secs: 300,
        }
    }
}

impl OllamaConfig {
    /// Load Ollama configuration from environment
    ///
    /// # Errors
    ///
    /// Returns an error if a timeout variable is malformed.
    pub fn from_env() -> AppResult<Self> {
        let base_url = env_var_opt("OLLAMA_API_URL")
            .or_else(|| env_var_opt("LOCAL_LLM_BASE_URL"))
            .unwrap_or_else(|| DEFAULT_OLLAMA_BASE_URL.to_owned());
        Ok(Self {
            base_url: normalize_ollama_url(&base_url),
            model: env_var_or("LOCAL_LLM_MODEL", DEFAULT_OLLAMA_MODEL),
            connect_timeout_secs: env_parse_or("LOCAL_LLM_CONNECT_TIMEOUT_SECS", 30)?,
            request_timeout_secs: env_parse_or("LOCAL_LLM_TIMEOUT_SECS", 300)?,
        })
    }
}

/// Accept `host:port` as well as full URLs
fn normalize_ollama_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_owned()
    } else {
        format!("http://{trimmed}")
    }
}
