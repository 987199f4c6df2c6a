// ABOUTME: Unified provider selector mapping the request's engine choice to a backend
// ABOUTME: Wraps Gemini and Ollama behind one type and pins per-engine sampling settings
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # LLM Provider Selector
//!
//! Each request names an engine: `"api"` for the cloud model, `"llm"` for the
//! local one. [`EngineSet`] holds both, built once at startup from
//! [`LlmConfig`]. The cloud engine is optional; without an API key it is
//! simply absent and requests for it fail with a configuration error.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use text2sql_core::constants::generation;
use text2sql_core::models::{ConversationTurn, EngineKind};
use tracing::{debug, info, warn};

use super::{
    conversation_messages, ChatRequest, ChatResponse, GeminiProvider, LlmCapabilities,
    LlmProvider, OllamaProvider,
};
use crate::config::LlmConfig;
use crate::errors::{AppError, AppResult, ErrorCode};

/// Unified chat provider that wraps Gemini or Ollama
pub enum ChatProvider {
    /// Google Gemini (cloud engine)
    Gemini(GeminiProvider),
    /// Ollama (local engine)
    Ollama(OllamaProvider),
}

impl ChatProvider {
    /// Create the provider backing an engine
    ///
    /// # Errors
    ///
    /// Returns an error if the engine's credentials are missing or its HTTP
    /// client cannot be built.
    pub fn for_engine(kind: EngineKind, config: &LlmConfig) -> Result<Self, AppError> {
        match kind {
            EngineKind::Api => Ok(Self::Gemini(GeminiProvider::new(&config.gemini)?)),
            EngineKind::Llm => Ok(Self::Ollama(OllamaProvider::new(&config.ollama)?)),
        }
    }

    /// Output token cap used for this backend
    #[must_use]
    pub const fn max_output_tokens(&self) -> u32 {
        match self {
            Self::Gemini(_) => generation::CLOUD_MAX_TOKENS,
            Self::Ollama(_) => generation::LOCAL_MAX_TOKENS,
        }
    }
}

impl fmt::Debug for ChatProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gemini(p) => f.debug_tuple("ChatProvider::Gemini").field(p).finish(),
            Self::Ollama(p) => f.debug_tuple("ChatProvider::Ollama").field(p).finish(),
        }
    }
}

#[async_trait]
impl LlmProvider for ChatProvider {
    fn name(&self) -> &'static str {
        match self {
            Self::Gemini(p) => p.name(),
            Self::Ollama(p) => p.name(),
        }
    }

    fn display_name(&self) -> &'static str {
        match self {
            Self::Gemini(p) => p.display_name(),
            Self::Ollama(p) => p.display_name(),
        }
    }

    fn capabilities(&self) -> LlmCapabilities {
        match self {
            Self::Gemini(p) => p.capabilities(),
            Self::Ollama(p) => p.capabilities(),
        }
    }

    fn default_model(&self) -> &str {
        match self {
            Self::Gemini(p) => p.default_model(),
            Self::Ollama(p) => p.default_model(),
        }
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, AppError> {
        match self {
            Self::Gemini(p) => p.complete(request).await,
            Self::Ollama(p) => p.complete(request).await,
        }
    }

    async fn health_check(&self) -> Result<bool, AppError> {
        match self {
            Self::Gemini(p) => p.health_check().await,
            Self::Ollama(p) => p.health_check().await,
        }
    }
}

// ============================================================================
// Engines
// ============================================================================

/// A provider plus the sampling settings every pipeline call uses
#[derive(Clone)]
pub struct Engine {
    provider: Arc<dyn LlmProvider>,
    max_tokens: u32,
}

impl Engine {
    /// Wrap a provider with an output token cap
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>, max_tokens: u32) -> Self {
        Self {
            provider,
            max_tokens,
        }
    }

    /// Underlying provider
    #[must_use]
    pub fn provider(&self) -> &dyn LlmProvider {
        self.provider.as_ref()
    }

    /// Deterministic request with this engine's token cap
    #[must_use]
    pub fn request(&self, system: &str, history: &[ConversationTurn], user_text: &str) -> ChatRequest {
        ChatRequest::new(conversation_messages(system, history, user_text))
            .with_temperature(generation::TEMPERATURE)
            .with_max_tokens(self.max_tokens)
    }

    /// Send a request and return the trimmed text
    ///
    /// # Errors
    ///
    /// Propagates the provider error.
    pub async fn complete_text(&self, request: &ChatRequest) -> AppResult<String> {
        let response = self.provider.complete(request).await?;
        debug!(
            provider = self.provider.name(),
            model = %response.model,
            chars = response.content.len(),
            "LLM completion received"
        );
        Ok(response.content.trim().to_owned())
    }

    /// Ask for JSON when the backend supports it natively
    #[must_use]
    pub fn json_request(
        &self,
        system: &str,
        history: &[ConversationTurn],
        user_text: &str,
    ) -> ChatRequest {
        let request = self.request(system, history, user_text);
        if self.provider.capabilities().supports_json_mode() {
            request.with_json_mode()
        } else {
            request
        }
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("provider", &self.provider.name())
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

/// The two selectable engines
#[derive(Debug, Clone, Default)]
pub struct EngineSet {
    api: Option<Engine>,
    llm: Option<Engine>,
}

impl EngineSet {
    /// Build both engines from configuration
    ///
    /// A missing cloud API key leaves the `api` engine unset instead of
    /// failing startup.
    ///
    /// # Errors
    ///
    /// Returns an error if the local engine's HTTP client cannot be built.
    pub fn from_config(config: &LlmConfig) -> AppResult<Self> {
        let api = match ChatProvider::for_engine(EngineKind::Api, config) {
            Ok(provider) => {
                info!(model = provider.default_model(), "Cloud engine ready");
                let max_tokens = provider.max_output_tokens();
                Some(Engine::new(Arc::new(provider), max_tokens))
            }
            Err(e) if e.code == ErrorCode::ConfigError => {
                warn!("Cloud engine disabled: {}", e.message);
                None
            }
            Err(e) => return Err(e),
        };

        let local = ChatProvider::for_engine(EngineKind::Llm, config)?;
        let max_tokens = local.max_output_tokens();
        let llm = Some(Engine::new(Arc::new(local), max_tokens));

        Ok(Self { api, llm })
    }

    /// Install or replace one engine
    #[must_use]
    pub fn with_engine(mut self, kind: EngineKind, engine: Engine) -> Self {
        match kind {
            EngineKind::Api => self.api = Some(engine),
            EngineKind::Llm => self.llm = Some(engine),
        }
        self
    }

    /// Engine for a request
    ///
    /// # Errors
    ///
    /// Returns `ConfigMissing` if the engine was not configured.
    pub fn get(&self, kind: EngineKind) -> AppResult<&Engine> {
        let engine = match kind {
            EngineKind::Api => self.api.as_ref(),
            EngineKind::Llm => self.llm.as_ref(),
        };
        engine.ok_or_else(|| {
            AppError::new(
                ErrorCode::ConfigMissing,
                format!("LLM engine '{kind}' is not configured"),
            )
        })
    }

    /// Probe every configured engine
    pub async fn health(&self) -> Vec<(EngineKind, bool)> {
        let mut report = Vec::with_capacity(2);
        for (kind, engine) in [(EngineKind::Api, &self.api), (EngineKind::Llm, &self.llm)] {
            if let Some(engine) = engine {
                let healthy = engine.provider().health_check().await.unwrap_or(false);
                report.push((kind, healthy));
            }
        }
        report
    }
}
