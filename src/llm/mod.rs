// ABOUTME: LLM provider abstraction layer shared by the cloud and local engines
// ABOUTME: Defines the chat completion contract used by every pipeline stage
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # LLM Provider Interface
//!
//! Every pipeline stage that needs a model (clarity check, format decision,
//! SQL generation, column translation, text summary) talks to an
//! [`LlmProvider`]. Two implementations exist: [`GeminiProvider`] for the
//! cloud engine and [`OllamaProvider`] for the local one. [`ChatProvider`]
//! wraps either behind a single concrete type.
//!
//! ## Example: Using a Provider
//!
//! ```rust,no_run
//! use text2sql_server::llm::{ChatMessage, ChatRequest, LlmProvider};
//!
//! async fn example(provider: &dyn LlmProvider) {
//!     let request = ChatRequest::new(vec![
//!         ChatMessage::system("Answer with a single SQL statement."),
//!         ChatMessage::user("How many transactions are there?"),
//!     ])
//!     .with_temperature(0.0);
//!     let response = provider.complete(&request).await;
//! }
//! ```

mod gemini;
mod ollama;
pub mod prompts;
mod provider;

pub use gemini::GeminiProvider;
pub use ollama::OllamaProvider;
pub use provider::{ChatProvider, Engine, EngineSet};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use text2sql_core::models::{ConversationTurn, TurnRole};

use crate::errors::AppError;

// ============================================================================
// Capability Flags
// ============================================================================

bitflags::bitflags! {
    /// LLM provider capability flags
    ///
    /// Stages consult these to decide how to phrase a request, e.g. whether
    /// a JSON-only response can be requested natively.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct LlmCapabilities: u8 {
        /// Provider honors a separate system instruction
        const SYSTEM_MESSAGES = 0b0000_0001;
        /// Provider can be forced to emit JSON
        const JSON_MODE = 0b0000_0010;
        /// Provider accepts multi-turn history
        const MULTI_TURN = 0b0000_0100;
    }
}

impl LlmCapabilities {
    /// Capabilities shared by both engines
    #[must_use]
    pub const fn chat() -> Self {
        Self::SYSTEM_MESSAGES.union(Self::MULTI_TURN)
    }

    /// Check if JSON mode is supported
    #[must_use]
    pub const fn supports_json_mode(&self) -> bool {
        self.contains(Self::JSON_MODE)
    }
}

// ============================================================================
// Message Types
// ============================================================================

/// Role of a message in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System instruction message
    System,
    /// User input message
    User,
    /// Assistant response message
    Assistant,
}

impl MessageRole {
    /// Convert to string representation for API calls
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single message in a chat conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender
    pub role: MessageRole,
    /// Content of the message
    pub content: String,
}

impl ChatMessage {
    /// Create a new chat message
    #[must_use]
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a system message
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    /// Create a user message
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Create an assistant message
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

impl From<&ConversationTurn> for ChatMessage {
    fn from(turn: &ConversationTurn) -> Self {
        match turn.role {
            TurnRole::User => Self::user(turn.text.clone()),
            TurnRole::Assistant => Self::assistant(turn.text.clone()),
        }
    }
}

/// Build a message list: system instruction, prior turns, then the new user text
#[must_use]
pub fn conversation_messages(
    system: &str,
    history: &[ConversationTurn],
    user_text: &str,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    if !system.is_empty() {
        messages.push(ChatMessage::system(system));
    }
    messages.extend(history.iter().map(ChatMessage::from));
    messages.push(ChatMessage::user(user_text));
    messages
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Configuration for a chat completion request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Conversation messages
    pub messages: Vec<ChatMessage>,
    /// Model identifier (provider-specific)
    pub model: Option<String>,
    /// Temperature for response randomness (0.0 - 2.0)
    pub temperature: Option<f32>,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Ask the provider for a JSON-only response when it supports it
    pub json_mode: bool,
}

impl ChatRequest {
    /// Create a new chat request with messages
    #[must_use]
    pub const fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            model: None,
            temperature: None,
            max_tokens: None,
            json_mode: false,
        }
    }

    /// Set the temperature
    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the maximum tokens
    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Request JSON output
    #[must_use]
    pub const fn with_json_mode(mut self) -> Self {
        self.json_mode = true;
        self
    }
}

/// Response from a chat completion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Generated message content
    pub content: String,
    /// Model used for generation
    pub model: String,
    /// Token usage statistics
    pub usage: Option<TokenUsage>,
    /// Finish reason (stop, length, etc.)
    pub finish_reason: Option<String>,
}

/// Token usage statistics
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of tokens in the prompt
    pub prompt_tokens: u32,
    /// Number of tokens in the completion
    pub completion_tokens: u32,
    /// Total tokens used
    pub total_tokens: u32,
}

/// Decode the first JSON object in a model reply
///
/// Models wrap JSON in Markdown fences or prose often enough that the
/// outermost `{...}` span is decoded instead of the whole text.
#[must_use]
pub fn parse_json_reply<T: DeserializeOwned>(reply: &str) -> Option<T> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    serde_json::from_str(reply.get(start..=end)?).ok()
}

// ============================================================================
// Provider Trait
// ============================================================================

/// LLM provider trait for chat completion
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Unique provider identifier (e.g., "gemini", "ollama")
    fn name(&self) -> &'static str;

    /// Human-readable display name for the provider
    fn display_name(&self) -> &'static str;

    /// Provider capabilities
    fn capabilities(&self) -> LlmCapabilities;

    /// Default model to use if not specified in request
    fn default_model(&self) -> &str;

    /// Perform a chat completion
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, AppError>;

    /// Check if the provider is reachable and credentials are valid
    async fn health_check(&self) -> Result<bool, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_messages_order() {
        let history = vec![
            ConversationTurn::user("Сколько транзакций?"),
            ConversationTurn::assistant("SQL: SELECT COUNT(*) FROM transactions..."),
        ];
        let messages = conversation_messages("rules", &history, "а в Алматы?");
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, MessageRole::System);
        assert_eq!(messages[2].role, MessageRole::Assistant);
        assert_eq!(messages[3].content, "а в Алматы?");
    }

    #[test]
    fn test_empty_system_is_skipped() {
        let messages = conversation_messages("", &[], "hi");
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn test_parse_json_reply_ignores_fences() {
        let reply = "```json\n{\"is_clear\": true}\n```";
        let value: serde_json::Value = parse_json_reply(reply).unwrap();
        assert_eq!(value["is_clear"], true);
        assert!(parse_json_reply::<serde_json::Value>("no json").is_none());
    }

    #[test]
    fn test_chat_capabilities() {
        let caps = LlmCapabilities::chat() | LlmCapabilities::JSON_MODE;
        assert!(caps.supports_json_mode());
        assert!(caps.contains(LlmCapabilities::SYSTEM_MESSAGES));
        assert!(!LlmCapabilities::chat().supports_json_mode());
    }
}
