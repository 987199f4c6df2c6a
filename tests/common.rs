// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Provides a scripted LLM provider, an in-memory query backend, and pipeline builders
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::module_name_repetitions,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]
//! Shared test utilities for `text2sql_server`
//!
//! [`ScriptedLlm`] answers each pipeline stage from its own queue so a test
//! can script exactly what the model "says". [`FakeBackend`] serves rows from
//! memory and honors the `LIMIT`/`OFFSET` windows the executor appends.

use std::collections::{HashMap, VecDeque};
use std::env;
use std::sync::{Arc, LazyLock, Mutex, Once};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream;
use regex::Regex;
use serde_json::{json, Value};
use text2sql_server::config::{FormatStrategy, PipelineConfig, StageTimeouts};
use text2sql_server::conversation::{ConversationStore, InMemoryConversationStore};
use text2sql_server::errors::{AppError, AppResult};
use text2sql_server::executor::{QueryBackend, QueryExecutor, QuerySession, RowStream};
use text2sql_server::llm::prompts::SQL_SYSTEM_INSTRUCTION;
use text2sql_server::llm::{
    ChatRequest, ChatResponse, Engine, EngineSet, LlmCapabilities, LlmProvider, MessageRole,
};
use text2sql_server::models::{EngineKind, Row};
use text2sql_server::pipeline::QueryPipeline;
use text2sql_server::server::ServerResources;
use tokio::time::sleep;
use tracing::Level;

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => Level::TRACE,
            Ok("DEBUG") => Level::DEBUG,
            Ok("INFO") => Level::INFO,
            _ => Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

/// Convert a `json!` object into a result row
pub fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        other => panic!("row() expects a JSON object, got {other}"),
    }
}

// ============================================================================
// Scripted LLM
// ============================================================================

/// Pipeline stage a request belongs to, inferred from its prompts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Clarity,
    Format,
    Generation,
    ColumnNames,
    Summary,
}

impl Stage {
    fn of(request: &ChatRequest) -> Self {
        let system = request
            .messages
            .first()
            .filter(|m| m.role == MessageRole::System)
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        let user = request
            .messages
            .last()
            .map(|m| m.content.as_str())
            .unwrap_or_default();

        if system == SQL_SYSTEM_INSTRUCTION {
            Self::Generation
        } else if user.starts_with("QUESTION: ") {
            Self::Clarity
        } else if user.starts_with("CURRENT MESSAGE") {
            Self::Format
        } else if request.json_mode {
            Self::ColumnNames
        } else {
            Self::Summary
        }
    }
}

/// One scripted model behavior
#[derive(Debug, Clone)]
pub enum Reply {
    /// Return this text
    Text(String),
    /// Fail with an external service error
    Fail(String),
    /// Sleep, then return this text
    Slow(Duration, String),
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn sql(sql: &str) -> Self {
        Self::Text(json!({ "sql_query": sql }).to_string())
    }

    pub fn format(output_format: &str) -> Self {
        Self::Text(
            json!({ "output_format": output_format, "confidence": 0.9 }).to_string(),
        )
    }

    pub fn clear() -> Self {
        Self::Text(r#"{"is_clear": true, "clarification_question": null}"#.to_owned())
    }

    pub fn unclear(question: &str) -> Self {
        Self::Text(
            json!({ "is_clear": false, "clarification_question": question })
                .to_string(),
        )
    }
}

#[derive(Default)]
struct Script {
    queued: HashMap<Stage, VecDeque<Reply>>,
    always: HashMap<Stage, Reply>,
    calls: Vec<(Stage, ChatRequest)>,
}

/// LLM provider that replays scripted replies per stage
///
/// Queued replies are consumed first; then the stage's `always` reply is
/// used; with neither, clarity answers "clear" and every other stage fails.
#[derive(Default)]
pub struct ScriptedLlm {
    script: Mutex<Script>,
}

impl ScriptedLlm {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a reply for the next call of a stage
    pub fn push(&self, stage: Stage, reply: Reply) -> &Self {
        self.script
            .lock()
            .unwrap()
            .queued
            .entry(stage)
            .or_default()
            .push_back(reply);
        self
    }

    /// Reply used once a stage's queue is empty
    pub fn always(&self, stage: Stage, reply: Reply) -> &Self {
        self.script.lock().unwrap().always.insert(stage, reply);
        self
    }

    /// Requests received so far, in order
    pub fn calls(&self) -> Vec<(Stage, ChatRequest)> {
        self.script.lock().unwrap().calls.clone()
    }

    /// Number of calls made for one stage
    pub fn call_count(&self, stage: Stage) -> usize {
        self.calls().iter().filter(|(s, _)| *s == stage).count()
    }

    fn next_reply(&self, request: &ChatRequest) -> (Stage, Option<Reply>) {
        let stage = Stage::of(request);
        let mut script = self.script.lock().unwrap();
        script.calls.push((stage, request.clone()));
        let queued = script.queued.get_mut(&stage).and_then(VecDeque::pop_front);
        let reply = queued
            .or_else(|| script.always.get(&stage).cloned())
            .or_else(|| (stage == Stage::Clarity).then(Reply::clear));
        (stage, reply)
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn display_name(&self) -> &'static str {
        "Scripted test model"
    }

    fn capabilities(&self) -> LlmCapabilities {
        LlmCapabilities::chat() | LlmCapabilities::JSON_MODE
    }

    fn default_model(&self) -> &str {
        "scripted-1"
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, AppError> {
        let (stage, reply) = self.next_reply(request);
        let content = match reply {
            Some(Reply::Text(text)) => text,
            Some(Reply::Slow(delay, text)) => {
                sleep(delay).await;
                text
            }
            Some(Reply::Fail(message)) => {
                return Err(AppError::external_service("scripted", message));
            }
            None => {
                return Err(AppError::external_service(
                    "scripted",
                    format!("no reply scripted for {stage:?}"),
                ));
            }
        };
        Ok(ChatResponse {
            content,
            model: "scripted-1".to_owned(),
            usage: None,
            finish_reason: Some("stop".to_owned()),
        })
    }

    async fn health_check(&self) -> Result<bool, AppError> {
        Ok(true)
    }
}

// ============================================================================
// In-memory query backend
// ============================================================================

static PAGE_WINDOW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+LIMIT\s+(\d+)\s+OFFSET\s+(\d+)\s*$").unwrap());
static FIRST_LIMIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bLIMIT\s+(\d+)").unwrap());

/// Query backend serving a fixed row set
#[derive(Default)]
pub struct FakeBackend {
    rows: Vec<Row>,
    fail_with: Option<String>,
    statements: Mutex<Vec<String>>,
}

impl FakeBackend {
    pub fn with_rows(rows: Vec<Row>) -> Arc<Self> {
        Arc::new(Self {
            rows,
            ..Self::default()
        })
    }

    /// `n` rows of `{"id": i}`
    pub fn numbered(n: usize) -> Arc<Self> {
        Self::with_rows((0..n).map(|i| row(json!({ "id": i }))).collect())
    }

    /// Backend whose every statement fails
    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            fail_with: Some(message.to_owned()),
            ..Self::default()
        })
    }

    /// Statements received so far, in order
    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }

    fn run(&self, sql: &str) -> AppResult<Vec<Row>> {
        self.statements.lock().unwrap().push(sql.to_owned());
        if let Some(message) = &self.fail_with {
            return Err(AppError::database(message.clone()));
        }

        if let Some(window) = PAGE_WINDOW.captures(sql) {
            let limit: usize = window[1].parse().unwrap();
            let offset: usize = window[2].parse().unwrap();
            return Ok(self.rows.iter().skip(offset).take(limit).cloned().collect());
        }
        if let Some(limit) = FIRST_LIMIT.captures(sql) {
            let limit: usize = limit[1].parse().unwrap();
            return Ok(self.rows.iter().take(limit).cloned().collect());
        }
        Ok(self.rows.clone())
    }
}

struct FakeSession {
    backend: Arc<FakeBackend>,
}

#[async_trait]
impl QuerySession for FakeSession {
    async fn fetch_all(&mut self, sql: &str) -> AppResult<Vec<Row>> {
        self.backend.run(sql)
    }
}

/// Shares one [`FakeBackend`] between the executor and the test body
pub struct SharedBackend(pub Arc<FakeBackend>);

#[async_trait]
impl QueryBackend for SharedBackend {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn session(&self) -> AppResult<Box<dyn QuerySession>> {
        Ok(Box::new(FakeSession {
            backend: Arc::clone(&self.0),
        }))
    }

    fn stream<'a>(&'a self, sql: &'a str, batch_size: usize) -> RowStream<'a> {
        let batches: Vec<AppResult<Vec<Row>>> = match self.0.run(sql) {
            Ok(rows) => rows.chunks(batch_size).map(|c| Ok(c.to_vec())).collect(),
            Err(e) => vec![Err(e)],
        };
        Box::pin(stream::iter(batches))
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(self.0.fail_with.is_none())
    }
}

// ============================================================================
// Builders
// ============================================================================

/// Pipeline configuration with short stage budgets
pub fn test_pipeline_config() -> PipelineConfig {
    PipelineConfig {
        format_strategy: FormatStrategy::Llm,
        timeouts: StageTimeouts {
            classifier: Duration::from_secs(2),
            generation: Duration::from_secs(5),
            execution: Duration::from_secs(5),
            assembly: Duration::from_secs(2),
        },
        ..PipelineConfig::default()
    }
}

/// Executor over a fake backend
pub fn create_test_executor(backend: &Arc<FakeBackend>, config: &PipelineConfig) -> QueryExecutor {
    QueryExecutor::new(Arc::new(SharedBackend(Arc::clone(backend))), config)
}

/// Pipeline with the scripted model installed as the `api` engine only
pub fn create_test_pipeline(
    llm: &Arc<ScriptedLlm>,
    backend: &Arc<FakeBackend>,
    config: &PipelineConfig,
) -> QueryPipeline {
    init_test_logging();
    let engine = Engine::new(Arc::clone(llm) as Arc<dyn LlmProvider>, 1500);
    let engines = EngineSet::default().with_engine(EngineKind::Api, engine);
    let store: Arc<dyn ConversationStore> = Arc::new(InMemoryConversationStore::new(10));
    QueryPipeline::new(engines, store, create_test_executor(backend, config), config)
}

/// Server resources around a test pipeline
pub fn create_test_server_resources(
    llm: &Arc<ScriptedLlm>,
    backend: &Arc<FakeBackend>,
) -> Arc<ServerResources> {
    let pipeline = create_test_pipeline(llm, backend, &test_pipeline_config());
    Arc::new(ServerResources::new(pipeline))
}
