// ABOUTME: Default limits, budgets, and thresholds for the query pipeline
// ABOUTME: Shared by environment configuration and by tests that pin boundary behavior
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Conversation history limits
pub mod history {
    /// Conversation pairs retained per user (N; the store holds 2×N turns)
    pub const DEFAULT_MAX_PAIRS: usize = 10;

    /// Turns of context handed to the format classifier
    pub const FORMAT_CONTEXT_TURNS: usize = 6;

    /// Prior user turns rendered into the SQL generation prompt
    pub const PROMPT_CONTEXT_QUERIES: usize = 3;

    /// Characters of SQL kept in an assistant history entry
    pub const SQL_PREVIEW_CHARS: usize = 100;

    /// Key prefix for the Redis-backed store
    pub const REDIS_KEY_PREFIX: &str = "text2sql:history:";
}

/// SQL generation budgets
pub mod generation {
    /// Retries per failure kind in the generation loop
    pub const DEFAULT_MAX_RETRIES: u32 = 3;

    /// Minimum keyword overlap for `matches_intent`
    pub const DEFAULT_INTENT_THRESHOLD: f64 = 0.3;

    /// Intent texts with fewer keywords always match
    pub const MIN_INTENT_KEYWORDS: usize = 2;

    /// Sampling temperature for every pipeline LLM call
    pub const TEMPERATURE: f32 = 0.0;

    /// Output token cap for cloud completions
    pub const CLOUD_MAX_TOKENS: u32 = 1500;

    /// Output token cap for local completions
    pub const LOCAL_MAX_TOKENS: u32 = 5000;
}

/// Query execution limits
pub mod execution {
    /// Rows fetched per page when the SQL has no LIMIT
    pub const DEFAULT_BATCH_SIZE: usize = 50_000;

    /// Hard cap on rows returned by one request
    pub const DEFAULT_MAX_RESULT_ROWS: usize = 10_000;

    /// Rows per batch in the streaming variant
    pub const DEFAULT_STREAM_BATCH_SIZE: usize = 100_000;
}

/// Response assembly limits
pub mod response {
    /// Rows shown to the LLM when writing a text answer
    pub const TEXT_SUMMARY_ROWS: usize = 20;

    /// Decimal places kept for table/graph/diagram cells
    pub const ROUND_DECIMALS: i32 = 2;
}

/// Per-stage time budgets in seconds
pub mod timeouts {
    /// Clarity and format classification
    pub const CLASSIFIER_SECS: u64 = 30;

    /// Whole SQL generation loop
    pub const GENERATION_SECS: u64 = 120;

    /// Query execution including paging
    pub const EXECUTION_SECS: u64 = 60;

    /// Column translation and text summary
    pub const ASSEMBLY_SECS: u64 = 60;
}

/// Service identity used in logs and the health endpoint
pub mod service {
    /// Service name
    pub const NAME: &str = "text2sql-server";
}
