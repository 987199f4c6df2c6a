// ABOUTME: Console harness that turns typed questions into validated SQL
// ABOUTME: Interactive REPL or one-shot mode, with optional execution against the database
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
//!
//! Usage:
//! ```bash
//! # Interactive session with the cloud engine
//! text2sql-cli
//!
//! # One question through the local engine, executed and printed
//! text2sql-cli --model llm --execute --query "Сколько транзакций в Алматы?"
//! ```

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use futures_util::TryStreamExt;
use text2sql_server::config::ServerConfig;
use text2sql_server::executor::{PgBackend, QueryExecutor};
use text2sql_server::language::{KeywordLanguageClassifier, LanguageClassifier};
use text2sql_server::llm::{Engine, EngineSet};
use text2sql_server::logging::LoggingConfig;
use text2sql_server::models::{AttemptOutcome, EngineKind};
use text2sql_server::sql_generation::{GenerationOutcome, SqlGenerator};
use text2sql_server::validator::SqlValidator;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Inputs that end an interactive session
const EXIT_COMMANDS: [&str; 3] = ["exit", "quit", "выход"];

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModelArg {
    /// Cloud API engine
    Api,
    /// Local engine
    Llm,
}

impl From<ModelArg> for EngineKind {
    fn from(arg: ModelArg) -> Self {
        match arg {
            ModelArg::Api => Self::Api,
            ModelArg::Llm => Self::Llm,
        }
    }
}

#[derive(Parser)]
#[command(
    name = "text2sql-cli",
    about = "Text2SQL console harness",
    long_about = "Generates and validates SQL for natural-language questions, optionally executing it."
)]
struct Cli {
    /// Engine used for generation
    #[arg(long, value_enum, default_value = "api")]
    model: ModelArg,

    /// Run the generated SQL and print the rows
    #[arg(long)]
    execute: bool,

    /// Answer a single question and exit
    #[arg(long, short = 'q')]
    query: Option<String>,

    /// Enable debug logging
    #[arg(long, short = 'v')]
    verbose: bool,
}

struct Harness {
    engine: Engine,
    generator: SqlGenerator,
    executor: Option<QueryExecutor>,
}

impl Harness {
    async fn answer(&self, question: &str) -> Result<()> {
        let language = KeywordLanguageClassifier.classify(question);
        println!("Language: {}", language.display_name());

        let outcome = self
            .generator
            .generate(&self.engine, question, language, &[])
            .await;
        display_outcome(&outcome);

        let validation = outcome.validation;
        if validation.sql_query.is_empty() || !validation.is_safe {
            return Ok(());
        }
        let Some(executor) = &self.executor else {
            return Ok(());
        };

        let mut batches = executor.stream(&validation.sql_query)?;
        let mut total = 0_usize;
        while let Some(batch) = batches.try_next().await? {
            for row in &batch {
                println!("{}", serde_json::to_string(row)?);
            }
            total += batch.len();
        }
        println!("{total} row(s)");
        Ok(())
    }
}

fn display_outcome(outcome: &GenerationOutcome) {
    println!("{}", "=".repeat(80));
    for attempt in &outcome.attempts {
        let status = match attempt.outcome {
            AttemptOutcome::Accepted => "accepted",
            AttemptOutcome::Unsafe => "unsafe",
            AttemptOutcome::GenerationError => "error",
        };
        println!("Attempt {}: {status}  {}", attempt.attempt, attempt.notes);
    }
    println!("{}", "=".repeat(80));

    let validation = &outcome.validation;
    if validation.sql_query.is_empty() {
        println!("No SQL generated: {}", validation.validation_notes);
        return;
    }
    println!("{}", validation.sql_query);
    println!(
        "Safe: {}  Matches intent: {}  Notes: {}",
        validation.is_safe, validation.matches_intent, validation.validation_notes
    );
}

async fn repl(harness: &Harness) -> Result<()> {
    let mut lines = BufReader::new(io::stdin()).lines();
    let mut stdout = io::stdout();

    loop {
        stdout.write_all("\n> ".as_bytes()).await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if EXIT_COMMANDS.contains(&question.to_lowercase().as_str()) {
            break;
        }
        if let Err(e) = harness.answer(question).await {
            eprintln!("Error: {e}");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = dotenv::dotenv() {
        eprintln!("No .env file loaded: {e}");
    }

    let mut logging = LoggingConfig::from_env().with_stderr();
    if cli.verbose {
        "debug".clone_into(&mut logging.level);
    }
    logging.init()?;

    let config = ServerConfig::from_env()?;
    let engines = EngineSet::from_config(&config.llm)?;
    let engine = engines.get(cli.model.into())?.clone();

    let executor = if cli.execute {
        let backend = PgBackend::connect(&config.database).await?;
        Some(QueryExecutor::new(Arc::new(backend), &config.pipeline))
    } else {
        None
    };

    let harness = Harness {
        engine,
        generator: SqlGenerator::new(
            SqlValidator::new(config.pipeline.intent_threshold),
            config.pipeline.max_retries,
        ),
        executor,
    };

    match cli.query {
        Some(question) => harness.answer(&question).await,
        None => {
            println!("Text2SQL console. Type a question, or 'exit' to quit.");
            repl(&harness).await
        }
    }
}
