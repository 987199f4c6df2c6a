// ABOUTME: HTTP server binary for the text-to-SQL analytics API
// ABOUTME: Loads configuration, connects the database and history store, and serves requests
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![recursion_limit = "256"]

//! # Text2SQL Server Binary
//!
//! Starts the query API with both LLM engines, the configured history store,
//! and a `PostgreSQL` executor.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use text2sql_server::config::ServerConfig;
use text2sql_server::conversation::create_store;
use text2sql_server::executor::{PgBackend, QueryExecutor};
use text2sql_server::llm::EngineSet;
use text2sql_server::logging;
use text2sql_server::pipeline::QueryPipeline;
use text2sql_server::server::{self, ServerResources};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "text2sql-server")]
#[command(about = "Text2SQL API - natural-language analytics over transactions")]
pub struct Args {
    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Err(e) = dotenv::dotenv() {
        eprintln!("No .env file loaded: {e}");
    }

    let mut config = ServerConfig::from_env()?;
    if let Some(http_port) = args.http_port {
        config.http_port = http_port;
    }

    logging::init_from_env()?;
    info!("Starting Text2SQL API");
    info!("{}", config.summary());

    let engines = EngineSet::from_config(&config.llm)?;
    let store = create_store(&config.history).await?;
    info!(backend = store.backend(), "Conversation store ready");

    let backend = PgBackend::connect(&config.database).await?;
    let executor = QueryExecutor::new(Arc::new(backend), &config.pipeline);
    let pipeline = QueryPipeline::new(engines, store, executor, &config.pipeline);
    let resources = Arc::new(ServerResources::new(pipeline));

    if let Err(e) = server::run(&config, resources).await {
        error!(error = %e, "Server terminated with error");
        return Err(e.into());
    }
    Ok(())
}
