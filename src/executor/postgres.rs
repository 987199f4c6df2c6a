// ABOUTME: PostgreSQL query backend built on a sqlx connection pool
// ABOUTME: Decodes dynamically typed rows into JSON cells with numeric and temporal coercion
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::mem;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use futures_util::TryStreamExt;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Column, Postgres, Row as _, TypeInfo};
use text2sql_core::models::Row;
use tracing::{info, warn};
use uuid::Uuid;

use super::{QueryBackend, QuerySession, RowStream};
use crate::config::DatabaseConfig;
use crate::errors::{AppError, AppResult};

/// `PostgreSQL` backend over a shared pool
#[derive(Debug, Clone)]
pub struct PgBackend {
    pool: PgPool,
}

impl PgBackend {
    /// Connect a pool using the configured URL and sizing
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is missing or the database is unreachable.
    pub async fn connect(config: &DatabaseConfig) -> AppResult<Self> {
        let url = config.require_url()?;
        let pool = PgPoolOptions::new()
            .max_connections(config.pool.max_connections)
            .min_connections(config.pool.min_connections)
            .acquire_timeout(Duration::from_secs(config.pool.acquire_timeout_secs))
            .connect(url)
            .await
            .map_err(|e| AppError::database(format!("Failed to connect to {config}: {e}")))?;

        sqlx::query("SELECT 1").execute(&pool).await?;
        info!(database = %config, "Connected to analytics database");
        Ok(Self { pool })
    }
}

struct PgSession {
    conn: PoolConnection<Postgres>,
}

#[async_trait]
impl QuerySession for PgSession {
    async fn fetch_all(&mut self, sql: &str) -> AppResult<Vec<Row>> {
        let rows = sqlx::query(sql).fetch_all(&mut *self.conn).await?;
        Ok(rows.iter().map(row_to_json).collect())
    }
}

#[async_trait]
impl QueryBackend for PgBackend {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn session(&self) -> AppResult<Box<dyn QuerySession>> {
        let conn = self.pool.acquire().await?;
        Ok(Box::new(PgSession { conn }))
    }

    fn stream<'a>(&'a self, sql: &'a str, batch_size: usize) -> RowStream<'a> {
        Box::pin(async_stream::stream! {
            let mut rows = sqlx::query(sql).fetch(&self.pool);
            let mut batch = Vec::new();
            loop {
                match rows.try_next().await {
                    Ok(Some(row)) => {
                        batch.push(row_to_json(&row));
                        if batch.len() >= batch_size {
                            yield Ok(mem::take(&mut batch));
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        yield Err(AppError::from(e));
                        return;
                    }
                }
            }
            if !batch.is_empty() {
                yield Ok(batch);
            }
        })
    }

    async fn health_check(&self) -> AppResult<bool> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(true)
    }
}

/// Convert a row into a JSON object keyed by column name
fn row_to_json(row: &PgRow) -> Row {
    row.columns()
        .iter()
        .map(|column| {
            let idx = column.ordinal();
            let value = decode_cell(row, idx, column.type_info().name());
            (column.name().to_owned(), value)
        })
        .collect()
}

fn opt<T>(row: &PgRow, idx: usize) -> Result<Option<T>, sqlx::Error>
where
    T: for<'r> sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get::<Option<T>, _>(idx)
}

/// Decode one cell, coercing decimals to floats and temporals to ISO-8601
fn decode_cell(row: &PgRow, idx: usize, type_name: &str) -> Value {
    let decoded = match type_name {
        "BOOL" => opt::<bool>(row, idx).map(|v| v.map(Value::from)),
        "INT2" => opt::<i16>(row, idx).map(|v| v.map(Value::from)),
        "INT4" => opt::<i32>(row, idx).map(|v| v.map(Value::from)),
        "INT8" => opt::<i64>(row, idx).map(|v| v.map(Value::from)),
        "FLOAT4" => opt::<f32>(row, idx).map(|v| v.map(|f| Value::from(f64::from(f)))),
        "FLOAT8" => opt::<f64>(row, idx).map(|v| v.map(Value::from)),
        "NUMERIC" => opt::<Decimal>(row, idx).map(|v| v.map(decimal_to_json)),
        "TIMESTAMP" => opt::<NaiveDateTime>(row, idx)
            .map(|v| v.map(|t| Value::from(t.format("%Y-%m-%dT%H:%M:%S%.f").to_string()))),
        "TIMESTAMPTZ" => {
            opt::<DateTime<Utc>>(row, idx).map(|v| v.map(|t| Value::from(t.to_rfc3339())))
        }
        "DATE" => opt::<NaiveDate>(row, idx).map(|v| v.map(|d| Value::from(d.to_string()))),
        "TIME" => opt::<NaiveTime>(row, idx).map(|v| v.map(|t| Value::from(t.to_string()))),
        "UUID" => opt::<Uuid>(row, idx).map(|v| v.map(|u| Value::from(u.to_string()))),
        _ => opt::<String>(row, idx).map(|v| v.map(Value::from)),
    };

    match decoded {
        Ok(value) => value.unwrap_or(Value::Null),
        Err(e) => {
            warn!(column = idx, type_name, error = %e, "Unsupported column type, returning type name");
            Value::String(format!("<{type_name}>"))
        }
    }
}

fn decimal_to_json(decimal: Decimal) -> Value {
    decimal
        .to_f64()
        .map_or_else(|| Value::String(decimal.to_string()), Value::from)
}
