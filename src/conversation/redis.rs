// ABOUTME: Redis-backed conversation store shared across server instances
// ABOUTME: One list per user, appended and trimmed in a single atomic pipeline
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::AsyncCommands;
use text2sql_core::constants::history::REDIS_KEY_PREFIX;
use text2sql_core::models::ConversationTurn;
use tracing::{error, info, warn};

use super::ConversationStore;
use crate::config::{HistoryStoreConfig, RedisConnectionConfig};
use crate::errors::{AppError, AppResult};

/// Redis conversation store
///
/// Each user's turns are JSON strings in a Redis list at
/// `text2sql:history:<user_id>`. `RPUSH` + `LTRIM` run inside `MULTI/EXEC`
/// so the list never exceeds `max_turns` even under concurrent appends from
/// several instances.
#[derive(Clone)]
pub struct RedisConversationStore {
    manager: ConnectionManager,
    max_turns: usize,
}

impl RedisConversationStore {
    /// Connect to Redis using the history store configuration
    ///
    /// # Errors
    ///
    /// Returns an error if no Redis URL is configured or the connection
    /// cannot be established after retries.
    pub async fn connect(config: &HistoryStoreConfig) -> AppResult<Self> {
        let redis_url = config
            .redis_url
            .as_ref()
            .ok_or_else(|| AppError::config("REDIS_URL is required for the Redis history store"))?;

        let conn_config = &config.redis_connection;
        info!(
            "Connecting to Redis history store (timeout={}s, response_timeout={}s, retries={})",
            conn_config.connection_timeout_secs,
            conn_config.response_timeout_secs,
            conn_config.initial_connection_retries
        );

        let client = redis::Client::open(redis_url.as_str())
            .map_err(|e| AppError::config(format!("Invalid REDIS_URL: {e}")))?;
        let manager = Self::connect_with_retry(&client, conn_config).await?;

        info!("Successfully connected to Redis history store");
        Ok(Self {
            manager,
            max_turns: config.max_turns(),
        })
    }

    /// Connect to Redis with exponential backoff retry on failure
    async fn connect_with_retry(
        client: &redis::Client,
        conn_config: &RedisConnectionConfig,
    ) -> AppResult<ConnectionManager> {
        let manager_config = ConnectionManagerConfig::new()
            .set_connection_timeout(Duration::from_secs(conn_config.connection_timeout_secs))
            .set_response_timeout(Duration::from_secs(conn_config.response_timeout_secs))
            .set_number_of_retries(conn_config.reconnection_retries)
            .set_exponent_base(conn_config.retry_exponent_base)
            .set_max_delay(conn_config.max_retry_delay_ms);

        let max_retries = conn_config.initial_connection_retries;
        let mut delay_ms = conn_config.initial_retry_delay_ms;
        let mut last_error = None;

        for attempt in 0..=max_retries {
            match ConnectionManager::new_with_config(client.clone(), manager_config.clone()).await {
                Ok(manager) => {
                    if attempt > 0 {
                        info!("Redis connection established after {} retries", attempt);
                    }
                    return Ok(manager);
                }
                Err(e) => {
                    if attempt < max_retries {
                        warn!(
                            "Redis connection attempt {}/{} failed, retrying in {}ms: {}",
                            attempt + 1,
                            max_retries + 1,
                            delay_ms,
                            e
                        );
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                        delay_ms = (delay_ms * 2).min(conn_config.max_retry_delay_ms);
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(AppError::storage(format!(
            "Failed to connect to Redis after {} attempts: {}",
            max_retries + 1,
            last_error.map_or_else(|| "unknown error".to_owned(), |e| e.to_string())
        )))
    }

    fn build_key(user_id: &str) -> String {
        format!("{REDIS_KEY_PREFIX}{user_id}")
    }

    /// Verify the connection with `PING`
    ///
    /// # Errors
    ///
    /// Returns an error if Redis does not answer `PONG`.
    pub async fn health_check(&self) -> AppResult<()> {
        let mut conn = self.manager.clone();
        let response: String = redis::cmd("PING").query_async(&mut conn).await?;
        if response == "PONG" {
            Ok(())
        } else {
            Err(AppError::storage(format!(
                "Unexpected PING response '{response}'"
            )))
        }
    }
}

#[async_trait]
impl ConversationStore for RedisConversationStore {
    fn backend(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, user_id: &str) -> Vec<ConversationTurn> {
        let mut conn = self.manager.clone();
        let raw: Vec<String> = match conn.lrange(Self::build_key(user_id), 0, -1).await {
            Ok(raw) => raw,
            Err(e) => {
                error!(user_id, "Redis LRANGE failed, continuing without history: {}", e);
                return Vec::new();
            }
        };

        raw.iter()
            .filter_map(|item| match serde_json::from_str::<ConversationTurn>(item) {
                Ok(turn) => Some(turn),
                Err(e) => {
                    warn!(user_id, "Skipping malformed history entry: {}", e);
                    None
                }
            })
            .collect()
    }

    async fn append(&self, user_id: &str, user_text: &str, assistant_text: &str) -> AppResult<()> {
        let key = Self::build_key(user_id);
        let entries = vec![
            serde_json::to_string(&ConversationTurn::user(user_text))?,
            serde_json::to_string(&ConversationTurn::assistant(assistant_text))?,
        ];
        let keep_from = -isize::try_from(self.max_turns).unwrap_or(isize::MAX);

        let mut conn = self.manager.clone();
        redis::pipe()
            .atomic()
            .rpush(&key, &entries)
            .ignore()
            .ltrim(&key, keep_from, -1)
            .ignore()
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| {
                error!("Redis history append failed: {}", e);
                AppError::from(e)
            })
    }

    async fn clear(&self, user_id: &str) -> AppResult<()> {
        let mut conn = self.manager.clone();
        let _: () = conn.del(Self::build_key(user_id)).await.map_err(|e| {
            error!("Redis DEL operation failed: {}", e);
            AppError::from(e)
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_namespaced() {
        assert_eq!(
            RedisConversationStore::build_key("42"),
            "text2sql:history:42"
        );
    }

    #[tokio::test]
    async fn test_connect_requires_url() {
        let error = RedisConversationStore::connect(&HistoryStoreConfig::default())
            .await
            .err()
            .unwrap();
        assert_eq!(error.code, crate::errors::ErrorCode::ConfigError);
    }
}
