// ABOUTME: Conversation store factory for environment-based backend selection
// ABOUTME: Redis when REDIS_URL is set, otherwise the in-memory store
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;

use tracing::info;

use super::{ConversationStore, InMemoryConversationStore, RedisConversationStore};
use crate::config::HistoryStoreConfig;
use crate::errors::AppResult;

/// Create the configured conversation store
///
/// # Errors
///
/// Returns an error if Redis is configured but unreachable.
pub async fn create_store(config: &HistoryStoreConfig) -> AppResult<Arc<dyn ConversationStore>> {
    if config.redis_url.is_some() {
        let store = RedisConversationStore::connect(config).await?;
        store.health_check().await?;
        info!(
            "Using Redis conversation store (max {} pairs per user)",
            config.max_pairs
        );
        return Ok(Arc::new(store));
    }

    info!(
        "Using in-memory conversation store (max {} pairs per user)",
        config.max_pairs
    );
    Ok(Arc::new(InMemoryConversationStore::new(config.max_pairs)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_defaults_to_memory_backend() {
        let store = create_store(&HistoryStoreConfig::default()).await.unwrap();
        assert_eq!(store.backend(), "memory");
    }
}
