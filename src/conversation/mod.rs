// ABOUTME: Per-user conversation history abstraction with pluggable backends
// ABOUTME: Bounded FIFO of turns plus per-user request serialization
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Conversation Store
//!
//! History is a bounded FIFO of [`ConversationTurn`]s per `user_id`. Turns are
//! only ever appended in (user, assistant) pairs, so a store configured for
//! N pairs never holds more than 2×N turns. Reading never fails: an unknown
//! user, or a backend hiccup, yields an empty history.

/// Backend selection from configuration
pub mod factory;
/// Sharded in-memory store
pub mod memory;
/// Redis list store for multi-instance deployments
pub mod redis;

pub use factory::create_store;
pub use memory::InMemoryConversationStore;
pub use self::redis::RedisConversationStore;

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use text2sql_core::models::ConversationTurn;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::errors::AppResult;

/// Conversation store trait for pluggable backend implementations
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Backend name for logs and the health endpoint
    fn backend(&self) -> &'static str;

    /// Turns for a user, oldest first; empty for unknown users
    async fn get(&self, user_id: &str) -> Vec<ConversationTurn>;

    /// Append a (user, assistant) pair and evict the oldest pairs beyond capacity
    ///
    /// # Errors
    ///
    /// Returns an error if the backend write fails.
    async fn append(&self, user_id: &str, user_text: &str, assistant_text: &str) -> AppResult<()>;

    /// Remove all history for a user; clearing an empty history succeeds
    ///
    /// # Errors
    ///
    /// Returns an error if the backend delete fails.
    async fn clear(&self, user_id: &str) -> AppResult<()>;
}

/// One async mutex per `user_id`
///
/// Requests from the same user serialize on their slot so that
/// read-history, generate, append-history runs as one unit; different users
/// never contend.
#[derive(Debug, Default)]
pub struct UserLocks {
    slots: DashMap<String, Arc<Mutex<()>>>,
}

impl UserLocks {
    /// Create an empty lock table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to a user's conversation
    pub async fn acquire(&self, user_id: &str) -> OwnedMutexGuard<()> {
        let slot = self
            .slots
            .entry(user_id.to_owned())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        slot.lock_owned().await
    }

    /// Drop slots nobody holds or waits on
    pub fn prune(&self) {
        self.slots.retain(|_, slot| Arc::strong_count(slot) > 1);
    }

    /// Number of tracked users
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no user slot exists
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_user_serializes() {
        let locks = Arc::new(UserLocks::new());
        let guard = locks.acquire("u1").await;

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.acquire("u1").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn test_different_users_do_not_block() {
        let locks = UserLocks::new();
        let _a = locks.acquire("a").await;
        let b = tokio::time::timeout(Duration::from_millis(50), locks.acquire("b")).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_prune_keeps_held_slots() {
        let locks = UserLocks::new();
        let held = locks.acquire("held").await;
        drop(locks.acquire("released").await);
        locks.prune();
        assert_eq!(locks.len(), 1);
        drop(held);
        locks.prune();
        assert!(locks.is_empty());
    }
}
