// ABOUTME: In-memory conversation store backed by a sharded concurrent map
// ABOUTME: Append and eviction happen under one shard lock per user
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::collections::VecDeque;

use async_trait::async_trait;
use dashmap::DashMap;
use text2sql_core::constants::history;
use text2sql_core::models::ConversationTurn;

use super::ConversationStore;
use crate::errors::AppResult;

/// Process-lifetime history store
///
/// Entries are created lazily on first append. The `DashMap` entry guard
/// holds the shard lock for the whole push-and-evict, so concurrent appends
/// for one user can never observe more than `max_turns` turns.
#[derive(Debug)]
pub struct InMemoryConversationStore {
    turns: DashMap<String, VecDeque<ConversationTurn>>,
    max_turns: usize,
}

impl Default for InMemoryConversationStore {
    fn default() -> Self {
        Self::new(history::DEFAULT_MAX_PAIRS)
    }
}

impl InMemoryConversationStore {
    /// Create a store retaining `max_pairs` (user, assistant) pairs per user
    #[must_use]
    pub fn new(max_pairs: usize) -> Self {
        Self {
            turns: DashMap::new(),
            max_turns: max_pairs.max(1) * 2,
        }
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, user_id: &str) -> Vec<ConversationTurn> {
        self.turns
            .get(user_id)
            .map(|turns| turns.iter().cloned().collect())
            .unwrap_or_default()
    }

    async fn append(&self, user_id: &str, user_text: &str, assistant_text: &str) -> AppResult<()> {
        let mut entry = self.turns.entry(user_id.to_owned()).or_default();
        entry.push_back(ConversationTurn::user(user_text));
        entry.push_back(ConversationTurn::assistant(assistant_text));
        while entry.len() > self.max_turns {
            entry.pop_front();
        }
        Ok(())
    }

    async fn clear(&self, user_id: &str) -> AppResult<()> {
        self.turns.remove(user_id);
        Ok(())
    }
}
