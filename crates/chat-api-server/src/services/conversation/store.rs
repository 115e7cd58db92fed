use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::models::chat::ChatMessage;
use super::types::{Conversation, RetentionPolicy};

/// Per-user conversation history.
///
/// Each call is atomic for its user, but nothing orders two overlapping
/// requests for the same user: their turns may interleave.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Add `turn` at the end of the user's history, creating it if absent
    async fn append(&self, user_id: &str, turn: ChatMessage);

    /// Last `n` turns in original order; empty for unknown users
    async fn recent(&self, user_id: &str, n: usize) -> Vec<ChatMessage>;

    /// Number of tracked conversations
    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop idle conversations, returning how many were removed
    async fn cleanup_expired(&self) -> usize;
}

/// Thread-safe in-memory conversation store.
/// Uses DashMap for sharded concurrent access; contents are lost on restart.
#[derive(Clone)]
pub struct InMemoryConversationStore {
    /// user_id -> Conversation
    storage: Arc<DashMap<String, Conversation>>,
    policy: RetentionPolicy,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::with_policy(RetentionPolicy::unbounded())
    }

    pub fn with_policy(policy: RetentionPolicy) -> Self {
        info!(
            max_stored_turns = ?policy.max_stored_turns,
            idle_ttl = ?policy.idle_ttl,
            "Initializing in-memory conversation store"
        );
        Self {
            storage: Arc::new(DashMap::new()),
            policy,
        }
    }
}

impl Default for InMemoryConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn append(&self, user_id: &str, turn: ChatMessage) {
        let mut conversation = self
            .storage
            .entry(user_id.to_owned())
            .or_insert_with(|| {
                debug!(user_id, "Starting new conversation");
                Conversation::new()
            });

        if self.policy.is_expired(&conversation) {
            debug!(user_id, "Conversation idle past TTL, starting fresh");
            *conversation = Conversation::new();
        }

        let dropped = conversation.push(turn, self.policy.max_stored_turns);
        if dropped > 0 {
            debug!(user_id, dropped, "Trimmed stored history to retention cap");
        }
    }

    async fn recent(&self, user_id: &str, n: usize) -> Vec<ChatMessage> {
        let Some(conversation) = self.storage.get(user_id) else {
            return Vec::new();
        };

        // Lazy deletion
        if self.policy.is_expired(&conversation) {
            drop(conversation); // Release read lock
            self.storage
                .remove_if(user_id, |_, conv| self.policy.is_expired(conv));
            debug!(user_id, "Conversation expired, removed from store");
            return Vec::new();
        }

        debug!(
            user_id,
            turns = conversation.turn_count(),
            age_secs = conversation.age().as_secs(),
            "Conversation hit"
        );

        conversation.recent(n)
    }

    async fn len(&self) -> usize {
        self.storage.len()
    }

    async fn cleanup_expired(&self) -> usize {
        if self.policy.idle_ttl.is_none() {
            return 0;
        }

        let start_len = self.storage.len();
        self.storage.retain(|_, conv| !self.policy.is_expired(conv));
        let count = start_len.saturating_sub(self.storage.len());

        if count > 0 {
            info!("Cleaned up {} idle conversations", count);
        }

        count
    }
}
