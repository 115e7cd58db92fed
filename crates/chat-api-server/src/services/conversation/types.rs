use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::ConversationConfig;
use crate::models::chat::ChatMessage;

/// Stored turns of one user, oldest first
#[derive(Debug, Clone)]
pub struct Conversation {
    turns: VecDeque<ChatMessage>,

    /// First message from this user
    created_at: Instant,

    /// Last append; drives idle expiration
    pub last_activity: Instant,
}

impl Conversation {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            turns: VecDeque::new(),
            created_at: now,
            last_activity: now,
        }
    }

    /// Append a turn, then drop the oldest turns beyond `cap`.
    /// Returns how many turns were dropped.
    pub fn push(&mut self, turn: ChatMessage, cap: Option<usize>) -> usize {
        self.turns.push_back(turn);
        self.last_activity = Instant::now();

        let Some(cap) = cap else {
            return 0;
        };

        let overflow = self.turns.len().saturating_sub(cap);
        self.turns.drain(..overflow);
        overflow
    }

    /// Last `n` turns in original order
    pub fn recent(&self, n: usize) -> Vec<ChatMessage> {
        let skip = self.turns.len().saturating_sub(n);
        self.turns.iter().skip(skip).cloned().collect()
    }

    pub fn turn_count(&self) -> usize {
        self.turns.len()
    }

    /// Time since the conversation was started
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

/// How long, and how much, history is kept in memory.
/// The default keeps everything for the life of the process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub max_stored_turns: Option<usize>,
    pub idle_ttl: Option<Duration>,
}

impl RetentionPolicy {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn is_expired(&self, conversation: &Conversation) -> bool {
        match self.idle_ttl {
            Some(ttl) => conversation.last_activity.elapsed() > ttl,
            None => false,
        }
    }
}

impl From<&ConversationConfig> for RetentionPolicy {
    fn from(cfg: &ConversationConfig) -> Self {
        Self {
            max_stored_turns: cfg.max_stored_turns,
            idle_ttl: cfg.idle_ttl_seconds.map(Duration::from_secs),
        }
    }
}
