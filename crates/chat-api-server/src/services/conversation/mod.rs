//! Conversation memory management module
//!
//! Provides per-user conversation state with:
//! - A pluggable store (in-memory DashMap by default)
//! - Optional retention (turn cap, idle TTL)
//! - Bounded prompt assembly around a fixed system prompt

mod context_builder;
pub mod manager;
mod store;
mod sweeper;
pub mod types;

pub use context_builder::ContextBuilder;
pub use manager::{ConversationManager, LlmProvider};
pub use store::{ConversationStore, InMemoryConversationStore};
pub use sweeper::spawn_retention_sweeper;
pub use types::{Conversation, RetentionPolicy};

pub use crate::models::chat::ChatMessage;
