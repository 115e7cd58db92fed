use std::sync::Arc;
use anyhow::Result;
use axum::extract::FromRef;

use crate::config::{ServerConfig, Settings};
use crate::services::conversation::{
    ContextBuilder, ConversationManager, ConversationStore, InMemoryConversationStore,
    LlmProvider, RetentionPolicy,
};
use crate::services::LlmService;
use crate::utils::retry::RetryPolicy;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub conversation_manager: Arc<ConversationManager>,
    pub server: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(conversation_manager: Arc<ConversationManager>, server: ServerConfig) -> Self {
        Self {
            conversation_manager,
            server: Arc::new(server),
        }
    }

    /// Wire the production graph: OpenAI client, in-memory store, retry policy.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let llm_provider: Arc<dyn LlmProvider> = Arc::new(LlmService::new(settings.llm.clone())?);
        let store: Arc<dyn ConversationStore> = Arc::new(InMemoryConversationStore::with_policy(
            RetentionPolicy::from(&settings.conversation),
        ));

        let manager = ConversationManager::new(
            store,
            llm_provider,
            ContextBuilder::new(
                settings.prompts.system_prompt.clone(),
                settings.conversation.history_window,
            ),
            RetryPolicy::from(&settings.retry),
        );

        Ok(Self::new(Arc::new(manager), settings.server.clone()))
    }
}

impl FromRef<AppState> for Arc<ConversationManager> {
    fn from_ref(state: &AppState) -> Self {
        state.conversation_manager.clone()
    }
}

impl FromRef<AppState> for Arc<ServerConfig> {
    fn from_ref(state: &AppState) -> Self {
        state.server.clone()
    }
}
