use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::models::chat::ChatMessage;
use crate::utils::error::LlmError;
use crate::utils::retry::{call_with_retry, RetryPolicy};

use super::context_builder::ContextBuilder;
use super::store::ConversationStore;

/// Trait for the upstream chat model
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Single completion attempt over the full prompt; returns the reply text
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError>;
}

pub struct ConversationManager {
    store: Arc<dyn ConversationStore>,
    context_builder: ContextBuilder,
    llm_provider: Arc<dyn LlmProvider>,
    retry_policy: RetryPolicy,
}

impl ConversationManager {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        llm_provider: Arc<dyn LlmProvider>,
        context_builder: ContextBuilder,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            store,
            context_builder,
            llm_provider,
            retry_policy,
        }
    }

    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    /// Record the user's message, ask the model for a reply over the recent
    /// window, and record the reply.
    ///
    /// The user turn stays stored even when the upstream call fails, so a
    /// client that resubmits will see its message twice in history.
    pub async fn handle_message(&self, user_id: &str, message: String) -> Result<String, LlmError> {
        let start_time = Instant::now();

        self.store.append(user_id, ChatMessage::user(message)).await;

        let history = self
            .store
            .recent(user_id, self.context_builder.history_window())
            .await;
        let messages = self.context_builder.build(&history);

        debug!(user_id, prompt_messages = messages.len(), "Calling upstream model");

        let provider = self.llm_provider.as_ref();
        let prompt = messages.as_slice();
        let result = call_with_retry(&self.retry_policy, move || provider.complete(prompt)).await;

        let elapsed_ms = u64::try_from(start_time.elapsed().as_millis()).unwrap_or(u64::MAX);

        match result {
            Ok(reply) => {
                self.store
                    .append(user_id, ChatMessage::assistant(reply.clone()))
                    .await;

                info!(
                    user_id,
                    reply_len = reply.len(),
                    elapsed_ms,
                    "Chat completed"
                );
                Ok(reply)
            }
            Err(e) => {
                warn!(
                    user_id,
                    rate_limited = e.is_rate_limit(),
                    elapsed_ms,
                    "Chat failed: {}",
                    e
                );
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::Role;
    use crate::services::conversation::InMemoryConversationStore;
    use std::sync::Mutex;

    fn manager_with(provider: MockLlmProvider) -> (ConversationManager, Arc<InMemoryConversationStore>) {
        let store = Arc::new(InMemoryConversationStore::new());
        let manager = ConversationManager::new(
            store.clone(),
            Arc::new(provider),
            ContextBuilder::new("SYSTEM", 10),
            RetryPolicy::default(),
        );
        (manager, store)
    }

    #[tokio::test]
    async fn test_first_message_has_no_prior_context() {
        let mut provider = MockLlmProvider::new();
        provider
            .expect_complete()
            .withf(|messages| {
                messages.to_vec() == vec![ChatMessage::system("SYSTEM"), ChatMessage::user("hello")]
            })
            .times(1)
            .returning(|_| Ok("hi!".to_string()));

        let (manager, store) = manager_with(provider);
        let reply = manager.handle_message("u1", "hello".to_string()).await.unwrap();

        assert_eq!(reply, "hi!");
        assert_eq!(
            store.recent("u1", 10).await,
            vec![ChatMessage::user("hello"), ChatMessage::assistant("hi!")]
        );
    }

    #[tokio::test]
    async fn test_prompt_is_bounded_and_chronological() {
        let prompts: Arc<Mutex<Vec<Vec<ChatMessage>>>> = Arc::new(Mutex::new(Vec::new()));
        let recorded = prompts.clone();

        let mut provider = MockLlmProvider::new();
        provider.expect_complete().times(12).returning(move |messages| {
            recorded.lock().unwrap().push(messages.to_vec());
            let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
            Ok(format!("reply to {}", last))
        });

        let (manager, _store) = manager_with(provider);
        for i in 0..12 {
            manager.handle_message("u1", format!("msg {}", i)).await.unwrap();
        }

        let prompts = prompts.lock().unwrap();
        for prompt in prompts.iter() {
            assert!(prompt.len() <= 11);
            assert_eq!(prompt[0], ChatMessage::system("SYSTEM"));
            assert_eq!(prompt.iter().filter(|m| m.role == Role::System).count(), 1);
        }

        // 23 turns stored before the 12th call; the window keeps the last 10
        let last = prompts.last().unwrap();
        assert_eq!(last.len(), 11);
        assert_eq!(last[1], ChatMessage::assistant("reply to msg 6"));
        assert_eq!(last[2], ChatMessage::user("msg 7"));
        assert_eq!(last[9], ChatMessage::assistant("reply to msg 10"));
        assert_eq!(last[10], ChatMessage::user("msg 11"));
    }

    #[tokio::test]
    async fn test_upstream_error_keeps_user_turn_only() {
        let mut provider = MockLlmProvider::new();
        provider
            .expect_complete()
            .times(1)
            .returning(|_| Err(LlmError::Upstream("invalid_api_key".to_string())));

        let (manager, store) = manager_with(provider);
        let err = manager.handle_message("u1", "hello".to_string()).await.unwrap_err();

        assert_eq!(err, LlmError::Upstream("invalid_api_key".to_string()));
        assert_eq!(store.recent("u1", 10).await, vec![ChatMessage::user("hello")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_exhaustion_after_three_attempts() {
        let mut provider = MockLlmProvider::new();
        provider
            .expect_complete()
            .times(3)
            .returning(|_| Err(LlmError::RateLimited("slow down".to_string())));

        let (manager, store) = manager_with(provider);
        let err = manager.handle_message("u1", "hello".to_string()).await.unwrap_err();

        assert_eq!(err, LlmError::RateLimitExhausted { attempts: 3 });
        assert_eq!(store.recent("u1", 10).await.len(), 1);
    }

    #[tokio::test]
    async fn test_users_do_not_share_history() {
        let prompts: Arc<Mutex<Vec<Vec<ChatMessage>>>> = Arc::new(Mutex::new(Vec::new()));
        let recorded = prompts.clone();

        let mut provider = MockLlmProvider::new();
        provider.expect_complete().times(2).returning(move |messages| {
            recorded.lock().unwrap().push(messages.to_vec());
            Ok("ok".to_string())
        });

        let (manager, _store) = manager_with(provider);
        manager.handle_message("u1", "my secret".to_string()).await.unwrap();
        manager.handle_message("u2", "hello".to_string()).await.unwrap();

        let prompts = prompts.lock().unwrap();
        assert_eq!(
            prompts[1],
            vec![ChatMessage::system("SYSTEM"), ChatMessage::user("hello")]
        );
    }
}
