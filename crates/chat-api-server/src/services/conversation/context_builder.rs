use tracing::debug;
use crate::models::chat::ChatMessage;

/// Assembles the prompt sent upstream: the fixed system turn followed by
/// the most recent `history_window` stored turns.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    system_prompt: String,
    history_window: usize,
}

impl ContextBuilder {
    pub fn new(system_prompt: impl Into<String>, history_window: usize) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            history_window,
        }
    }

    pub fn history_window(&self) -> usize {
        self.history_window
    }

    pub fn default_system_prompt() -> String {
        r#"You are a customer support assistant for our company.

Your role is to help customers by:
- Answering questions about our products, services and team
- Explaining how to get in touch or make a payment when asked
- Being concise, friendly and accurate in your responses
- Admitting when you do not know something instead of guessing

Guidelines:
- Act professionally at all times
- Keep responses focused on the customer's question
- Never invent prices, account details or commitments"#.to_string()
    }

    /// `[system] + last history_window turns of history`, order preserved
    pub fn build(&self, history: &[ChatMessage]) -> Vec<ChatMessage> {
        let skip = history.len().saturating_sub(self.history_window);

        let mut messages = Vec::with_capacity(1 + history.len() - skip);
        messages.push(ChatMessage::system(self.system_prompt.clone()));
        messages.extend(history[skip..].iter().cloned());

        debug!(
            "Built prompt: 1 system + {} history turns ({} available)",
            messages.len() - 1,
            history.len()
        );

        messages
    }
}
