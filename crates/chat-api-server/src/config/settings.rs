use anyhow::{bail, Result};
use config::{builder::DefaultState, Config, ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};

use crate::services::conversation::ContextBuilder;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub retry: RetryConfig,
    pub conversation: ConversationConfig,
    pub prompts: PromptsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Returned by `GET /`
    pub banner: String,
    pub body_limit_bytes: usize,
    /// Send real 429/502 statuses instead of 200 for chat failures
    pub strict_status_codes: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub model: String,
    pub timeout_seconds: u64,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_jitter_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ConversationConfig {
    /// Stored turns sent upstream after the system prompt
    pub history_window: usize,
    /// Oldest turns are dropped past this many (unbounded when unset)
    pub max_stored_turns: Option<usize>,
    /// Conversations idle longer than this are evicted (never when unset)
    pub idle_ttl_seconds: Option<u64>,
    pub sweep_interval_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PromptsConfig {
    pub system_prompt: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// EnvFilter directives, overridden by RUST_LOG
    pub filter: String,
    pub json: bool,
}

impl Settings {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self::builder()?
            .add_source(File::with_name("config/settings").required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            // Plain deployment variables win over everything else
            .set_override_option("llm.api_key", std::env::var("OPENAI_API_KEY").ok())?
            .set_override_option("server.port", std::env::var("PORT").ok())?
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Builder pre-populated with every default, before any file or env source.
    pub fn builder() -> Result<ConfigBuilder<DefaultState>> {
        let builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8000)?
            .set_default("server.banner", "Chat Service is live!")?
            .set_default("server.body_limit_bytes", 1024 * 1024)?
            .set_default("server.strict_status_codes", false)?
            .set_default("llm.base_url", "https://api.openai.com")?
            .set_default("llm.api_key", "")?
            .set_default("llm.model", "gpt-4o-mini")?
            .set_default("llm.timeout_seconds", 60)?
            .set_default("retry.max_attempts", 3)?
            .set_default("retry.base_delay_ms", 1000)?
            .set_default("retry.max_jitter_ms", 1000)?
            .set_default("conversation.history_window", 10)?
            .set_default("conversation.sweep_interval_seconds", 300)?
            .set_default("prompts.system_prompt", ContextBuilder::default_system_prompt())?
            .set_default("logging.filter", "info,chat_api_server=debug")?
            .set_default("logging.json", true)?;

        Ok(builder)
    }

    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            bail!("retry.max_attempts must be at least 1");
        }

        if self.conversation.history_window == 0 {
            bail!("conversation.history_window must be at least 1");
        }

        if let Some(cap) = self.conversation.max_stored_turns {
            if cap < self.conversation.history_window {
                bail!(
                    "conversation.max_stored_turns ({}) must not be smaller than conversation.history_window ({})",
                    cap,
                    self.conversation.history_window
                );
            }
        }

        if self.conversation.idle_ttl_seconds.is_some() && self.conversation.sweep_interval_seconds == 0 {
            bail!("conversation.sweep_interval_seconds must be at least 1 when idle_ttl_seconds is set");
        }

        Ok(())
    }
}
