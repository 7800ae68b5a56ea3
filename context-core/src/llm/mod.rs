//! LLM chat clients for the answer step
//!
//! Provides a `ChatModel` trait with implementations for:
//! - **OpenAI**: `/chat/completions`
//! - **Anthropic**: `/v1/messages`
//! - **Google**: Gemini `:generateContent`
//!
//! The provider is chosen once at startup from `[llm] provider`; an unknown
//! name is rejected before any client is built.

pub mod anthropic;
pub mod google;
pub mod openai;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{LlmConfig, ProviderConfig};
use crate::error::ContextError;

pub use anthropic::AnthropicChatClient;
pub use google::GoogleChatClient;
pub use openai::OpenAiChatClient;

// ============================================================================
// ChatModel trait
// ============================================================================

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send `prompt` as a single user message and return the text reply.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;

    fn provider(&self) -> LlmProvider;

    fn model(&self) -> &str;
}

// ============================================================================
// Error types
// ============================================================================

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} API error ({code}): {message}")]
    Api {
        provider: LlmProvider,
        code: u16,
        message: String,
    },

    #[error("Missing API key for {0}")]
    MissingApiKey(LlmProvider),

    #[error("{0} returned no text")]
    EmptyResponse(LlmProvider),
}

// ============================================================================
// Provider selection
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAi,
    Anthropic,
    Google,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "openai",
            LlmProvider::Anthropic => "anthropic",
            LlmProvider::Google => "google",
        }
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LlmProvider {
    type Err = ContextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(LlmProvider::OpenAi),
            "anthropic" => Ok(LlmProvider::Anthropic),
            "google" => Ok(LlmProvider::Google),
            other => Err(ContextError::UnsupportedProvider {
                kind: "LLM",
                name: other.to_string(),
            }),
        }
    }
}

// ============================================================================
// Client settings + factory
// ============================================================================

/// Everything a vendor client needs to issue a completion.
#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
}

impl ChatSettings {
    pub fn from_config(config: &LlmConfig, provider: &ProviderConfig) -> Self {
        Self {
            api_key: provider.api_key.clone(),
            model: provider.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout_seconds: config.timeout_seconds,
        }
    }
}

pub(crate) fn http_client(settings: &ChatSettings) -> Result<reqwest::Client, LlmError> {
    Ok(reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(settings.timeout_seconds))
        .build()?)
}

/// Build the chat client selected by `config.provider`.
///
/// Fails with `UnsupportedProvider` for an unknown name and with
/// `MissingApiKey` when the selected vendor has no key; neither touches the
/// network.
pub fn create_chat_model(config: &LlmConfig) -> Result<Box<dyn ChatModel>, ContextError> {
    let provider: LlmProvider = config.provider.parse()?;
    let model = create_chat_model_for(provider, config)?;
    tracing::info!(provider = %provider, model = model.model(), "LLM client configured");
    Ok(model)
}

pub fn create_chat_model_for(
    provider: LlmProvider,
    config: &LlmConfig,
) -> Result<Box<dyn ChatModel>, LlmError> {
    let model: Box<dyn ChatModel> = match provider {
        LlmProvider::OpenAi => {
            let settings = ChatSettings::from_config(config, &config.openai);
            Box::new(match &config.openai.base_url {
                Some(url) => OpenAiChatClient::with_base_url(settings, url.clone())?,
                None => OpenAiChatClient::new(settings)?,
            })
        }
        LlmProvider::Anthropic => {
            let settings = ChatSettings::from_config(config, &config.anthropic);
            Box::new(match &config.anthropic.base_url {
                Some(url) => AnthropicChatClient::with_base_url(settings, url.clone())?,
                None => AnthropicChatClient::new(settings)?,
            })
        }
        LlmProvider::Google => {
            let settings = ChatSettings::from_config(config, &config.google);
            Box::new(match &config.google.base_url {
                Some(url) => GoogleChatClient::with_base_url(settings, url.clone())?,
                None => GoogleChatClient::new(settings)?,
            })
        }
    };
    Ok(model)
}


#[cfg(test)]
mod tests {
    use super::test_support::llm_config;
    use super::*;

    #[test]
    fn test_provider_parsing_is_case_insensitive() {
        assert_eq!("OpenAI".parse::<LlmProvider>().unwrap(), LlmProvider::OpenAi);
        assert_eq!(" anthropic ".parse::<LlmProvider>().unwrap(), LlmProvider::Anthropic);
        assert_eq!("GOOGLE".parse::<LlmProvider>().unwrap(), LlmProvider::Google);
    }

    #[test]
    fn test_unsupported_provider_fails_fast() {
        let config = llm_config("mistral");
        match create_chat_model(&config) {
            Err(ContextError::UnsupportedProvider { kind, name }) => {
                assert_eq!(kind, "LLM");
                assert_eq!(name, "mistral");
            }
            Err(e) => panic!("Expected UnsupportedProvider, got {}", e),
            Ok(_) => panic!("Expected UnsupportedProvider, got a client"),
        }
    }

    #[test]
    fn test_factory_builds_each_provider() {
        for (name, provider, model) in [
            ("openai", LlmProvider::OpenAi, "gpt-4o-mini"),
            ("anthropic", LlmProvider::Anthropic, "claude-3-haiku-20240307"),
            ("google", LlmProvider::Google, "gemini-2.0-flash"),
        ] {
            let client = create_chat_model(&llm_config(name)).unwrap();
            assert_eq!(client.provider(), provider);
            assert_eq!(client.model(), model);
        }
    }

    #[test]
    fn test_factory_rejects_missing_api_key() {
        let mut config = llm_config("anthropic");
        config.anthropic.api_key = String::new();
        match create_chat_model(&config) {
            Err(ContextError::Llm(LlmError::MissingApiKey(p))) => {
                assert_eq!(p, LlmProvider::Anthropic)
            }
            Err(e) => panic!("Expected MissingApiKey, got {}", e),
            Ok(_) => panic!("Expected MissingApiKey, got a client"),
        }
    }
}
