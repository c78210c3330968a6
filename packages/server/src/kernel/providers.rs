//! LLM provider selection and the unified completion seam.
//!
//! Two providers are supported. Selection happens once per run through
//! `choose_provider`; the generation path retries once on the other
//! provider when the first returns nothing (the caller records whichever
//! provider actually produced the article).

use anthropic_client::{AnthropicClient, MessagesRequest};
use anyhow::{Context, Result};
use async_trait::async_trait;
use openai_client::{ChatRequest, Message, OpenAiClient};
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const OPENAI_MODEL: &str = "gpt-4o";
pub const ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";

// =============================================================================
// Provider identity and rotation
// =============================================================================

/// An LLM provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Openai,
    Anthropic,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Openai => "openai",
            Provider::Anthropic => "anthropic",
        }
    }

    pub fn other(&self) -> Provider {
        match self {
            Provider::Openai => Provider::Anthropic,
            Provider::Anthropic => Provider::Openai,
        }
    }
}

/// Per-website provider rotation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RotationMode {
    OpenaiOnly,
    AnthropicOnly,
    #[default]
    Rotate,
}

/// Pick the provider for this run. Rotate alternates against the last
/// provider used; with no history it is a coin flip. Returns None when no
/// usable key exists for the policy.
pub fn choose_provider(
    mode: RotationMode,
    last_api: Option<Provider>,
    openai_key: Option<&str>,
    anthropic_key: Option<&str>,
) -> Option<Provider> {
    let has_openai = openai_key.is_some_and(|k| !k.is_empty());
    let has_anthropic = anthropic_key.is_some_and(|k| !k.is_empty());

    match mode {
        RotationMode::OpenaiOnly => has_openai.then_some(Provider::Openai),
        RotationMode::AnthropicOnly => has_anthropic.then_some(Provider::Anthropic),
        RotationMode::Rotate => match (has_openai, has_anthropic) {
            (true, true) => Some(match last_api {
                Some(last) => last.other(),
                None => {
                    if rand::thread_rng().gen_bool(0.5) {
                        Provider::Openai
                    } else {
                        Provider::Anthropic
                    }
                }
            }),
            (true, false) => Some(Provider::Openai),
            (false, true) => Some(Provider::Anthropic),
            (false, false) => None,
        },
    }
}

// =============================================================================
// Completion seam
// =============================================================================

/// What a completion is for; selects sampling knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiPurpose {
    Article,
    Topics,
    Analysis,
}

/// Builds completion seams from a provider and a key. The orchestrator goes
/// through this so tests can substitute scripted AIs.
pub trait BaseAiFactory: Send + Sync {
    fn create(&self, provider: Provider, api_key: &str, purpose: AiPurpose) -> Box<dyn BaseAi>;
}

/// Production factory backed by the real provider clients.
pub struct ProviderAiFactory;

impl BaseAiFactory for ProviderAiFactory {
    fn create(&self, provider: Provider, api_key: &str, purpose: AiPurpose) -> Box<dyn BaseAi> {
        Box::new(match purpose {
            AiPurpose::Article => ProviderAi::for_article(provider, api_key),
            AiPurpose::Topics => ProviderAi::for_topics(provider, api_key),
            AiPurpose::Analysis => ProviderAi::for_analysis(provider, api_key),
        })
    }
}

/// Generic LLM completion: one system prompt, one user prompt, text back.
#[async_trait]
pub trait BaseAi: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

/// A provider bound to a key and sampling knobs.
pub struct ProviderAi {
    provider: Provider,
    api_key: String,
    temperature: f32,
    max_tokens: u32,
}

impl ProviderAi {
    /// Knobs for long-form article generation.
    pub fn for_article(provider: Provider, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            api_key: api_key.into(),
            temperature: 0.7,
            max_tokens: 4000,
        }
    }

    /// Knobs for topic brainstorming (hotter, shorter).
    pub fn for_topics(provider: Provider, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            api_key: api_key.into(),
            temperature: 0.8,
            max_tokens: 1500,
        }
    }

    /// Knobs for scan analysis (cold, structured).
    pub fn for_analysis(provider: Provider, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            api_key: api_key.into(),
            temperature: 0.3,
            max_tokens: 1000,
        }
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }
}

#[async_trait]
impl BaseAi for ProviderAi {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        match self.provider {
            Provider::Openai => {
                let client = OpenAiClient::new(&self.api_key);
                let response = client
                    .chat_completion(
                        ChatRequest::new(OPENAI_MODEL)
                            .message(Message::system(system))
                            .message(Message::user(user))
                            .temperature(self.temperature)
                            .max_tokens(self.max_tokens),
                    )
                    .await
                    .context("OpenAI completion failed")?;
                Ok(response.content)
            }
            Provider::Anthropic => {
                let client = AnthropicClient::new(&self.api_key);
                let response = client
                    .create_message(
                        MessagesRequest::new(ANTHROPIC_MODEL)
                            .system(system)
                            .user(user)
                            .temperature(self.temperature)
                            .max_tokens(self.max_tokens),
                    )
                    .await
                    .context("Anthropic completion failed")?;
                Ok(response.content)
            }
        }
    }
}
