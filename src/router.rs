use crate::config::Config;
use crate::dispatch::anthropic::AnthropicDispatch;
use crate::dispatch::ollama::OllamaDispatch;
use crate::dispatch::openai::OpenAiDispatch;
use crate::dispatch::retry::RetryPolicy;
use crate::dispatch::{ChatRequest, HostedProvider, Provider, TokenStream};
use crate::error::TierError;
use crate::health::{self, StartupStatus};
use crate::prompts::{TIER_2_SYSTEM_PROMPT, TIER_3_SYSTEM_PROMPT};

/// A dispatchable tier. Tier 4 is narrative only and has no route.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Route {
    /// Tier 1: local model, never given a system prompt.
    Raw,
    /// Tier 2: local model with a system prompt.
    Guided,
    /// Tier 3: hosted model chosen by the provider selector.
    Commercial(HostedProvider),
}

impl Route {
    /// Map a tier number and optional provider selector to a route.
    /// Returns `None` for combinations that cannot be dispatched.
    pub fn for_tier(tier: u8, selector: Option<HostedProvider>) -> Option<Self> {
        match (tier, selector) {
            (1, _) => Some(Self::Raw),
            (2, _) => Some(Self::Guided),
            (3, Some(p)) => Some(Self::Commercial(p)),
            _ => None,
        }
    }

    pub fn tier(self) -> u8 {
        match self {
            Self::Raw => 1,
            Self::Guided => 2,
            Self::Commercial(_) => 3,
        }
    }

    pub fn provider(self) -> Provider {
        match self {
            Self::Raw | Self::Guided => Provider::Ollama,
            Self::Commercial(p) => Provider::Hosted(p),
        }
    }

    /// System prompt actually sent for this route.
    pub fn system_prompt(self, override_prompt: Option<&str>) -> Option<String> {
        match self {
            Self::Raw => None,
            Self::Guided => Some(override_prompt.unwrap_or(TIER_2_SYSTEM_PROMPT).to_string()),
            Self::Commercial(_) => {
                Some(override_prompt.unwrap_or(TIER_3_SYSTEM_PROMPT).to_string())
            }
        }
    }
}

/// Owns one adapter per backend and dispatches requests by route.
pub struct Router {
    config: Config,
    ollama: OllamaDispatch,
    anthropic: AnthropicDispatch,
    openai: OpenAiDispatch,
}

impl Router {
    pub fn new(config: Config) -> Result<Self, TierError> {
        Ok(Self {
            ollama: OllamaDispatch::new(config.ollama.clone())?,
            anthropic: AnthropicDispatch::new(config.anthropic.clone())?,
            openai: OpenAiDispatch::new(config.openai.clone())?,
            config,
        })
    }

    /// Apply the same retry policy to every adapter.
    pub fn with_retry(self, retry: RetryPolicy) -> Self {
        Self {
            ollama: self.ollama.with_retry(retry),
            anthropic: self.anthropic.with_retry(retry),
            openai: self.openai.with_retry(retry),
            config: self.config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn ollama(&self) -> &OllamaDispatch {
        &self.ollama
    }

    pub async fn startup_status(&self) -> StartupStatus {
        health::validate_startup(&self.config, &self.ollama).await
    }

    /// Dispatch `prompt` for `route`. The connection is established (with
    /// retry) before this returns; fragments are pulled from the stream.
    pub async fn route(
        &self,
        route: Route,
        prompt: &str,
        system_override: Option<&str>,
    ) -> Result<TokenStream, TierError> {
        let req = ChatRequest::new(prompt, route.system_prompt(system_override));
        tracing::debug!(tier = route.tier(), provider = %route.provider(), "routing request");

        match route {
            Route::Raw | Route::Guided => self.ollama.stream_response(&req).await,
            Route::Commercial(HostedProvider::Anthropic) => {
                self.anthropic.stream_response(&req).await
            }
            Route::Commercial(HostedProvider::OpenAi) => self.openai.stream_response(&req).await,
        }
    }
}
