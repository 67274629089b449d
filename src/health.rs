use crate::config::Config;
use crate::dispatch::HostedProvider;
use crate::dispatch::ollama::OllamaDispatch;

/// Snapshot of backend prerequisites, recomputed on every check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StartupStatus {
    pub ollama_ready: bool,
    pub ollama_error: String,
    pub has_anthropic_key: bool,
    pub has_openai_key: bool,
}

/// Which hosted providers can be offered for the commercial tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostedOptions {
    /// No hosted provider has a key. Sending is disabled for the tier.
    None,
    Only(HostedProvider),
    Both,
}

impl HostedOptions {
    pub fn providers(self) -> Vec<HostedProvider> {
        match self {
            Self::None => vec![],
            Self::Only(p) => vec![p],
            Self::Both => HostedProvider::ALL.to_vec(),
        }
    }

    /// Keep `current` if it is offered, otherwise fall back to the first option.
    pub fn select(self, current: Option<HostedProvider>) -> Option<HostedProvider> {
        let offered = self.providers();
        match current {
            Some(p) if offered.contains(&p) => Some(p),
            _ => offered.first().copied(),
        }
    }
}

impl StartupStatus {
    pub fn has_key(&self, provider: HostedProvider) -> bool {
        match provider {
            HostedProvider::Anthropic => self.has_anthropic_key,
            HostedProvider::OpenAi => self.has_openai_key,
        }
    }

    pub fn hosted_options(&self) -> HostedOptions {
        match (self.has_anthropic_key, self.has_openai_key) {
            (true, true) => HostedOptions::Both,
            (true, false) => HostedOptions::Only(HostedProvider::Anthropic),
            (false, true) => HostedOptions::Only(HostedProvider::OpenAi),
            (false, false) => HostedOptions::None,
        }
    }

    /// User-facing warnings for every missing prerequisite.
    pub fn warnings(&self) -> Vec<String> {
        let mut msgs = Vec::new();
        if !self.ollama_ready && !self.ollama_error.is_empty() {
            msgs.push(self.ollama_error.clone());
        }
        for provider in HostedProvider::ALL {
            if !self.has_key(provider) {
                msgs.push(format!("{}_API_KEY not found.", provider.env_prefix()));
            }
        }
        msgs
    }
}

/// Probe the local service and check hosted credentials. No side effects.
pub async fn validate_startup(config: &Config, ollama: &OllamaDispatch) -> StartupStatus {
    let readiness = ollama.check_ready().await;
    let status = StartupStatus {
        ollama_ready: readiness.ready,
        ollama_error: readiness.diagnostic,
        has_anthropic_key: config.anthropic.has_key(),
        has_openai_key: config.openai.has_key(),
    };
    tracing::debug!(?status, "startup status");
    status
}
