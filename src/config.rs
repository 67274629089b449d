use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::dispatch::{HostedProvider, Provider};

pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "mistral:7b-instruct";
pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-5-20250929";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-5.2";

const DEFAULT_MAX_TOKENS: u32 = 400;
const DEFAULT_OLLAMA_TIMEOUT_SECS: u64 = 60;
const DEFAULT_HOSTED_TIMEOUT_SECS: u64 = 30;

/// API credential. Redacted under `Debug` and `Display`; the raw value is only
/// reachable through [`ApiKey::expose`] at the point a request is built.
pub struct ApiKey(SecretString);

impl ApiKey {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(SecretString::new(raw.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl Clone for ApiKey {
    fn clone(&self) -> Self {
        Self::new(self.expose())
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey([REDACTED])")
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Settings for the local Ollama service (`OLLAMA_*`).
#[derive(Clone, Debug)]
pub struct OllamaConfig {
    pub host: String,
    pub model: String,
    pub num_predict: u32,
    /// Connection timeout. Does not bound total stream duration.
    pub timeout: Duration,
}

/// Settings for a hosted chat API (`ANTHROPIC_*` or `OPENAI_*`).
#[derive(Clone, Debug)]
pub struct HostedConfig {
    pub provider: HostedProvider,
    pub base_url: String,
    pub api_key: Option<ApiKey>,
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl HostedConfig {
    pub fn has_key(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Per-provider settings, resolved once at startup and shared read-only.
#[derive(Clone, Debug)]
pub struct Config {
    pub ollama: OllamaConfig,
    pub anthropic: HostedConfig,
    pub openai: HostedConfig,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Resolve every provider from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let config = Config {
            ollama: OllamaConfig::from_lookup(&lookup),
            anthropic: HostedConfig::from_lookup(HostedProvider::Anthropic, &lookup),
            openai: HostedConfig::from_lookup(HostedProvider::OpenAi, &lookup),
        };

        for hosted in [&config.anthropic, &config.openai] {
            if !hosted.has_key() {
                tracing::warn!(
                    "{}_API_KEY not set, {} unavailable",
                    hosted.provider.env_prefix(),
                    hosted.provider.name()
                );
            }
        }

        config
    }

    pub fn hosted(&self, provider: HostedProvider) -> &HostedConfig {
        match provider {
            HostedProvider::Anthropic => &self.anthropic,
            HostedProvider::OpenAi => &self.openai,
        }
    }

    /// Whether a credential is configured. The local service never needs one.
    pub fn has_key(&self, provider: Provider) -> bool {
        match provider {
            Provider::Ollama => true,
            Provider::Hosted(hosted) => self.hosted(hosted).has_key(),
        }
    }
}

impl OllamaConfig {
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            host: string_or(&lookup, "OLLAMA_HOST", DEFAULT_OLLAMA_HOST),
            model: string_or(&lookup, "OLLAMA_MODEL", DEFAULT_OLLAMA_MODEL),
            num_predict: parse_or(&lookup, "OLLAMA_NUM_PREDICT", DEFAULT_MAX_TOKENS),
            timeout: Duration::from_secs(parse_or(
                &lookup,
                "OLLAMA_TIMEOUT",
                DEFAULT_OLLAMA_TIMEOUT_SECS,
            )),
        }
    }
}

impl HostedConfig {
    pub fn from_lookup(
        provider: HostedProvider,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let prefix = provider.env_prefix();
        let (default_url, default_model) = match provider {
            HostedProvider::Anthropic => (DEFAULT_ANTHROPIC_BASE_URL, DEFAULT_ANTHROPIC_MODEL),
            HostedProvider::OpenAi => (DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_MODEL),
        };

        // Empty strings are treated as absent: a blank line in .env is not a key.
        let api_key = lookup(&format!("{prefix}_API_KEY"))
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .map(ApiKey::new);

        Self {
            provider,
            base_url: string_or(&lookup, &format!("{prefix}_BASE_URL"), default_url),
            api_key,
            model: string_or(&lookup, &format!("{prefix}_MODEL"), default_model),
            max_tokens: parse_or(&lookup, &format!("{prefix}_MAX_TOKENS"), DEFAULT_MAX_TOKENS),
            timeout: Duration::from_secs(parse_or(
                &lookup,
                &format!("{prefix}_TIMEOUT"),
                DEFAULT_HOSTED_TIMEOUT_SECS,
            )),
        }
    }
}

fn string_or(lookup: impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_or<T>(lookup: impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Copy + fmt::Display,
{
    match lookup(key) {
        Some(raw) => match raw.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!("invalid value for {key}: {raw:?}, using default {default}");
                default
            }
        },
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_set() {
        let config = Config::from_lookup(|_| None);

        assert_eq!(config.ollama.host, "http://localhost:11434");
        assert_eq!(config.ollama.model, DEFAULT_OLLAMA_MODEL);
        assert_eq!(config.ollama.num_predict, 400);
        assert_eq!(config.ollama.timeout, Duration::from_secs(60));
        assert_eq!(config.anthropic.max_tokens, 400);
        assert_eq!(config.anthropic.timeout, Duration::from_secs(30));
        assert_eq!(config.openai.model, DEFAULT_OPENAI_MODEL);
        assert!(config.anthropic.api_key.is_none());
        assert!(!config.has_key(Provider::Hosted(HostedProvider::OpenAi)));
        assert!(config.has_key(Provider::Ollama));
    }

    #[test]
    fn prefixed_values_override_defaults() {
        let config = Config::from_lookup(lookup_from(&[
            ("OLLAMA_HOST", "http://gpu-box:11434"),
            ("OLLAMA_MODEL", "llama3"),
            ("OLLAMA_NUM_PREDICT", "128"),
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_MAX_TOKENS", "50"),
            ("ANTHROPIC_TIMEOUT", "5"),
        ]));

        assert_eq!(config.ollama.host, "http://gpu-box:11434");
        assert_eq!(config.ollama.model, "llama3");
        assert_eq!(config.ollama.num_predict, 128);
        assert_eq!(config.openai.max_tokens, 50);
        assert_eq!(config.anthropic.timeout, Duration::from_secs(5));
        assert!(config.has_key(Provider::Hosted(HostedProvider::OpenAi)));
        assert!(!config.has_key(Provider::Hosted(HostedProvider::Anthropic)));
    }

    #[test]
    fn invalid_numbers_fall_back() {
        let config = Config::from_lookup(lookup_from(&[("OLLAMA_NUM_PREDICT", "lots")]));
        assert_eq!(config.ollama.num_predict, 400);
    }

    #[test]
    fn blank_key_is_absent() {
        let config = Config::from_lookup(lookup_from(&[("ANTHROPIC_API_KEY", "   ")]));
        assert!(!config.anthropic.has_key());
    }

    #[test]
    fn api_key_never_prints_raw_value() {
        let key = ApiKey::new("sk-very-secret");
        assert_eq!(key.to_string(), "[REDACTED]");
        assert!(!format!("{key:?}").contains("sk-very-secret"));
        assert_eq!(key.expose(), "sk-very-secret");

        let config = Config::from_lookup(lookup_from(&[("OPENAI_API_KEY", "sk-very-secret")]));
        assert!(!format!("{config:?}").contains("sk-very-secret"));
    }
}
