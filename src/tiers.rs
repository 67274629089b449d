use crate::config::Config;
use crate::dispatch::{HostedProvider, Provider};

/// Static descriptive metadata for one tier.
#[derive(Debug, PartialEq, Eq)]
pub struct TierDefinition {
    pub number: u8,
    pub label: &'static str,
    pub badge: &'static str,
    pub explanation: &'static str,
    /// Backends this tier may dispatch to. Empty for the narrative-only tier.
    pub providers: &'static [Provider],
}

pub const TIERS: [TierDefinition; 4] = [
    TierDefinition {
        number: 1,
        label: "Open Model — No Guidance",
        badge: "No guardrails",
        explanation: "This tier shows what happens when you send a sensitive mental health \
            prompt to a raw open-source model with zero guidance. The model has minimal safety \
            instructions and may produce unhelpful or harmful responses.",
        providers: &[Provider::Ollama],
    },
    TierDefinition {
        number: 2,
        label: "Open Model — Prompt Engineered",
        badge: "System prompt only",
        explanation: "Same open-source model, but now with a basic system prompt that asks it \
            to be friendly, empathetic, and suggest professional help. Shows what a simple, \
            non-specialized prompt can (and can't) do.",
        providers: &[Provider::Ollama],
    },
    TierDefinition {
        number: 3,
        label: "Consumer App Simulation",
        badge: "RLHF + safety training + system prompt + user context",
        explanation: "A frontier commercial model (Claude or GPT) with RLHF safety training, \
            a detailed system prompt, and simulated user context. Demonstrates how model \
            training + prompt engineering + user history work together.",
        providers: &[
            Provider::Hosted(HostedProvider::Anthropic),
            Provider::Hosted(HostedProvider::OpenAi),
        ],
    },
    TierDefinition {
        number: 4,
        label: "Purpose-Built Mental Health App",
        badge: "Clinical engineering + evidence-based protocols",
        explanation: "Purpose-built mental health apps like Wysa or Woebot go beyond general \
            AI. They use clinical input, evidence-based therapeutic frameworks, structured \
            safety protocols, and peer-reviewed validation.",
        providers: &[],
    },
];

pub fn tier(number: u8) -> Option<&'static TierDefinition> {
    TIERS.iter().find(|t| t.number == number)
}

/// Display name of the model behind a provider, e.g. `mistral:7b-instruct · running locally`.
pub fn model_label(config: &Config, provider: Provider) -> String {
    match provider {
        Provider::Ollama => format!("{} · running locally", config.ollama.model),
        Provider::Hosted(HostedProvider::Anthropic) => {
            format!("{} · Anthropic API", config.anthropic.model)
        }
        Provider::Hosted(HostedProvider::OpenAi) => {
            format!("{} · OpenAI API", config.openai.model)
        }
    }
}
