pub mod anthropic;
pub mod http;
pub mod ollama;
pub mod openai;
pub mod retry;

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::stream::{BoxStream, Fuse};
use futures_util::{Stream, StreamExt};

use crate::error::TierError;

/// Hosted chat APIs selectable for the commercial tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HostedProvider {
    Anthropic,
    OpenAi,
}

impl HostedProvider {
    pub const ALL: [HostedProvider; 2] = [HostedProvider::Anthropic, HostedProvider::OpenAi];

    pub fn name(self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
        }
    }

    pub fn env_prefix(self) -> &'static str {
        match self {
            Self::Anthropic => "ANTHROPIC",
            Self::OpenAi => "OPENAI",
        }
    }

    /// Short label shown in the provider picker.
    pub fn label(self) -> &'static str {
        match self {
            Self::Anthropic => "Claude",
            Self::OpenAi => "GPT",
        }
    }
}

/// Every backend a request can be dispatched to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Provider {
    Ollama,
    Hosted(HostedProvider),
}

impl Provider {
    pub fn name(self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::Hosted(hosted) => hosted.name(),
        }
    }
}

impl From<HostedProvider> for Provider {
    fn from(hosted: HostedProvider) -> Self {
        Self::Hosted(hosted)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One user-initiated send. Consumed by a single adapter invocation.
#[derive(Clone, Debug)]
pub struct ChatRequest {
    pub prompt: String,
    /// `None` sends the user message alone, with no system/instruction text.
    pub system_prompt: Option<String>,
}

impl ChatRequest {
    pub fn new(prompt: impl Into<String>, system_prompt: Option<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt,
        }
    }

    /// Role-tagged message list shared by the chat-style wire formats.
    pub(crate) fn messages(&self, inline_system: bool) -> Vec<serde_json::Value> {
        let mut messages = Vec::with_capacity(2);
        if inline_system && let Some(system) = &self.system_prompt {
            messages.push(serde_json::json!({"role": "system", "content": system}));
        }
        messages.push(serde_json::json!({"role": "user", "content": self.prompt}));
        messages
    }
}

/// Text fragments from one in-flight response, in emission order.
///
/// Forward-only and single-use: once it has returned `None` (or an error),
/// further polls keep returning `None`. The underlying HTTP response is owned
/// by the stream, so dropping it at any point releases the connection.
pub struct TokenStream {
    provider: Provider,
    inner: Fuse<BoxStream<'static, Result<String, TierError>>>,
}

impl TokenStream {
    pub fn new<S>(provider: Provider, stream: S) -> Self
    where
        S: Stream<Item = Result<String, TierError>> + Send + 'static,
    {
        Self {
            provider,
            inner: stream.boxed().fuse(),
        }
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// Drain the remaining fragments into one string.
    pub async fn collect_text(mut self) -> Result<String, TierError> {
        let mut text = String::new();
        while let Some(fragment) = self.next().await {
            text.push_str(&fragment?);
        }
        Ok(text)
    }
}

impl Stream for TokenStream {
    type Item = Result<String, TierError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl fmt::Debug for TokenStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenStream")
            .field("provider", &self.provider)
            .field("terminated", &self.inner.is_done())
            .finish()
    }
}
