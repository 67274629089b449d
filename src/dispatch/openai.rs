use async_stream::try_stream;
use eventsource_stream::Eventsource;
use futures_util::{Stream, StreamExt};
use reqwest::{Client, Response};
use serde::Deserialize;

use crate::config::HostedConfig;
use crate::dispatch::http::{build_client, join_url, send_checked};
use crate::dispatch::retry::RetryPolicy;
use crate::dispatch::{ChatRequest, HostedProvider, TokenStream};
use crate::error::TierError;

const PROVIDER: &str = "openai";

/// OpenAI chat completions with `stream: true`.
pub struct OpenAiDispatch {
    client: Client,
    config: HostedConfig,
    retry: RetryPolicy,
}

#[derive(Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<Choice>,
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct Choice {
    delta: Option<Delta>,
}

#[derive(Deserialize)]
struct Delta {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl OpenAiDispatch {
    pub fn new(config: HostedConfig) -> Result<Self, TierError> {
        Ok(Self {
            client: build_client(config.timeout)?,
            config,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &HostedConfig {
        &self.config
    }

    pub async fn stream_response(&self, req: &ChatRequest) -> Result<TokenStream, TierError> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| TierError::Unauthenticated {
                provider: PROVIDER.to_string(),
                message: "OPENAI_API_KEY is not set".to_string(),
            })?;

        let body = serde_json::json!({
            "model": self.config.model,
            "messages": req.messages(true),
            "max_completion_tokens": self.config.max_tokens,
            "stream": true,
        });
        let url = join_url(&self.config.base_url, "/v1/chat/completions");

        tracing::debug!(model = %self.config.model, "sending chat completion request to openai");

        let response = self
            .retry
            .run(PROVIDER, || {
                let request = self
                    .client
                    .post(&url)
                    .bearer_auth(api_key.expose())
                    .json(&body);
                send_checked(request, PROVIDER, self.config.timeout)
            })
            .await?;

        Ok(TokenStream::new(
            HostedProvider::OpenAi.into(),
            sse_fragments(response),
        ))
    }
}

fn sse_fragments(response: Response) -> impl Stream<Item = Result<String, TierError>> + Send {
    try_stream! {
        let mut events = response.bytes_stream().eventsource();
        let mut fragments = 0usize;
        let mut finished = false;

        while let Some(event) = events.next().await {
            let event = event.map_err(|e| TierError::Stream {
                provider: PROVIDER.to_string(),
                message: e.to_string(),
            })?;
            let data = event.data.trim();
            if data.is_empty() {
                continue;
            }
            if data == "[DONE]" {
                finished = true;
                break;
            }
            tracing::trace!("openai event: {data}");

            let chunk: ChatCompletionChunk = serde_json::from_str(data).map_err(|e| {
                TierError::SchemaParse {
                    provider: PROVIDER.to_string(),
                    message: format!("invalid stream chunk: {e}"),
                }
            })?;

            if let Some(error) = chunk.error {
                Err::<(), _>(TierError::Stream {
                    provider: PROVIDER.to_string(),
                    message: error.message,
                })?;
            }

            // Usage-only and role-only chunks carry no content delta.
            let text = chunk
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.delta)
                .and_then(|d| d.content)
                .filter(|t| !t.is_empty());
            if let Some(text) = text {
                fragments += 1;
                yield text;
            }
        }

        if !finished {
            Err::<(), _>(TierError::Stream {
                provider: PROVIDER.to_string(),
                message: "connection closed before [DONE]".to_string(),
            })?;
        }
        tracing::debug!(fragments, "openai stream finished");
    }
}
