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

const PROVIDER: &str = "anthropic";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Messages API with `stream: true`.
pub struct AnthropicDispatch {
    client: Client,
    config: HostedConfig,
    retry: RetryPolicy,
}

#[derive(Deserialize)]
struct StreamEvent {
    #[serde(rename = "type")]
    event_type: String,
    delta: Option<Delta>,
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct Delta {
    #[serde(rename = "type")]
    delta_type: Option<String>,
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl AnthropicDispatch {
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
                message: "ANTHROPIC_API_KEY is not set".to_string(),
            })?;

        let mut body = serde_json::json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "messages": req.messages(false),
            "stream": true,
        });
        if let Some(system) = &req.system_prompt {
            body["system"] = serde_json::Value::String(system.clone());
        }
        let url = join_url(&self.config.base_url, "/v1/messages");

        tracing::debug!(model = %self.config.model, "sending messages request to anthropic");

        let response = self
            .retry
            .run(PROVIDER, || {
                let request = self
                    .client
                    .post(&url)
                    .header("x-api-key", api_key.expose())
                    .header("anthropic-version", ANTHROPIC_VERSION)
                    .json(&body);
                send_checked(request, PROVIDER, self.config.timeout)
            })
            .await?;

        Ok(TokenStream::new(
            HostedProvider::Anthropic.into(),
            sse_fragments(response),
        ))
    }
}

fn sse_fragments(response: Response) -> impl Stream<Item = Result<String, TierError>> + Send {
    try_stream! {
        let mut events = response.bytes_stream().eventsource();
        let mut fragments = 0usize;
        let mut stopped = false;

        while let Some(event) = events.next().await {
            let event = event.map_err(|e| TierError::Stream {
                provider: PROVIDER.to_string(),
                message: e.to_string(),
            })?;
            if event.data.trim().is_empty() {
                continue;
            }
            tracing::trace!("anthropic event: {}", event.data);

            let parsed: StreamEvent = serde_json::from_str(&event.data).map_err(|e| {
                TierError::SchemaParse {
                    provider: PROVIDER.to_string(),
                    message: format!("invalid stream event: {e}"),
                }
            })?;

            match parsed.event_type.as_str() {
                "content_block_delta" => {
                    let text = parsed
                        .delta
                        .filter(|d| d.delta_type.as_deref() == Some("text_delta"))
                        .and_then(|d| d.text)
                        .filter(|t| !t.is_empty());
                    if let Some(text) = text {
                        fragments += 1;
                        yield text;
                    }
                }
                "message_stop" => {
                    stopped = true;
                    break;
                }
                "error" => {
                    let message = parsed
                        .error
                        .map(|e| e.message)
                        .unwrap_or_else(|| "unknown stream error".to_string());
                    Err::<(), _>(TierError::Stream {
                        provider: PROVIDER.to_string(),
                        message,
                    })?;
                }
                // message_start, content_block_start/stop, message_delta, ping
                _ => {}
            }
        }

        if !stopped {
            Err::<(), _>(TierError::Stream {
                provider: PROVIDER.to_string(),
                message: "connection closed before message_stop".to_string(),
            })?;
        }
        tracing::debug!(fragments, "anthropic stream finished");
    }
}
