use std::io;

use async_stream::try_stream;
use futures_util::{Stream, StreamExt, TryStreamExt};
use reqwest::{Client, Response};
use serde::Deserialize;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::io::StreamReader;

use crate::config::OllamaConfig;
use crate::dispatch::http::{build_client, join_url, send_checked};
use crate::dispatch::retry::RetryPolicy;
use crate::dispatch::{ChatRequest, Provider, TokenStream};
use crate::error::TierError;

const PROVIDER: &str = "ollama";

/// Longest NDJSON line accepted from the chat stream.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Local Ollama service: NDJSON chat streaming plus a readiness probe.
pub struct OllamaDispatch {
    client: Client,
    config: OllamaConfig,
    retry: RetryPolicy,
}

/// Result of probing the local service. `diagnostic` is empty when ready.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Readiness {
    pub ready: bool,
    pub diagnostic: String,
}

impl Readiness {
    fn ready() -> Self {
        Self {
            ready: true,
            diagnostic: String::new(),
        }
    }

    fn not_ready(diagnostic: String) -> Self {
        Self {
            ready: false,
            diagnostic,
        }
    }
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Deserialize)]
struct ModelTag {
    name: String,
}

/// One line of the `/api/chat` NDJSON stream.
#[derive(Deserialize)]
struct ChatChunk {
    message: Option<ChunkMessage>,
    #[serde(default)]
    done: bool,
    error: Option<String>,
}

#[derive(Deserialize)]
struct ChunkMessage {
    content: Option<String>,
}

impl OllamaDispatch {
    pub fn new(config: OllamaConfig) -> Result<Self, TierError> {
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

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    /// Lightweight liveness + model availability check against `/api/tags`.
    /// Never errors: every failure becomes a diagnostic.
    pub async fn check_ready(&self) -> Readiness {
        let url = join_url(&self.config.host, "/api/tags");
        let response = self
            .client
            .get(&url)
            .timeout(self.config.timeout)
            .send()
            .await
            .and_then(Response::error_for_status);

        let response = match response {
            Ok(r) => r,
            Err(e) if e.is_connect() => {
                return Readiness::not_ready(
                    "Ollama is not running. Start it with `ollama serve` in your terminal, \
                     then refresh."
                        .to_string(),
                );
            }
            Err(e) => return Readiness::not_ready(format!("Could not reach Ollama: {e}")),
        };

        let tags: TagsResponse = match response.json().await {
            Ok(tags) => tags,
            Err(e) => return Readiness::not_ready(format!("Could not reach Ollama: {e}")),
        };

        let names: Vec<String> = tags.models.into_iter().map(|m| m.name).collect();
        if model_available(&names, &self.config.model) {
            Readiness::ready()
        } else {
            let model = &self.config.model;
            Readiness::not_ready(format!(
                "Model `{model}` not found. Pull it with `ollama pull {model}`"
            ))
        }
    }

    pub async fn stream_response(&self, req: &ChatRequest) -> Result<TokenStream, TierError> {
        let body = serde_json::json!({
            "model": self.config.model,
            "messages": req.messages(true),
            "stream": true,
            "options": {"num_predict": self.config.num_predict},
        });
        let url = join_url(&self.config.host, "/api/chat");

        tracing::debug!(model = %self.config.model, "sending chat request to ollama");

        let response = self
            .retry
            .run(PROVIDER, || {
                send_checked(
                    self.client.post(&url).json(&body),
                    PROVIDER,
                    self.config.timeout,
                )
            })
            .await?;

        Ok(TokenStream::new(Provider::Ollama, ndjson_fragments(response)))
    }
}

/// Whether `wanted` is listed, allowing a `:tag` suffix on the listed name.
pub fn model_available(listed: &[String], wanted: &str) -> bool {
    listed.iter().any(|name| {
        name == wanted
            || name
                .strip_prefix(wanted)
                .is_some_and(|rest| rest.starts_with(':'))
    })
}

fn ndjson_fragments(response: Response) -> impl Stream<Item = Result<String, TierError>> + Send {
    try_stream! {
        let reader = StreamReader::new(response.bytes_stream().map_err(io::Error::other));
        let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_LINE_BYTES));
        let mut fragments = 0usize;
        let mut done = false;

        while let Some(line) = lines.next().await {
            let line = line.map_err(|e| match e {
                LinesCodecError::MaxLineLengthExceeded => {
                    stream_error(format!("line exceeds {MAX_LINE_BYTES} bytes"))
                }
                LinesCodecError::Io(e) => stream_error(e.to_string()),
            })?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            tracing::trace!("ollama line: {line}");

            let chunk: ChatChunk = serde_json::from_str(line).map_err(|e| TierError::SchemaParse {
                provider: PROVIDER.to_string(),
                message: format!("invalid chat line: {e}"),
            })?;

            if let Some(message) = chunk.error {
                Err::<(), _>(stream_error(message))?;
            }

            if let Some(text) = chunk.message.and_then(|m| m.content).filter(|t| !t.is_empty()) {
                fragments += 1;
                yield text;
            }

            // The connection may stay open after `done`; stop reading regardless.
            if chunk.done {
                done = true;
                break;
            }
        }

        if !done {
            Err::<(), _>(stream_error("connection closed before completion".to_string()))?;
        }
        tracing::debug!(fragments, "ollama stream finished");
    }
}

fn stream_error(message: String) -> TierError {
    TierError::Stream {
        provider: PROVIDER.to_string(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bare_name_matches_tagged_listing() {
        let listed = names(&["foo:7b", "bar"]);
        assert!(model_available(&listed, "foo"));
        assert!(model_available(&listed, "bar"));
        assert!(model_available(&listed, "foo:7b"));
    }

    #[test]
    fn prefix_without_colon_does_not_match() {
        let listed = names(&["foobar:latest"]);
        assert!(!model_available(&listed, "foo"));
        assert!(!model_available(&listed, "baz"));
    }

    #[test]
    fn chunk_without_message_parses() {
        let chunk: ChatChunk = serde_json::from_str(r#"{"done":true}"#).unwrap();
        assert!(chunk.done);
        assert!(chunk.message.is_none());
    }
}
