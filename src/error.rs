use std::error::Error as StdError;
use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TierError {
    #[error("{provider} is not authenticated: {message}")]
    Unauthenticated { provider: String, message: String },

    #[error("{provider} is unreachable: {message}")]
    Unreachable { provider: String, message: String },

    #[error("rate limited by {provider}: {message}")]
    RateLimited { provider: String, message: String },

    #[error("upstream error from {provider}: {message}")]
    Upstream {
        provider: String,
        message: String,
        status: Option<u16>,
    },

    #[error("auth failed for {provider}: {message}")]
    AuthFailed { provider: String, message: String },

    #[error("schema parse error from {provider}: {message}")]
    SchemaParse { provider: String, message: String },

    #[error("stream from {provider} failed: {message}")]
    Stream { provider: String, message: String },

    #[error("{provider} did not respond: {message}")]
    Timeout { provider: String, message: String },

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),
}

impl TierError {
    /// Map a transport error from `send()` onto the taxonomy. Refused,
    /// reset and half-written connections all become `Unreachable`.
    pub fn from_send(provider: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                provider: provider.to_string(),
                message: error_chain(&err),
            }
        } else if err.is_connect() || err.is_request() || is_dropped_connection(&err) {
            Self::Unreachable {
                provider: provider.to_string(),
                message: error_chain(&err),
            }
        } else {
            Self::Request(err)
        }
    }

    /// Extract provider name from structured error variants.
    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::Unauthenticated { provider, .. }
            | Self::Unreachable { provider, .. }
            | Self::RateLimited { provider, .. }
            | Self::Upstream { provider, .. }
            | Self::AuthFailed { provider, .. }
            | Self::SchemaParse { provider, .. }
            | Self::Stream { provider, .. }
            | Self::Timeout { provider, .. } => Some(provider),
            Self::Request(_) => None,
        }
    }

    /// Returns true for transient errors that may succeed on retry.
    /// Only consulted while establishing a connection; mid-stream errors are
    /// never retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Unreachable { .. } | Self::RateLimited { .. } | Self::Timeout { .. } => true,
            // status: None = not from HTTP, treated as not retryable
            Self::Upstream { status, .. } => status.is_some_and(|s| s >= 500),
            Self::Request(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }

    /// Diagnostic suitable for showing inline next to a tier's output.
    pub fn user_message(&self) -> String {
        match self {
            Self::Unauthenticated { provider, message } => {
                format!("{provider} is not configured: {message}. Add the key to your .env file.")
            }
            Self::Unreachable { provider, message } if provider == "ollama" => {
                format!(
                    "could not connect to Ollama ({message}). \
                     Start it with `ollama serve`, then try again."
                )
            }
            Self::Unreachable { provider, message } => {
                format!("could not connect to {provider}: {message}")
            }
            Self::RateLimited { provider, .. } => {
                format!("rate limited by {provider}, try again shortly")
            }
            Self::Upstream {
                provider,
                message,
                status: Some(404),
            } if provider == "ollama" => {
                format!("Ollama rejected the request ({message}). Is the model pulled?")
            }
            Self::Upstream {
                provider, message, ..
            } => format!("upstream error from {provider}: {message}"),
            Self::AuthFailed { provider, message } => {
                format!("authentication failed for {provider}: {message}. Check the API key.")
            }
            Self::SchemaParse { provider, .. } => {
                format!("failed to parse the response from {provider}")
            }
            Self::Stream { provider, message } => {
                format!("response from {provider} was interrupted: {message}")
            }
            Self::Timeout { provider, message } => {
                format!("{provider} did not respond in time: {message}")
            }
            Self::Request(e) => {
                let target = e.url().and_then(|u| u.host_str()).unwrap_or("provider");
                format!("request to {target} failed: {}", error_chain(e))
            }
        }
    }
}

/// Display of an error followed by each of its causes, `: `-separated.
pub(crate) fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !message.ends_with(&cause_text) {
            message.push_str(": ");
            message.push_str(&cause_text);
        }
        source = cause.source();
    }
    message
}

/// Peer reset or closed the connection before a response head arrived.
fn is_dropped_connection(err: &reqwest::Error) -> bool {
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>()
            && matches!(
                io_err.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
            )
        {
            return true;
        }
        if cause.to_string().contains("connection closed before message completed") {
            return true;
        }
        source = cause.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upstream(status: Option<u16>) -> TierError {
        TierError::Upstream {
            provider: "openai".to_string(),
            message: "boom".to_string(),
            status,
        }
    }

    #[test]
    fn server_errors_are_retryable_client_errors_are_not() {
        assert!(upstream(Some(500)).is_retryable());
        assert!(upstream(Some(503)).is_retryable());
        assert!(!upstream(Some(400)).is_retryable());
        assert!(!upstream(Some(404)).is_retryable());
        assert!(!upstream(None).is_retryable());
    }

    #[test]
    fn rate_limit_and_unreachable_are_retryable() {
        let rl = TierError::RateLimited {
            provider: "anthropic".to_string(),
            message: "429".to_string(),
        };
        let down = TierError::Unreachable {
            provider: "ollama".to_string(),
            message: "connection refused".to_string(),
        };
        assert!(rl.is_retryable());
        assert!(down.is_retryable());
    }

    #[test]
    fn unauthenticated_and_parse_errors_are_final() {
        let unauth = TierError::Unauthenticated {
            provider: "openai".to_string(),
            message: "OPENAI_API_KEY is not set".to_string(),
        };
        let parse = TierError::SchemaParse {
            provider: "ollama".to_string(),
            message: "expected value".to_string(),
        };
        assert!(!unauth.is_retryable());
        assert!(!parse.is_retryable());
        assert_eq!(unauth.provider(), Some("openai"));
    }

    #[derive(Debug, Error)]
    #[error("error sending request")]
    struct Outer(#[source] io::Error);

    #[test]
    fn chain_includes_underlying_cause() {
        let err = Outer(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset by peer"));
        assert_eq!(
            error_chain(&err),
            "error sending request: connection reset by peer"
        );
    }

    #[test]
    fn timeout_is_retryable() {
        let err = TierError::Timeout {
            provider: "openai".to_string(),
            message: "no response within 2s".to_string(),
        };
        assert!(err.is_retryable());
        assert!(err.user_message().contains("no response within 2s"));
    }

    #[test]
    fn unreachable_ollama_suggests_serve() {
        let err = TierError::Unreachable {
            provider: "ollama".to_string(),
            message: "connection refused".to_string(),
        };
        assert!(err.user_message().contains("ollama serve"));
    }
}
