use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};

use crate::error::TierError;

const MAX_ERROR_BODY_BYTES: usize = 64 * 1024;

/// Build a client whose timeout covers connection establishment only.
/// Streams may run as long as the backend keeps sending.
pub fn build_client(connect_timeout: Duration) -> Result<Client, TierError> {
    let client = Client::builder()
        .connect_timeout(connect_timeout)
        .pool_idle_timeout(Duration::from_secs(90))
        .pool_max_idle_per_host(4)
        .build()?;
    Ok(client)
}

/// Send one attempt and wait for a successful response head. `deadline`
/// bounds this phase only; the body is read afterwards without a limit.
pub async fn send_checked(
    request: RequestBuilder,
    provider: &str,
    deadline: Duration,
) -> Result<Response, TierError> {
    let attempt = async {
        let response = request
            .send()
            .await
            .map_err(|e| TierError::from_send(provider, e))?;
        check_status(response, provider).await
    };

    match tokio::time::timeout(deadline, attempt).await {
        Ok(result) => result,
        Err(_) => Err(TierError::Timeout {
            provider: provider.to_string(),
            message: format!("no response within {}ms", deadline.as_millis()),
        }),
    }
}

/// Pass a successful response through; turn any other status into the
/// matching error variant. Error bodies are read up to a fixed cap.
pub async fn check_status(response: Response, provider: &str) -> Result<Response, TierError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = error_message(response, status).await;

    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(TierError::RateLimited {
            provider: provider.to_string(),
            message,
        });
    }

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(TierError::AuthFailed {
            provider: provider.to_string(),
            message,
        });
    }

    Err(TierError::Upstream {
        provider: provider.to_string(),
        message,
        status: Some(status.as_u16()),
    })
}

async fn error_message(response: Response, status: StatusCode) -> String {
    let bytes = response.bytes().await.unwrap_or_default();
    let truncated = &bytes[..bytes.len().min(MAX_ERROR_BODY_BYTES)];
    let text = String::from_utf8_lossy(truncated);
    let text = text.trim();
    if text.is_empty() {
        status.to_string()
    } else {
        format!("{status}: {text}")
    }
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}{path}", base.trim_end_matches('/'))
}
