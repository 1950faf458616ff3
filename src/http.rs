use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::fmt;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

const MAX_RETRIES: usize = 1;
const RETRY_DELAY_MS: u64 = 500;

#[derive(Debug)]
pub enum SendError {
    Status { status: StatusCode, body: String },
    Transport(reqwest::Error),
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::Status { status, body } => {
                write!(f, "HTTP {}: {}", status, truncate(body, 500))
            }
            SendError::Transport(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for SendError {}

pub fn build_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("ai-pr-review/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Sends a request, retrying once on transport failures, 429 and 5xx.
pub async fn send_with_retry<F>(make_request: F) -> Result<Response, SendError>
where
    F: FnMut() -> RequestBuilder,
{
    send(make_request, Retry::Idempotent).await
}

/// Sends a request with side effects, such as posting a comment. It is
/// retried only when the server cannot have acted on it: a refused
/// connection or a 429.
pub async fn send_write<F>(make_request: F) -> Result<Response, SendError>
where
    F: FnMut() -> RequestBuilder,
{
    send(make_request, Retry::NotApplied).await
}

#[derive(Clone, Copy)]
enum Retry {
    Idempotent,
    NotApplied,
}

async fn send<F>(mut make_request: F, retry: Retry) -> Result<Response, SendError>
where
    F: FnMut() -> RequestBuilder,
{
    let mut attempt = 0;
    loop {
        let outcome = match make_request().send().await {
            Ok(response) if response.status().is_success() => return Ok(response),
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                let retryable = is_retryable_status(status, retry);
                (SendError::Status { status, body }, retryable)
            }
            Err(err) => {
                let retryable = is_transient(&err, retry);
                (SendError::Transport(err), retryable)
            }
        };

        let (error, retryable) = outcome;
        if !retryable || attempt >= MAX_RETRIES {
            return Err(error);
        }

        attempt += 1;
        debug!("Retrying request after transient failure: {}", error);
        sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64)).await;
    }
}

fn is_retryable_status(status: StatusCode, retry: Retry) -> bool {
    match retry {
        Retry::Idempotent => status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error(),
        Retry::NotApplied => status == StatusCode::TOO_MANY_REQUESTS,
    }
}

fn is_transient(err: &reqwest::Error, retry: Retry) -> bool {
    match retry {
        Retry::Idempotent => err.is_timeout() || err.is_connect() || err.is_request(),
        Retry::NotApplied => err.is_connect(),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}
