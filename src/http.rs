use std::thread;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub(crate) struct HttpOptions {
    pub(crate) connect_timeout_ms: u64,
    pub(crate) read_timeout_ms: u64,
    pub(crate) attempts: usize,
    pub(crate) retry_delay_ms: u64,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 3_000,
            read_timeout_ms: 6_000,
            attempts: 3,
            retry_delay_ms: 1_000,
        }
    }
}

impl HttpOptions {
    fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct TextRequest {
    pub(crate) url: String,
    pub(crate) referer: Option<String>,
    pub(crate) query: Vec<(String, String)>,
}

impl TextRequest {
    pub(crate) fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub(crate) fn referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    pub(crate) fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}

#[derive(Debug, Error)]
pub(crate) enum HttpError {
    #[error("request failed after {attempts} attempt(s): HTTP status {status}{detail}")]
    Status {
        status: u16,
        detail: String,
        attempts: usize,
    },
    #[error("request failed after {attempts} attempt(s): transport error: {message}")]
    Transport { message: String, attempts: usize },
    #[error("request failed: response decode failed: {0}")]
    Decode(String),
    #[error("request task failed: {0}")]
    Task(String),
}

fn should_retry_http_status(status: u16) -> bool {
    status == 408 || status == 429 || (500..=599).contains(&status)
}

fn status_detail(body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        String::new()
    } else {
        format!(" ({})", body.chars().take(240).collect::<String>())
    }
}

pub(crate) fn get_text_with_retries(
    request: &TextRequest,
    options: &HttpOptions,
) -> Result<String, HttpError> {
    let attempts = options.attempts.max(1);
    let agent = ureq::AgentBuilder::new()
        .timeout_connect(options.connect_timeout())
        .timeout_read(options.read_timeout())
        .timeout_write(options.read_timeout())
        .build();

    let mut attempt = 1;
    loop {
        let mut call = agent.get(&request.url);
        if let Some(referer) = request.referer.as_deref() {
            call = call.set("Referer", referer);
        }
        for (key, value) in &request.query {
            call = call.query(key, value);
        }

        let retryable = match call.call() {
            Ok(response) => {
                return response
                    .into_string()
                    .map_err(|err| HttpError::Decode(err.to_string()));
            }
            Err(ureq::Error::Status(status, response)) => {
                let body = response.into_string().unwrap_or_default();
                let err = HttpError::Status {
                    status,
                    detail: status_detail(&body),
                    attempts: attempt,
                };
                if !should_retry_http_status(status) {
                    return Err(err);
                }
                err
            }
            Err(ureq::Error::Transport(err)) => HttpError::Transport {
                message: err.to_string(),
                attempts: attempt,
            },
        };

        if attempt >= attempts {
            return Err(retryable);
        }
        debug!(url = %request.url, attempt, error = %retryable, "retrying request");
        thread::sleep(options.retry_delay());
        attempt += 1;
    }
}

pub(crate) async fn fetch_text(
    request: TextRequest,
    options: HttpOptions,
) -> Result<String, HttpError> {
    tokio::task::spawn_blocking(move || get_text_with_retries(&request, &options))
        .await
        .map_err(|err| HttpError::Task(err.to_string()))?
}
