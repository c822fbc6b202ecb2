//! Reviewer endpoint client.
//!
//! [`ReviewerClient`] is the seam the orchestrators depend on; [`HttpReviewer`]
//! talks to an Anthropic Messages-compatible endpoint. Every call is bounded by
//! a hard timeout: past it the in-flight request is dropped and the call fails
//! with [`ReviewError::Timeout`]. Nothing is retried here.

use crate::errors::ReviewError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_API_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;

/// Sends one review prompt plus code context and returns the raw response text.
#[async_trait]
pub trait ReviewerClient: Send + Sync {
    /// Model identifier recorded alongside verdicts.
    fn model(&self) -> &str;

    async fn review(&self, prompt: &str, code_context: &str) -> Result<String, ReviewError>;
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    message: String,
}

/// HTTP reviewer for the Messages API.
#[derive(Debug, Clone)]
pub struct HttpReviewer {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl HttpReviewer {
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ReviewError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ReviewError::Transport(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            timeout,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.api_url)
    }

    async fn send(&self, prompt: &str, code_context: &str) -> Result<String, ReviewError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            system: prompt,
            messages: vec![Message {
                role: "user",
                content: code_context,
            }],
        };

        let resp = self
            .http
            .post(self.endpoint())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| self.classify(e))?;

        if !status.is_success() {
            return Err(match serde_json::from_str::<ApiErrorBody>(&text) {
                Ok(body) => ReviewError::Api {
                    status: status.as_u16(),
                    kind: body.error.kind,
                    message: body.error.message,
                },
                Err(_) => ReviewError::Api {
                    status: status.as_u16(),
                    kind: "unknown".to_string(),
                    message: truncate_for_error(&text),
                },
            });
        }

        let parsed: MessagesResponse = serde_json::from_str(&text)
            .map_err(|e| ReviewError::MalformedResponse(format!("{}: {}", e, truncate_for_error(&text))))?;
        let combined: Vec<String> = parsed
            .content
            .into_iter()
            .filter(|b| b.kind == "text")
            .filter_map(|b| b.text)
            .collect();
        if combined.is_empty() {
            return Err(ReviewError::MalformedResponse(
                "response contained no text blocks".to_string(),
            ));
        }
        Ok(combined.join("\n"))
    }

    fn classify(&self, err: reqwest::Error) -> ReviewError {
        if err.is_timeout() {
            ReviewError::Timeout {
                secs: self.timeout.as_secs(),
            }
        } else {
            ReviewError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl ReviewerClient for HttpReviewer {
    fn model(&self) -> &str {
        &self.model
    }

    async fn review(&self, prompt: &str, code_context: &str) -> Result<String, ReviewError> {
        debug!(model = %self.model, context_bytes = code_context.len(), "sending review request");
        // The client timeout covers each phase; this bounds the whole exchange.
        match tokio::time::timeout(self.timeout, self.send(prompt, code_context)).await {
            Ok(result) => result,
            Err(_) => Err(ReviewError::Timeout {
                secs: self.timeout.as_secs(),
            }),
        }
    }
}

fn truncate_for_error(text: &str) -> String {
    const LIMIT: usize = 500;
    if text.len() <= LIMIT {
        return text.to_string();
    }
    let mut end = LIMIT;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
