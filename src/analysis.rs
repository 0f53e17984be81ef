//! Paper analysis through the Anthropic Messages API.
//!
//! [`AnalysisClient`] submits one prompt per call and absorbs transient
//! failures with the shared [`RetryPolicy`]. The network side sits behind
//! the [`AnalysisBackend`] trait so the retry logic can be exercised against
//! a scripted backend; [`AnthropicBackend`] is the real one.
//!
//! # Failure classes
//!
//! | Class | Source | Retried |
//! |-------|--------|---------|
//! | `RateLimited` | HTTP 429 | yes |
//! | `ConnectionFailed` | connect error, timeout | yes |
//! | `ServerError` | HTTP 5xx (incl. 529 overloaded) | yes |
//! | `ClientError` | other HTTP 4xx | no |
//! | `Other` | anything else, unreadable reply | no |
//!
//! Attempts include the first call: with `max_retries = 3` the endpoint is
//! called at most three times, sleeping `retry_delay` then `2 × retry_delay`
//! in between.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::prompts::{build_prompt, PaperMetadata, PromptKind};
use crate::retry::{RetryError, RetryPolicy};

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// How an endpoint call failed. Decides whether it is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    RateLimited,
    ConnectionFailed,
    ServerError,
    ClientError,
    Other,
}

impl FailureKind {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FailureKind::RateLimited | FailureKind::ConnectionFailed | FailureKind::ServerError
        )
    }

    /// Map a non-success HTTP status to a failure class.
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => FailureKind::RateLimited,
            500..=599 => FailureKind::ServerError,
            400..=499 => FailureKind::ClientError,
            _ => FailureKind::Other,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::RateLimited => "rate limited",
            FailureKind::ConnectionFailed => "connection failed",
            FailureKind::ServerError => "server error",
            FailureKind::ClientError => "client error",
            FailureKind::Other => "unexpected failure",
        };
        f.write_str(s)
    }
}

/// One failed endpoint call.
#[derive(Debug, Clone)]
pub struct EndpointFailure {
    pub kind: FailureKind,
    pub status: Option<u16>,
    pub detail: String,
}

impl EndpointFailure {
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            detail: detail.into(),
        }
    }

    pub fn with_status(status: u16, detail: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::from_status(status),
            status: Some(status),
            detail: detail.into(),
        }
    }
}

impl fmt::Display for EndpointFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "HTTP {}: {}", status, self.detail),
            None => f.write_str(&self.detail),
        }
    }
}

/// What a successful endpoint call returns, before normalization.
#[derive(Debug, Clone, Default)]
pub struct EndpointResponse {
    /// Text content blocks, in response order.
    pub text_blocks: Vec<String>,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub stop_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    pub prompt: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub text: String,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub stop_reason: Option<String>,
}

/// Cumulative usage for one client. Never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UsageCounters {
    pub requests: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl UsageCounters {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    fn record(&mut self, response: &EndpointResponse) {
        self.requests += 1;
        self.input_tokens += response.input_tokens;
        self.output_tokens += response.output_tokens;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOptions {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    /// Total attempts per call, first one included.
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            model: crate::config::default_model(),
            max_tokens: 4096,
            temperature: 0.7,
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

impl AnalysisOptions {
    pub fn from_config(config: &Config) -> Self {
        let a = &config.analysis;
        Self {
            model: a.model.clone(),
            max_tokens: a.max_tokens,
            temperature: a.temperature,
            max_retries: a.max_retries,
            retry_delay: Duration::from_secs_f64(a.retry_delay_secs.max(0.0)),
        }
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.retry_delay, 2.0)
    }
}

/// The network half of an analysis call.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    async fn send(
        &self,
        request: &AnalysisRequest,
    ) -> std::result::Result<EndpointResponse, EndpointFailure>;
}

/// Anthropic Messages API over `reqwest`.
pub struct AnthropicBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AnthropicBackend {
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config.api_key().ok_or_else(|| {
            Error::InvalidInput(format!(
                "API key must be configured or set in the {} environment variable",
                crate::config::API_KEY_ENV
            ))
        })?;
        Self::new(
            &api_key,
            &config.analysis.base_url,
            Duration::from_secs(config.analysis.timeout_secs),
        )
    }
}

#[async_trait]
impl AnalysisBackend for AnthropicBackend {
    async fn send(
        &self,
        request: &AnalysisRequest,
    ) -> std::result::Result<EndpointResponse, EndpointFailure> {
        let body = serde_json::json!({
            "model": request.model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "messages": [
                { "role": "user", "content": request.prompt }
            ],
        });

        let resp = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await;

        let response = match resp {
            Ok(r) => r,
            Err(e) => return Err(EndpointFailure::new(transport_failure_kind(&e), e.to_string())),
        };

        let status = response.status();
        if status.is_success() {
            let json: serde_json::Value = response.json().await.map_err(|e| {
                EndpointFailure::new(FailureKind::Other, format!("unreadable response: {}", e))
            })?;
            return parse_messages_response(&json);
        }

        let body_text = response.text().await.unwrap_or_default();
        Err(EndpointFailure::with_status(
            status.as_u16(),
            error_message(&body_text),
        ))
    }
}

/// Only failures to reach the endpoint count as connection failures; a
/// malformed exchange with a reachable server does not.
fn transport_failure_kind(e: &reqwest::Error) -> FailureKind {
    if e.is_connect() || e.is_timeout() {
        FailureKind::ConnectionFailed
    } else {
        FailureKind::Other
    }
}

/// Pull `error.message` out of an Anthropic error body, or return it raw.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

/// Normalize a Messages API success body.
///
/// Usage is required; content blocks that are not text are ignored.
pub fn parse_messages_response(
    json: &serde_json::Value,
) -> std::result::Result<EndpointResponse, EndpointFailure> {
    let usage = json
        .get("usage")
        .ok_or_else(|| EndpointFailure::new(FailureKind::Other, "response missing usage"))?;

    let input_tokens = usage
        .get("input_tokens")
        .and_then(|v| v.as_u64())
        .unwrap_or(0);
    let output_tokens = usage
        .get("output_tokens")
        .and_then(|v| v.as_u64())
        .unwrap_or(0);

    let text_blocks = json
        .get("content")
        .and_then(|c| c.as_array())
        .map(|blocks| {
            blocks
                .iter()
                .filter(|b| b.get("type").and_then(|t| t.as_str()).unwrap_or("text") == "text")
                .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(EndpointResponse {
        text_blocks,
        model: json
            .get("model")
            .and_then(|m| m.as_str())
            .unwrap_or_default()
            .to_string(),
        input_tokens,
        output_tokens,
        stop_reason: json
            .get("stop_reason")
            .and_then(|s| s.as_str())
            .map(str::to_string),
    })
}

/// Retrying analysis client with per-instance usage tracking.
pub struct AnalysisClient<B: AnalysisBackend> {
    backend: B,
    options: AnalysisOptions,
    usage: UsageCounters,
}

impl AnalysisClient<AnthropicBackend> {
    pub fn from_config(config: &Config) -> Result<Self> {
        let backend = AnthropicBackend::from_config(config)?;
        Self::new(backend, AnalysisOptions::from_config(config))
    }
}

impl<B: AnalysisBackend> AnalysisClient<B> {
    pub fn new(backend: B, options: AnalysisOptions) -> Result<Self> {
        if !(0.0..=1.0).contains(&options.temperature) {
            return Err(Error::InvalidInput(format!(
                "temperature must be between 0.0 and 1.0, got {}",
                options.temperature
            )));
        }
        if options.max_tokens == 0 {
            return Err(Error::InvalidInput("max_tokens must be > 0".to_string()));
        }
        Ok(Self {
            backend,
            options,
            usage: UsageCounters::default(),
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn options(&self) -> &AnalysisOptions {
        &self.options
    }

    /// Send one prompt and return the normalized result.
    pub async fn analyze(&mut self, prompt: &str) -> Result<AnalysisResult> {
        if prompt.trim().is_empty() {
            return Err(Error::InvalidInput("Prompt text cannot be empty".to_string()));
        }

        let request = AnalysisRequest {
            prompt: prompt.to_string(),
            model: self.options.model.clone(),
            max_tokens: self.options.max_tokens,
            temperature: self.options.temperature,
        };

        tracing::debug!(
            model = %request.model,
            estimated_tokens = estimate_token_count(prompt),
            "sending analysis request"
        );

        let backend = &self.backend;
        let request_ref = &request;
        let response = self
            .options
            .retry_policy()
            .run(
                move || backend.send(request_ref),
                |failure: &EndpointFailure| failure.kind.is_transient(),
            )
            .await
            .map_err(|e| match e {
                RetryError::Aborted(f) => Error::FatalRequest {
                    kind: f.kind,
                    detail: f.to_string(),
                },
                RetryError::Exhausted { attempts, last } => Error::RetriesExhausted {
                    attempts,
                    kind: last.kind,
                    detail: last.to_string(),
                },
            })?;

        self.usage.record(&response);

        Ok(AnalysisResult {
            text: response.text_blocks.concat(),
            model: response.model,
            input_tokens: response.input_tokens,
            output_tokens: response.output_tokens,
            stop_reason: response.stop_reason,
        })
    }

    /// Build the prompt for `kind` and analyze it.
    pub async fn analyze_paper(
        &mut self,
        kind: PromptKind,
        paper_text: &str,
        metadata: &PaperMetadata,
        custom_instructions: Option<&str>,
    ) -> Result<AnalysisResult> {
        if paper_text.trim().is_empty() {
            return Err(Error::InvalidInput("Paper text cannot be empty".to_string()));
        }
        let prompt = build_prompt(kind, paper_text, metadata, custom_instructions);
        self.analyze(&prompt).await
    }

    pub fn usage(&self) -> UsageCounters {
        self.usage
    }

    pub fn reset_usage(&mut self) {
        self.usage = UsageCounters::default();
    }
}

/// Rough token estimate: four characters per token. Not for hard limits.
pub fn estimate_token_count(text: &str) -> usize {
    text.chars().count() / 4
}
