use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::{PipelineError, PipelineResult};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const PERPLEXITY_BASE_URL: &str = "https://api.perplexity.ai";

/// Configuration for an OpenAI-compatible chat completions endpoint
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// API key; an empty key means the client is not ready
    pub api_key: String,
    /// Base URL, without the `/chat/completions` suffix
    pub base_url: String,
    /// Model to use (e.g., "gpt-4", "sonar")
    pub model: String,
    /// Temperature (0-1, lower = more deterministic)
    pub temperature: f64,
    /// Maximum tokens in response
    pub max_tokens: u32,
    /// Bound on the whole request
    pub timeout: Duration,
}

impl ChatConfig {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
            temperature: 0.1,
            max_tokens: 1000,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_sampling(mut self, temperature: f64, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Text of a completion plus any sources the provider attached
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatReply {
    pub content: String,
    pub citations: Vec<String>,
}

/// Chat completions client shared by the LLM-backed stages.
///
/// Holds only read-only configuration and a connection pool, so one
/// instance can serve concurrent runs.
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: Client,
    config: ChatConfig,
    provider: &'static str,
}

impl ChatClient {
    pub fn new(provider: &'static str, config: ChatConfig) -> PipelineResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PipelineError::Internal(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            config,
            provider,
        })
    }

    pub fn is_ready(&self) -> bool {
        !self.config.api_key.trim().is_empty()
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Send a system + user exchange and return the first choice's text
    pub async fn send_message(&self, system: &str, user: &str) -> PipelineResult<ChatReply> {
        if !self.is_ready() {
            return Err(PipelineError::UpstreamUnavailable(format!(
                "{} API key not configured",
                self.provider
            )));
        }

        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                Message {
                    role: "system",
                    content: system,
                },
                Message {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("{} request failed: {}", self.provider, e);
                PipelineError::from(e)
            })?;

        let status = response.status();
        debug!("{} API response status: {}", self.provider, status);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("{} API error: {} - {}", self.provider, status, body);
            return Err(PipelineError::UpstreamUnavailable(format!(
                "{} API error: {} - {}",
                self.provider, status, body
            )));
        }

        let body = response.text().await.map_err(PipelineError::from)?;
        let completion: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            PipelineError::UpstreamSchemaViolation(format!(
                "{} response is not a chat completion: {}",
                self.provider, e
            ))
        })?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                PipelineError::UpstreamSchemaViolation(format!(
                    "{} response has no message content",
                    self.provider
                ))
            })?;

        Ok(ChatReply {
            content,
            citations: completion.citations,
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    citations: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}
