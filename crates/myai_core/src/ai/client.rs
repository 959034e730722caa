//! Completion client seam and its HTTP implementation.
//!
//! # Responsibility
//! - Expose one `complete(system, user)` call regardless of provider.
//! - Speak the OpenAI chat-completions and Anthropic messages wire formats.
//!
//! # Invariants
//! - Any non-2xx status is a failure; its message comes from the body when
//!   the body carries one.
//! - A 2xx body without the expected text field is a failure.
//! - Prompts, replies and credentials are never logged.

use crate::ai::error::{
    classify_transport_failure, ProviderError, ProviderResult, TransportFailure,
};
use crate::ai::provider::{resolve_provider, ProviderKind};
use crate::settings::AiSettings;
use async_trait::async_trait;
use log::{error, info};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{Debug, Formatter};
use std::time::Instant;

const OPENAI_COMPLETIONS_PATH: &str = "/v1/chat/completions";
const CLAUDE_MESSAGES_PATH: &str = "/v1/messages";
const CLAUDE_API_VERSION: &str = "2023-06-01";
/// Output ceiling sent to the messages API, which requires one.
pub const CLAUDE_MAX_OUTPUT_TOKENS: u32 = 4096;

/// One remote text-completion provider.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    fn provider(&self) -> ProviderKind;

    /// Sends one system/user prompt pair and returns the reply text.
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> ProviderResult<String>;
}

/// `reqwest`-backed client for either provider.
#[derive(Clone)]
pub struct HttpCompletionClient {
    http: reqwest::Client,
    provider: ProviderKind,
    api_key: String,
    model: String,
    temperature: f32,
    base_url: String,
}

impl Debug for HttpCompletionClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCompletionClient")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpCompletionClient {
    /// Builds a client for the provider the selection policy picks.
    pub fn from_settings(settings: &AiSettings) -> ProviderResult<Self> {
        let provider = resolve_provider(settings).ok_or(ProviderError::NoProviderAvailable)?;
        Self::for_provider(settings, provider)
    }

    /// Builds a client for one specific provider.
    pub fn for_provider(settings: &AiSettings, provider: ProviderKind) -> ProviderResult<Self> {
        let provider_settings = settings.provider(provider);
        let api_key = provider_settings
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(ProviderError::MissingCredential(provider))?;
        Ok(Self {
            http: reqwest::Client::new(),
            provider,
            api_key: api_key.to_string(),
            model: provider_settings.model.clone(),
            temperature: settings.temperature,
            base_url: provider_settings.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Points the client at another host (mock servers, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Replaces the underlying HTTP client (custom proxy or timeout setup).
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        let path = match self.provider {
            ProviderKind::OpenAi => OPENAI_COMPLETIONS_PATH,
            ProviderKind::Claude => CLAUDE_MESSAGES_PATH,
        };
        format!("{}{path}", self.base_url)
    }

    fn build_request(&self, system_prompt: &str, user_prompt: &str) -> reqwest::RequestBuilder {
        let request = self.http.post(self.endpoint());
        match self.provider {
            ProviderKind::OpenAi => request.bearer_auth(&self.api_key).json(&OpenAiRequest {
                model: &self.model,
                messages: vec![
                    WireMessage {
                        role: "system",
                        content: system_prompt,
                    },
                    WireMessage {
                        role: "user",
                        content: user_prompt,
                    },
                ],
                temperature: self.temperature,
            }),
            ProviderKind::Claude => request
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", CLAUDE_API_VERSION)
                .json(&ClaudeRequest {
                    model: &self.model,
                    max_tokens: CLAUDE_MAX_OUTPUT_TOKENS,
                    temperature: self.temperature,
                    system: system_prompt,
                    messages: vec![WireMessage {
                        role: "user",
                        content: user_prompt,
                    }],
                }),
        }
    }

    fn transport_error(&self, err: &reqwest::Error) -> ProviderError {
        let issue = classify_transport_failure(&TransportFailure::from_reqwest(err));
        ProviderError::Transport {
            provider: self.provider,
            issue,
            host: self.base_url.clone(),
        }
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    fn provider(&self) -> ProviderKind {
        self.provider
    }

    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> ProviderResult<String> {
        let started_at = Instant::now();
        let provider = self.provider.as_str();
        info!(
            "event=provider_call module=ai status=start provider={provider} model={} prompt_chars={}",
            self.model,
            system_prompt.chars().count() + user_prompt.chars().count()
        );

        let result = self.send(system_prompt, user_prompt).await;
        match &result {
            Ok(text) => info!(
                "event=provider_call module=ai status=ok provider={provider} duration_ms={} reply_chars={}",
                started_at.elapsed().as_millis(),
                text.chars().count()
            ),
            Err(err) => error!(
                "event=provider_call module=ai status=error provider={provider} duration_ms={} error_code={}",
                started_at.elapsed().as_millis(),
                err.code()
            ),
        }
        result
    }
}

impl HttpCompletionClient {
    async fn send(&self, system_prompt: &str, user_prompt: &str) -> ProviderResult<String> {
        let response = self
            .build_request(system_prompt, user_prompt)
            .send()
            .await
            .map_err(|err| self.transport_error(&err))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| self.transport_error(&err))?;

        if !status.is_success() {
            return Err(ProviderError::Api {
                provider: self.provider,
                status: status.as_u16(),
                message: api_error_message(self.provider, status, &body),
            });
        }

        extract_reply_text(self.provider, &body)
    }
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ClaudeRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Option<Vec<OpenAiChoice>>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: Option<OpenAiMessage>,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ClaudeResponse {
    content: Option<Vec<ClaudeContentBlock>>,
}

#[derive(Deserialize)]
struct ClaudeContentBlock {
    text: Option<String>,
}

/// Pulls the reply text out of a success body.
fn extract_reply_text(provider: ProviderKind, body: &str) -> ProviderResult<String> {
    let malformed = || ProviderError::MalformedResponse(provider);
    let text = match provider {
        ProviderKind::OpenAi => serde_json::from_str::<OpenAiResponse>(body)
            .map_err(|_| malformed())?
            .choices
            .and_then(|choices| choices.into_iter().next())
            .and_then(|choice| choice.message)
            .and_then(|message| message.content),
        ProviderKind::Claude => serde_json::from_str::<ClaudeResponse>(body)
            .map_err(|_| malformed())?
            .content
            .and_then(|blocks| blocks.into_iter().next())
            .and_then(|block| block.text),
    };
    text.ok_or_else(malformed)
}

/// Message for a non-success response: body `error.message`, then a
/// top-level `message`, then a generic status line.
fn api_error_message(provider: ProviderKind, status: StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .and_then(Value::as_str)
                .or_else(|| value.get("message").and_then(Value::as_str))
                .map(str::trim)
                .filter(|message| !message.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| format!("{} API error: {status}", provider.display_name()))
}
