//! OpenAI-compatible chat-completions client sharing the backend rate limiter.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use docqa_core::config::{ChatSettings, EmbeddingSettings};
use docqa_core::traits::{ChatMessage, ChatModel};
use docqa_core::{EmbeddingError, Error, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::http::{classify_status, transport_error};
use crate::rate_limit::{Lane, RateLimiter};
use crate::retry::RetryPolicy;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct HttpChat {
    client: reqwest::Client,
    settings: ChatSettings,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
}

impl HttpChat {
    pub fn new(settings: ChatSettings, limiter: Arc<RateLimiter>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.request_timeout_ms))
            .build()
            .map_err(|e| Error::InvalidConfig(format!("chat http client: {e}")))?;
        Ok(Self { client, settings, limiter, retry: RetryPolicy::default() })
    }

    /// Use the embedding retry knobs for chat calls too.
    pub fn with_retry_from(mut self, embedding: &EmbeddingSettings) -> Self {
        self.retry = RetryPolicy::from_settings(embedding);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn request_once(
        &self,
        api_key: &str,
        messages: &[ChatMessage],
        max_tokens: u32,
    ) -> std::result::Result<String, EmbeddingError> {
        let url = format!("{}/chat/completions", self.settings.base_url.trim_end_matches('/'));
        let body = ChatRequest {
            model: &self.settings.model,
            messages: messages.iter().map(|m| WireMessage { role: &m.role, content: &m.content }).collect(),
            max_tokens,
            temperature: self.settings.temperature,
        };
        let resp = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(&e, self.settings.request_timeout_ms))?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(classify_status(status, &text));
        }
        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| EmbeddingError::Transient(format!("malformed chat response: {e}")))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| EmbeddingError::Transient("chat response has no content".to_string()))
    }
}

#[async_trait]
impl ChatModel for HttpChat {
    async fn chat(&self, messages: &[ChatMessage], max_tokens: Option<u32>) -> Result<String> {
        let Some(api_key) = self.settings.api_key.as_deref().filter(|k| !k.is_empty()) else {
            return Err(Error::Chat("chat.api_key is not set".to_string()));
        };
        let max_tokens = max_tokens.unwrap_or(self.settings.max_tokens);
        let reply = self
            .retry
            .run(&self.limiter, Lane::Chat, || self.request_once(api_key, messages, max_tokens))
            .await
            .map_err(|e| Error::Chat(e.to_string()))?;
        debug!("chat reply: {} chars", reply.chars().count());
        Ok(reply)
    }
}
