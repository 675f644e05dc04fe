//! OpenAI-compatible HTTP embedding client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use docqa_core::config::EmbeddingSettings;
use docqa_core::traits::{EmbedOutcome, Embedder};
use docqa_core::EmbeddingError;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::rate_limit::{Lane, RateLimiter};
use crate::retry::RetryPolicy;

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: [&'a str; 1],
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
}

pub struct HttpEmbedder {
    client: reqwest::Client,
    settings: EmbeddingSettings,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
}

impl HttpEmbedder {
    pub fn new(settings: EmbeddingSettings, limiter: Arc<RateLimiter>) -> Result<Self, EmbeddingError> {
        let timeout = Duration::from_millis(settings.request_timeout_ms);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EmbeddingError::NotConfigured(format!("http client: {e}")))?;
        let retry = RetryPolicy::from_settings(&settings);
        Ok(Self { client, settings, limiter, retry })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn request_once(&self, api_key: &str, text: &str) -> EmbedOutcome {
        let url = format!("{}/embeddings", self.settings.base_url.trim_end_matches('/'));
        let body = EmbedRequest { model: &self.settings.model, input: [text] };
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
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }
        let parsed: EmbedResponse = resp
            .json()
            .await
            .map_err(|e| EmbeddingError::Transient(format!("malformed embedding response: {e}")))?;
        let embedding = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| EmbeddingError::Transient("empty embedding response".to_string()))?;
        if embedding.len() != self.settings.dimension {
            return Err(EmbeddingError::DimensionMismatch { expected: self.settings.dimension, got: embedding.len() });
        }
        Ok(embedding)
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn dim(&self) -> usize {
        self.settings.dimension
    }

    async fn embed(&self, text: &str) -> EmbedOutcome {
        let Some(api_key) = self.settings.api_key.as_deref().filter(|k| !k.is_empty()) else {
            return Err(EmbeddingError::NotConfigured("embedding.api_key is not set".to_string()));
        };
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput("empty text".to_string()));
        }
        let text = truncate_chars(text, self.settings.max_input_chars);
        self.retry.run(&self.limiter, Lane::Embedding, || self.request_once(api_key, text)).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Vec<EmbedOutcome> {
        // One item at a time; the limiter spaces the calls.
        let mut out = Vec::with_capacity(texts.len());
        for (i, text) in texts.iter().enumerate() {
            let outcome = self.embed(text).await;
            if let Err(e) = &outcome {
                warn!("embedding item {}/{} failed: {e}", i + 1, texts.len());
            }
            out.push(outcome);
        }
        debug!("embedded batch of {} ({} failed)", texts.len(), out.iter().filter(|o| o.is_err()).count());
        out
    }
}

/// Map a non-success HTTP status to the error taxonomy.
pub fn classify_status(status: StatusCode, body: &str) -> EmbeddingError {
    let detail = format!("{status}: {}", truncate_chars(body, 200));
    match status {
        StatusCode::TOO_MANY_REQUESTS => EmbeddingError::RateLimited(detail),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => EmbeddingError::Auth(detail),
        StatusCode::BAD_REQUEST | StatusCode::PAYLOAD_TOO_LARGE | StatusCode::UNPROCESSABLE_ENTITY => {
            EmbeddingError::InvalidInput(detail)
        }
        _ => EmbeddingError::Transient(detail),
    }
}

pub(crate) fn transport_error(e: &reqwest::Error, timeout_ms: u64) -> EmbeddingError {
    if e.is_timeout() {
        EmbeddingError::Timeout(Duration::from_millis(timeout_ms))
    } else {
        EmbeddingError::Transient(e.to_string())
    }
}

/// Cut `text` to at most `max` characters on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
