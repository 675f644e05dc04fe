//! docqa-embed
//!
//! Remote embedding and chat clients behind one shared, lane-aware rate
//! limiter, plus a deterministic fake embedder for offline use.

use std::sync::Arc;

use docqa_core::config::{EmbeddingSettings, Settings};
use docqa_core::traits::{ChatModel, Embedder};
use docqa_core::{EmbeddingError, Result};
use tracing::info;

pub mod chat;
pub mod fake;
pub mod http;
pub mod rate_limit;
pub mod retry;

pub use chat::HttpChat;
pub use fake::FakeEmbedder;
pub use http::HttpEmbedder;
pub use rate_limit::{Lane, LaneConfig, RateLimiter};
pub use retry::RetryPolicy;

/// True when `APP_USE_FAKE_EMBEDDINGS` is `1` or `true`.
pub fn use_fake_embeddings() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

pub fn get_default_embedder(
    settings: &EmbeddingSettings,
    limiter: Arc<RateLimiter>,
) -> std::result::Result<Arc<dyn Embedder>, EmbeddingError> {
    if use_fake_embeddings() {
        info!("using FakeEmbedder ({} dims)", settings.dimension);
        return Ok(Arc::new(FakeEmbedder::new(settings.dimension)));
    }
    info!("using remote embedder {} at {}", settings.model, settings.base_url);
    Ok(Arc::new(HttpEmbedder::new(settings.clone(), limiter)?))
}

/// Chat client for the same backend; falls back to the embedding API key.
pub fn get_default_chat(settings: &Settings, limiter: Arc<RateLimiter>) -> Result<Arc<dyn ChatModel>> {
    let mut chat_settings = settings.chat.clone();
    if chat_settings.api_key.is_none() {
        chat_settings.api_key.clone_from(&settings.embedding.api_key);
    }
    let chat = HttpChat::new(chat_settings, limiter)?.with_retry_from(&settings.embedding);
    Ok(Arc::new(chat))
}
