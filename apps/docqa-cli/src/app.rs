//! Wiring of store, clients and retrieval from loaded settings.

use std::sync::Arc;

use anyhow::{Context, Result};
use docqa_core::config::Settings;
use docqa_core::traits::{ChatModel, ChunkStore, Embedder};
use docqa_embed::{get_default_chat, get_default_embedder, RateLimiter};
use docqa_hybrid::{Answerer, Evaluator, HybridRetriever, Ingestor};
use docqa_vector::LanceChunkStore;

pub struct App {
    pub settings: Settings,
    pub store: Arc<dyn ChunkStore>,
    limiter: Arc<RateLimiter>,
}

impl App {
    pub async fn open(settings: Settings) -> Result<Self> {
        let uri = settings.store.resolved_uri();
        let uri = uri.to_string_lossy();
        let store = LanceChunkStore::open(&uri, &settings.store.table)
            .await
            .with_context(|| format!("opening chunk store at {uri}"))?;
        let limiter = Arc::new(RateLimiter::from_settings(&settings.embedding, &settings.chat));
        Ok(Self { settings, store: Arc::new(store), limiter })
    }

    pub fn embedder(&self) -> Result<Arc<dyn Embedder>> {
        get_default_embedder(&self.settings.embedding, self.limiter.clone()).context("building embedder")
    }

    fn chat(&self) -> Result<Arc<dyn ChatModel>> {
        get_default_chat(&self.settings, self.limiter.clone()).context("building chat client")
    }

    pub fn retriever(&self) -> Result<HybridRetriever> {
        Ok(HybridRetriever::from_settings(self.store.clone(), self.embedder()?, &self.settings))
    }

    pub fn ingestor(&self) -> Result<Ingestor> {
        Ok(Ingestor::new(self.store.clone(), self.embedder()?))
    }

    pub fn answerer(&self, expand_query: bool) -> Result<Answerer> {
        let mut settings = self.settings.answer.clone();
        settings.expand_query &= expand_query;
        Ok(Answerer::new(Arc::new(self.retriever()?), self.chat()?, settings))
    }

    pub fn evaluator(&self, top_k: usize) -> Result<Evaluator> {
        Ok(Evaluator::new(Arc::new(self.retriever()?), self.embedder()?, self.chat()?).with_top_k(top_k))
    }
}
