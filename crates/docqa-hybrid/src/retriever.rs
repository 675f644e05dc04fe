//! Hybrid retrieval: both channels concurrently, RRF fusion, composite rerank.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use docqa_core::config::Settings;
use docqa_core::traits::{ChunkStore, Embedder};
use docqa_core::types::{RetrievedChunk, SourceKind};
use docqa_core::{Filter, Result};
use docqa_text::{KeywordExtractor, LexicalSearch};
use docqa_vector::DenseSearch;
use tracing::{debug, info, warn};

use crate::fusion::{fuse, FusionWeights};
use crate::rerank::{RankedCandidate, Reranker};

/// Everything one retrieval produced, for callers that want more than the
/// final list.
#[derive(Debug, Clone, Default)]
pub struct RetrievalResponse {
    pub results: Vec<RankedCandidate>,
    pub dense_hits: usize,
    pub lexical_hits: usize,
    /// Channels dropped because they did not answer within the timeout.
    pub timed_out: Vec<SourceKind>,
}

impl RetrievalResponse {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn into_chunks(self) -> Vec<RetrievedChunk> {
        self.results.into_iter().map(RetrievedChunk::from).collect()
    }
}

impl From<RankedCandidate> for RetrievedChunk {
    fn from(ranked: RankedCandidate) -> Self {
        let chunk = ranked.candidate.chunk;
        RetrievedChunk {
            id: chunk.id,
            content: chunk.content,
            filename: chunk.filename,
            page: chunk.page,
            chunk_id: chunk.chunk_id,
            composite_score: ranked.score.composite,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrieverOptions {
    pub channel_limit_factor: usize,
    pub pool_factor: usize,
    pub channel_timeout: Duration,
    pub weights: FusionWeights,
}

impl Default for RetrieverOptions {
    fn default() -> Self {
        Self {
            channel_limit_factor: 5,
            pool_factor: 2,
            channel_timeout: Duration::from_secs(15),
            weights: FusionWeights::default(),
        }
    }
}

pub struct HybridRetriever {
    store: Arc<dyn ChunkStore>,
    dense: DenseSearch,
    lexical: LexicalSearch,
    reranker: Reranker,
    options: RetrieverOptions,
}

impl HybridRetriever {
    pub fn new(
        store: Arc<dyn ChunkStore>,
        dense: DenseSearch,
        lexical: LexicalSearch,
        reranker: Reranker,
        options: RetrieverOptions,
    ) -> Self {
        Self { store, dense, lexical, reranker, options }
    }

    /// Wire both channels and the reranker from settings.
    pub fn from_settings(store: Arc<dyn ChunkStore>, embedder: Arc<dyn Embedder>, settings: &Settings) -> Self {
        let r = &settings.retrieval;
        let extractor = KeywordExtractor::new(r.min_latin_len, r.min_cjk_len);
        let options = RetrieverOptions {
            channel_limit_factor: r.channel_limit_factor,
            pool_factor: r.pool_factor,
            channel_timeout: Duration::from_millis(r.channel_timeout_ms),
            weights: FusionWeights::from_settings(r),
        };
        Self::new(
            store,
            DenseSearch::new(embedder),
            LexicalSearch::new(extractor.clone(), r.max_keywords_per_script),
            Reranker::new(settings.rerank.clone(), extractor),
            options,
        )
    }

    pub fn store(&self) -> &Arc<dyn ChunkStore> {
        &self.store
    }

    /// Top `top_k` chunks by composite score. Empty means nothing was found.
    pub async fn retrieve(&self, query: &str, top_k: usize, filter: Option<&Filter>) -> Result<Vec<RetrievedChunk>> {
        Ok(self.retrieve_detailed(query, top_k, filter).await?.into_chunks())
    }

    pub async fn retrieve_detailed(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<&Filter>,
    ) -> Result<RetrievalResponse> {
        if top_k == 0 || query.trim().is_empty() {
            return Ok(RetrievalResponse::default());
        }
        let limit = top_k.saturating_mul(self.options.channel_limit_factor.max(1));
        let store = self.store.as_ref();

        let (dense, lexical) = tokio::join!(
            bounded(SourceKind::Dense, self.options.channel_timeout, self.dense.search(store, query, limit, filter)),
            bounded(SourceKind::Lexical, self.options.channel_timeout, self.lexical.search(store, query, limit, filter)),
        );
        let mut timed_out = Vec::new();
        let dense = dense?.unwrap_or_else(|| {
            timed_out.push(SourceKind::Dense);
            Vec::new()
        });
        let lexical = lexical?.unwrap_or_else(|| {
            timed_out.push(SourceKind::Lexical);
            Vec::new()
        });

        let mut pool = fuse(&dense, &lexical, &self.options.weights);
        pool.truncate(top_k.saturating_mul(self.options.pool_factor.max(1)));
        let mut results = self.reranker.rerank(query, pool);
        results.truncate(top_k);

        debug!(
            "retrieve: dense={} lexical={} returned={}",
            dense.len(),
            lexical.len(),
            results.len()
        );
        if results.is_empty() {
            info!("retrieve: nothing found for `{query}`");
        }
        Ok(RetrievalResponse { results, dense_hits: dense.len(), lexical_hits: lexical.len(), timed_out })
    }
}

/// `Ok(None)` when the channel timed out; store errors pass through.
async fn bounded<T, F>(source: SourceKind, limit: Duration, fut: F) -> Result<Option<Vec<T>>>
where
    F: Future<Output = Result<Vec<T>>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(hits) => hits.map(Some),
        Err(_) => {
            warn!("{source} channel timed out after {limit:?}, continuing without it");
            Ok(None)
        }
    }
}
