//! Dense retrieval channel: embed the query, then exact nearest-neighbour search.

use std::sync::Arc;

use docqa_core::traits::{ChunkStore, Embedder};
use docqa_core::types::ScoredChunk;
use docqa_core::{Filter, Result};
use tracing::{debug, warn};

#[derive(Clone)]
pub struct DenseSearch {
    embedder: Arc<dyn Embedder>,
}

impl DenseSearch {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }

    /// Hits ascending by distance. An embedding failure yields an empty list;
    /// store failures are returned.
    pub async fn search(
        &self,
        store: &dyn ChunkStore,
        query: &str,
        limit: usize,
        filter: Option<&Filter>,
    ) -> Result<Vec<ScoredChunk>> {
        let vector = match self.embedder.embed(query).await {
            Ok(v) => v,
            Err(e) => {
                warn!("dense: query embedding failed, channel degraded: {e}");
                return Ok(vec![]);
            }
        };
        let hits = store.search(&vector, filter, limit).await?;
        debug!("dense: {} hits", hits.len());
        Ok(hits)
    }
}
