use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::error::{EmbeddingError, Result};
use crate::filter::Filter;
use crate::types::{Chunk, ChunkId, EmbeddedRecord, ScoredChunk};

/// Outcome of embedding one item of a batch. `Err` marks the item as missing.
pub type EmbedOutcome = std::result::Result<Vec<f32>, EmbeddingError>;

#[async_trait]
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;

    async fn embed(&self, text: &str) -> EmbedOutcome;

    /// One outcome per input, same order and length as `texts`.
    async fn embed_batch(&self, texts: &[String]) -> Vec<EmbedOutcome> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await);
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn chat(&self, messages: &[ChatMessage], max_tokens: Option<u32>) -> Result<String>;
}

/// Persistent owner of chunk data: scalar fields plus a fixed-dimension vector.
///
/// Writes are staged; they become visible to `query`/`search` only after
/// `flush` returns.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Stage records for insertion and return the ids they will carry.
    async fn insert(&self, records: Vec<EmbeddedRecord>) -> Result<Vec<ChunkId>>;

    /// Stage a tombstone for every chunk matching `filter`.
    async fn delete(&self, filter: &Filter) -> Result<()>;

    /// Unordered scan of chunks matching `filter`, at most `limit` rows.
    async fn query(&self, filter: &Filter, limit: usize) -> Result<Vec<Chunk>>;

    /// Exact nearest-neighbour search, ascending by distance.
    async fn search(&self, vector: &[f32], filter: Option<&Filter>, limit: usize) -> Result<Vec<ScoredChunk>>;

    /// Commit staged inserts and deletes.
    async fn flush(&self) -> Result<()>;

    async fn count(&self) -> Result<usize>;

    /// Distinct source document names, sorted.
    async fn list_filenames(&self) -> Result<Vec<String>> {
        let chunks = self.query(&Filter::all(), usize::MAX).await?;
        let names: BTreeSet<String> = chunks.into_iter().map(|c| c.filename).collect();
        Ok(names.into_iter().collect())
    }

    /// Contents of one document in `(page, chunk_id)` order, blank-line separated.
    /// `None` when the store holds no chunk of that document.
    async fn document_text(&self, filename: &str) -> Result<Option<String>> {
        let mut chunks = self.query(&Filter::filename(filename), usize::MAX).await?;
        if chunks.is_empty() {
            return Ok(None);
        }
        chunks.sort_by_key(|c| (c.page, c.chunk_id));
        let parts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        Ok(Some(parts.join("\n\n")))
    }

    /// Remove every chunk of one document and commit immediately.
    async fn delete_document(&self, filename: &str) -> Result<()> {
        self.delete(&Filter::filename(filename)).await?;
        self.flush().await
    }
}
