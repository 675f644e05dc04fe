//! Domain types shared by the store, the retrieval channels and the ranker.

use serde::{Deserialize, Serialize};

/// Stable key of a persisted chunk, unique within one collection.
pub type ChunkId = i64;

/// Fixed dimensionality of every stored embedding.
pub const EMBEDDING_DIM: usize = 384;

/// One ingestion input record as produced by the document chunking pipeline.
///
/// - `filename`: source document name
/// - `page`: 0-based page index inside the document
/// - `chunk_id`: position of the chunk within its page
/// - `content`: the text payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub filename: String,
    pub page: i64,
    pub chunk_id: i64,
    pub content: String,
}

/// A record paired with its embedding, ready to be written to a store.
#[derive(Debug, Clone)]
pub struct EmbeddedRecord {
    pub record: ChunkRecord,
    pub embedding: Vec<f32>,
}

/// A chunk as read back from a store.
///
/// `id` is `None` only for hits coming from a source that does not expose
/// primary keys; fusion then falls back to the provenance triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: Option<ChunkId>,
    pub filename: String,
    pub page: i64,
    pub chunk_id: i64,
    pub content: String,
}

impl Chunk {
    pub fn from_record(id: ChunkId, record: ChunkRecord) -> Self {
        Self {
            id: Some(id),
            filename: record.filename,
            page: record.page,
            chunk_id: record.chunk_id,
            content: record.content,
        }
    }
}

/// A chunk with the distance reported by a nearest-neighbour search.
///
/// Lower distance means more similar; distances are non-negative.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub distance: f32,
}

/// Indicates which retrieval channel produced a hit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Dense,
    Lexical,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Dense => f.write_str("dense"),
            SourceKind::Lexical => f.write_str("lexical"),
        }
    }
}

/// Final, caller-facing result of one retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub id: Option<ChunkId>,
    pub content: String,
    pub filename: String,
    pub page: i64,
    pub chunk_id: i64,
    pub composite_score: f32,
}
