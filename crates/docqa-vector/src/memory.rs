use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use docqa_core::traits::ChunkStore;
use docqa_core::types::{EmbeddedRecord, ScoredChunk};
use docqa_core::{Chunk, ChunkId, Filter, Result};

enum PendingOp {
    Insert(Vec<(Chunk, Vec<f32>)>),
    Delete(Filter),
}

#[derive(Default)]
struct State {
    rows: Vec<(Chunk, Vec<f32>)>,
    pending: Vec<PendingOp>,
    next_id: ChunkId,
}

/// In-process `ChunkStore` with the same staging and exact-search semantics
/// as the LanceDB store (squared L2, filter applied before the limit).
#[derive(Default)]
pub struct MemoryChunkStore {
    state: Mutex<State>,
}

impl MemoryChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[async_trait]
impl ChunkStore for MemoryChunkStore {
    async fn insert(&self, records: Vec<EmbeddedRecord>) -> Result<Vec<ChunkId>> {
        let mut state = self.state();
        let mut ids = Vec::with_capacity(records.len());
        let mut rows = Vec::with_capacity(records.len());
        for r in records {
            state.next_id += 1;
            let id = state.next_id;
            ids.push(id);
            rows.push((Chunk::from_record(id, r.record), r.embedding));
        }
        state.pending.push(PendingOp::Insert(rows));
        Ok(ids)
    }

    async fn delete(&self, filter: &Filter) -> Result<()> {
        self.state().pending.push(PendingOp::Delete(filter.clone()));
        Ok(())
    }

    async fn query(&self, filter: &Filter, limit: usize) -> Result<Vec<Chunk>> {
        let state = self.state();
        Ok(state.rows.iter().filter(|(c, _)| filter.matches(c)).take(limit).map(|(c, _)| c.clone()).collect())
    }

    async fn search(&self, vector: &[f32], filter: Option<&Filter>, limit: usize) -> Result<Vec<ScoredChunk>> {
        let state = self.state();
        let mut hits: Vec<ScoredChunk> = state
            .rows
            .iter()
            .filter(|(c, _)| filter.map_or(true, |f| f.matches(c)))
            .map(|(c, v)| ScoredChunk { chunk: c.clone(), distance: squared_l2(vector, v) })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn flush(&self) -> Result<()> {
        let mut state = self.state();
        let pending = std::mem::take(&mut state.pending);
        for op in pending {
            match op {
                PendingOp::Insert(rows) => state.rows.extend(rows),
                PendingOp::Delete(filter) => state.rows.retain(|(c, _)| !filter.matches(c)),
            }
        }
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.state().rows.len())
    }
}
