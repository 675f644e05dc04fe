//! Weighted Reciprocal Rank Fusion of the dense and lexical channels.

use std::collections::HashMap;

use docqa_core::config::RetrievalSettings;
use docqa_core::types::{ScoredChunk, SourceKind};
use docqa_core::{Chunk, ChunkId};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionWeights {
    pub k: f32,
    pub dense: f32,
    pub lexical: f32,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self { k: 60.0, dense: 1.0, lexical: 3.0 }
    }
}

impl FusionWeights {
    pub fn from_settings(settings: &RetrievalSettings) -> Self {
        Self { k: settings.rrf_k, dense: settings.dense_weight, lexical: settings.lexical_weight }
    }

    fn weight(&self, source: SourceKind) -> f32 {
        match source {
            SourceKind::Dense => self.dense,
            SourceKind::Lexical => self.lexical,
        }
    }

    /// Contribution of an item at 0-based `rank` in `source`.
    pub fn contribution(&self, source: SourceKind, rank: usize) -> f32 {
        self.weight(source) / (self.k + rank as f32)
    }
}

/// Identity under which contributions accumulate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CandidateKey {
    Id(ChunkId),
    Position { filename: String, page: i64, chunk_id: i64 },
}

impl CandidateKey {
    pub fn of(chunk: &Chunk) -> Self {
        match chunk.id {
            Some(id) => CandidateKey::Id(id),
            None => CandidateKey::Position {
                filename: chunk.filename.clone(),
                page: chunk.page,
                chunk_id: chunk.chunk_id,
            },
        }
    }
}

/// A chunk attached to one query, between fusion and reranking.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalCandidate {
    pub chunk: Chunk,
    /// Channel with the larger RRF contribution; the first one seen on a tie.
    pub source: SourceKind,
    /// 0-based rank within `source`.
    pub rank: usize,
    /// Dense distance, when the dense channel returned this chunk.
    pub distance: Option<f32>,
    pub fused_score: f32,
}

impl RetrievalCandidate {
    pub fn key(&self) -> CandidateKey {
        CandidateKey::of(&self.chunk)
    }
}

struct Accumulator {
    candidate: RetrievalCandidate,
    best_contribution: f32,
}

/// Merge both channels. Output holds every distinct input identity exactly
/// once, descending by fused score, ties in first-seen order (dense first).
pub fn fuse(dense: &[ScoredChunk], lexical: &[Chunk], weights: &FusionWeights) -> Vec<RetrievalCandidate> {
    let mut order: Vec<Accumulator> = Vec::with_capacity(dense.len() + lexical.len());
    let mut index: HashMap<CandidateKey, usize> = HashMap::new();

    let dense_items = dense.iter().map(|h| (&h.chunk, Some(h.distance), SourceKind::Dense));
    let lexical_items = lexical.iter().map(|c| (c, None, SourceKind::Lexical));
    let ranked = dense_items.enumerate().chain(lexical_items.enumerate());

    for (rank, (chunk, distance, source)) in ranked {
        let contribution = weights.contribution(source, rank);
        let key = CandidateKey::of(chunk);
        match index.get(&key) {
            Some(&slot) => {
                let acc = &mut order[slot];
                acc.candidate.fused_score += contribution;
                if distance.is_some() && acc.candidate.distance.is_none() {
                    acc.candidate.distance = distance;
                }
                if contribution > acc.best_contribution {
                    acc.best_contribution = contribution;
                    acc.candidate.source = source;
                    acc.candidate.rank = rank;
                }
            }
            None => {
                index.insert(key, order.len());
                order.push(Accumulator {
                    candidate: RetrievalCandidate {
                        chunk: chunk.clone(),
                        source,
                        rank,
                        distance,
                        fused_score: contribution,
                    },
                    best_contribution: contribution,
                });
            }
        }
    }

    let mut fused: Vec<RetrievalCandidate> = order.into_iter().map(|a| a.candidate).collect();
    fused.sort_by(|a, b| b.fused_score.total_cmp(&a.fused_score));
    fused
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn chunk(id: Option<ChunkId>, page: i64) -> Chunk {
        Chunk { id, filename: "doc.pdf".into(), page, chunk_id: 0, content: format!("page {page}") }
    }

    fn scored(id: ChunkId, distance: f32) -> ScoredChunk {
        ScoredChunk { chunk: chunk(Some(id), id), distance }
    }

    #[test]
    fn output_is_the_set_union_of_inputs() {
        let dense = vec![scored(1, 0.1), scored(2, 0.2), scored(3, 0.3)];
        let lexical = vec![chunk(Some(3), 3), chunk(Some(4), 4), chunk(None, 9)];
        let fused = fuse(&dense, &lexical, &FusionWeights::default());
        let keys: HashSet<CandidateKey> = fused.iter().map(RetrievalCandidate::key).collect();
        let expected: HashSet<CandidateKey> = dense
            .iter()
            .map(|h| CandidateKey::of(&h.chunk))
            .chain(lexical.iter().map(CandidateKey::of))
            .collect();
        assert_eq!(fused.len(), 5);
        assert_eq!(keys, expected);
    }

    #[test]
    fn shared_item_sums_both_contributions() {
        let w = FusionWeights::default();
        let dense = vec![scored(1, 0.1), scored(2, 0.2)];
        let lexical = vec![chunk(Some(2), 2)];
        let fused = fuse(&dense, &lexical, &w);
        let two = fused.iter().find(|c| c.chunk.id == Some(2)).unwrap();
        let expected = 1.0 / (60.0 + 1.0) + 3.0 / (60.0 + 0.0);
        assert!((two.fused_score - expected).abs() < 1e-6);
        assert_eq!(two.source, SourceKind::Lexical);
        assert_eq!(two.rank, 0);
        assert_eq!(two.distance, Some(0.2));
        assert_eq!(fused[0].chunk.id, Some(2));
    }

    #[test]
    fn rank_zero_beats_rank_one() {
        let w = FusionWeights::default();
        assert!(w.contribution(SourceKind::Dense, 0) > w.contribution(SourceKind::Dense, 1));
        let fused = fuse(&[], &[chunk(Some(7), 0), chunk(Some(8), 1)], &w);
        assert_eq!(fused[0].chunk.id, Some(7));
        assert!(fused[0].fused_score > fused[1].fused_score);
    }

    #[test]
    fn lexical_outweighs_dense_at_equal_rank() {
        let fused = fuse(&[scored(1, 0.0)], &[chunk(Some(2), 2)], &FusionWeights::default());
        assert_eq!(fused[0].chunk.id, Some(2));
        assert_eq!(fused[1].distance, Some(0.0));
    }

    #[test]
    fn ties_keep_first_seen_order() {
        let w = FusionWeights { k: 60.0, dense: 1.0, lexical: 1.0 };
        let fused = fuse(&[scored(5, 0.5)], &[chunk(Some(6), 6)], &w);
        assert_eq!(fused[0].chunk.id, Some(5));
        assert_eq!(fused[1].chunk.id, Some(6));
    }

    #[test]
    fn unkeyed_hits_fall_back_to_position() {
        let a = chunk(None, 1);
        let fused = fuse(&[], &[a.clone(), a], &FusionWeights::default());
        assert_eq!(fused.len(), 1);
        assert!(matches!(fused[0].key(), CandidateKey::Position { page: 1, .. }));
    }
}
