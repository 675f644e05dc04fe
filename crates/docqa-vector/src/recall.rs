//! Self-recall check: a stored chunk's own content must find that chunk first.

use docqa_core::traits::{ChunkStore, Embedder};
use docqa_core::{Filter, Result};
use rand::seq::SliceRandom;
use tracing::{info, warn};

/// Chunks considered as the sampling pool.
const SAMPLE_POOL: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecallReport {
    pub sampled: usize,
    pub hits: usize,
    /// Samples whose content could not be embedded; they count as misses.
    pub skipped: usize,
}

impl RecallReport {
    /// Top-1 self-recall in percent; `None` for an empty store.
    pub fn rate(&self) -> Option<f64> {
        (self.sampled > 0).then(|| self.hits as f64 * 100.0 / self.sampled as f64)
    }
}

pub async fn self_recall(store: &dyn ChunkStore, embedder: &dyn Embedder, sample_size: usize) -> Result<RecallReport> {
    let pool = store.query(&Filter::all(), SAMPLE_POOL).await?;
    let samples: Vec<_> = pool.choose_multiple(&mut rand::thread_rng(), sample_size.min(pool.len())).cloned().collect();
    let mut report = RecallReport { sampled: samples.len(), hits: 0, skipped: 0 };
    for chunk in &samples {
        let vector = match embedder.embed(&chunk.content).await {
            Ok(v) => v,
            Err(e) => {
                warn!("recall: embedding chunk {:?} failed: {e}", chunk.id);
                report.skipped += 1;
                continue;
            }
        };
        let top = store.search(&vector, None, 1).await?;
        if top.first().is_some_and(|h| h.chunk.id == chunk.id) {
            report.hits += 1;
        }
    }
    info!("self-recall: {}/{} hits ({} skipped)", report.hits, report.sampled, report.skipped);
    Ok(report)
}
