//! Ingestion: embed records in batches, persist the ones that embedded.
//!
//! A record whose embedding fails is dropped and reported; the rest of the
//! batch continues. Store failures abort the run.

use std::collections::BTreeSet;
use std::sync::Arc;

use docqa_core::traits::{ChunkStore, Embedder};
use docqa_core::types::EmbeddedRecord;
use docqa_core::{ChunkRecord, Filter, Result};
use serde::Serialize;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestFailure {
    pub filename: String,
    pub page: i64,
    pub chunk_id: i64,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<IngestFailure>,
}

impl IngestReport {
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

pub struct Ingestor {
    store: Arc<dyn ChunkStore>,
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
    replace_existing: bool,
}

impl Ingestor {
    pub fn new(store: Arc<dyn ChunkStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder, batch_size: 16, replace_existing: false }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Delete every stored chunk of a filename before inserting its new
    /// records. Applied only to filenames with at least one embedded record.
    pub fn replace_existing(mut self, replace: bool) -> Self {
        self.replace_existing = replace;
        self
    }

    pub async fn ingest(&self, records: Vec<ChunkRecord>) -> Result<IngestReport> {
        self.ingest_with_progress(records, |_, _| {}).await
    }

    /// `progress(done, total)` is called after each embedding batch.
    pub async fn ingest_with_progress<P>(&self, records: Vec<ChunkRecord>, mut progress: P) -> Result<IngestReport>
    where
        P: FnMut(usize, usize) + Send,
    {
        let total = records.len();
        let mut report = IngestReport { attempted: total, ..IngestReport::default() };
        if records.is_empty() {
            return Ok(report);
        }

        let mut embedded: Vec<EmbeddedRecord> = Vec::with_capacity(total);
        let mut done = 0;
        let mut pending = records.into_iter().peekable();
        while pending.peek().is_some() {
            let batch: Vec<ChunkRecord> = pending.by_ref().take(self.batch_size).collect();
            let texts: Vec<String> = batch.iter().map(|r| r.content.clone()).collect();
            let outcomes = self.embedder.embed_batch(&texts).await;
            done += batch.len();
            let mut outcomes = outcomes.into_iter();
            for record in batch {
                match outcomes.next() {
                    Some(Ok(embedding)) => embedded.push(EmbeddedRecord { record, embedding }),
                    Some(Err(e)) => {
                        warn!("dropping {} p{} #{}: {e}", record.filename, record.page, record.chunk_id);
                        report.failures.push(IngestFailure {
                            filename: record.filename,
                            page: record.page,
                            chunk_id: record.chunk_id,
                            reason: e.to_string(),
                        });
                    }
                    None => report.failures.push(IngestFailure {
                        filename: record.filename,
                        page: record.page,
                        chunk_id: record.chunk_id,
                        reason: "embedder returned no result".to_string(),
                    }),
                }
            }
            debug!("embedded {done}/{total}");
            progress(done, total);
        }
        report.failed = report.failures.len();

        if embedded.is_empty() {
            error!("all {total} records failed to embed; nothing persisted");
            return Ok(report);
        }

        if self.replace_existing {
            let filenames: BTreeSet<&str> = embedded.iter().map(|r| r.record.filename.as_str()).collect();
            for name in filenames {
                self.store.delete(&Filter::filename(name)).await?;
            }
        }
        let ids = self.store.insert(embedded).await?;
        self.store.flush().await?;
        report.succeeded = ids.len();

        info!("ingested {}/{} records ({} failed)", report.succeeded, report.attempted, report.failed);
        Ok(report)
    }
}
