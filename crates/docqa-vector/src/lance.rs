//! LanceDB-backed `ChunkStore`.
//!
//! Inserts and deletes are staged in memory in call order and applied by
//! `flush`, so reads never observe half of an ingestion batch. A failed
//! `flush` keeps the failed op and everything after it staged. Dense search
//! is exact: the vector index is bypassed and every row is compared by L2.

use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

use arrow_array::cast::AsArray;
use arrow_array::types::{Float32Type, Int64Type};
use arrow_array::{
    Array, FixedSizeListArray, Int64Array, RecordBatch, RecordBatchIterator, StringArray,
    TimestampMillisecondArray,
};
use async_trait::async_trait;
use chrono::Utc;
use futures::{Stream, TryStreamExt};
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{DistanceType, Table};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use docqa_core::traits::ChunkStore;
use docqa_core::types::{EmbeddedRecord, ScoredChunk};
use docqa_core::{Chunk, ChunkId, Error, Filter, Result, EMBEDDING_DIM};

use crate::schema::{build_chunk_schema, vector_dim, CHUNK_COLUMNS, DISTANCE_COLUMN};
use crate::staging::{apply_in_order, ApplyOp};
use crate::table::{open_db, open_or_create, store_err};

enum PendingOp {
    Insert(Vec<(ChunkId, EmbeddedRecord)>),
    Delete(Filter),
}

#[derive(Default)]
struct Staging {
    ops: VecDeque<PendingOp>,
    next_id: Option<ChunkId>,
}

pub struct LanceChunkStore {
    table: Table,
    staging: Mutex<Staging>,
}

impl LanceChunkStore {
    pub async fn open(uri: &str, table_name: &str) -> Result<Self> {
        let conn = open_db(uri).await?;
        let table = open_or_create(&conn, table_name, build_chunk_schema()).await?;
        debug!("opened chunk table `{table_name}` at {uri}");
        Ok(Self { table, staging: Mutex::new(Staging::default()) })
    }

    async fn max_committed_id(&self) -> Result<Option<ChunkId>> {
        let mut stream = self
            .table
            .query()
            .select(Select::columns(&["id"]))
            .execute()
            .await
            .map_err(store_err)?;
        let mut max: Option<ChunkId> = None;
        while let Some(batch) = stream.try_next().await.map_err(store_err)? {
            let ids = i64_column(&batch, "id")?;
            for id in ids.iter().flatten() {
                max = Some(max.map_or(id, |m| m.max(id)));
            }
        }
        Ok(max)
    }

    async fn apply_insert(&self, rows: &[(ChunkId, EmbeddedRecord)]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let n = rows.len();
        let batch = rows_to_record_batch(rows)?;
        let schema = batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
        self.table.add(reader).execute().await.map_err(store_err)?;
        debug!("committed {n} chunk rows");
        Ok(())
    }
}

#[async_trait]
impl ApplyOp<PendingOp> for LanceChunkStore {
    async fn apply(&self, op: &PendingOp) -> Result<()> {
        match op {
            PendingOp::Insert(rows) => self.apply_insert(rows).await,
            PendingOp::Delete(filter) => self.table.delete(&filter.to_sql()).await.map(|_| ()).map_err(store_err),
        }
    }
}

#[async_trait]
impl ChunkStore for LanceChunkStore {
    async fn insert(&self, records: Vec<EmbeddedRecord>) -> Result<Vec<ChunkId>> {
        for r in &records {
            if r.embedding.len() != EMBEDDING_DIM {
                return Err(Error::Operation(format!(
                    "embedding for {} p{} has dimension {}, expected {EMBEDDING_DIM}",
                    r.record.filename,
                    r.record.page,
                    r.embedding.len()
                )));
            }
        }
        let mut staging = self.staging.lock().await;
        let mut next = match staging.next_id {
            Some(id) => id,
            None => self.max_committed_id().await?.map_or(1, |m| m + 1),
        };
        let mut rows = Vec::with_capacity(records.len());
        let mut ids = Vec::with_capacity(records.len());
        for record in records {
            ids.push(next);
            rows.push((next, record));
            next += 1;
        }
        staging.next_id = Some(next);
        staging.ops.push_back(PendingOp::Insert(rows));
        Ok(ids)
    }

    async fn delete(&self, filter: &Filter) -> Result<()> {
        self.staging.lock().await.ops.push_back(PendingOp::Delete(filter.clone()));
        Ok(())
    }

    async fn query(&self, filter: &Filter, limit: usize) -> Result<Vec<Chunk>> {
        let mut query = self.table.query().select(Select::columns(&CHUNK_COLUMNS));
        if !filter.is_all() {
            query = query.only_if(filter.to_sql());
        }
        if limit < usize::MAX {
            query = query.limit(limit);
        }
        let stream = query.execute().await.map_err(store_err)?;
        let chunks = collect_chunks(stream).await?;
        Ok(chunks.into_iter().map(|(c, _)| c).collect())
    }

    async fn search(&self, vector: &[f32], filter: Option<&Filter>, limit: usize) -> Result<Vec<ScoredChunk>> {
        let mut query = self
            .table
            .vector_search(vector.to_vec())
            .map_err(|e| Error::Operation(e.to_string()))?
            .distance_type(DistanceType::L2)
            .bypass_vector_index()
            .select(Select::columns(&CHUNK_COLUMNS))
            .limit(limit);
        if let Some(f) = filter.filter(|f| !f.is_all()) {
            query = query.only_if(f.to_sql());
        }
        let stream = query.execute().await.map_err(store_err)?;
        let mut hits: Vec<ScoredChunk> = collect_chunks(stream)
            .await?
            .into_iter()
            .map(|(chunk, d)| ScoredChunk { chunk, distance: d.unwrap_or(f32::MAX).max(0.0) })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        Ok(hits)
    }

    async fn flush(&self) -> Result<()> {
        let mut staging = self.staging.lock().await;
        if staging.ops.is_empty() {
            return Ok(());
        }
        let outcome = apply_in_order(&mut staging.ops, self).await;
        match outcome {
            Ok(n) => {
                info!("flushed {n} staged write(s)");
                Ok(())
            }
            Err(e) => {
                warn!("flush stopped, {} staged write(s) kept: {e}", staging.ops.len());
                Err(e)
            }
        }
    }

    async fn count(&self) -> Result<usize> {
        self.table.count_rows(None).await.map_err(store_err)
    }

    async fn list_filenames(&self) -> Result<Vec<String>> {
        let stream = self
            .table
            .query()
            .select(Select::columns(&["filename"]))
            .execute()
            .await
            .map_err(store_err)?;
        let batches: Vec<RecordBatch> = stream.try_collect().await.map_err(store_err)?;
        let mut names = BTreeSet::new();
        for batch in &batches {
            let col = string_column(batch, "filename")?;
            names.extend(col.iter().flatten().map(str::to_string));
        }
        Ok(names.into_iter().collect())
    }
}

fn rows_to_record_batch(rows: &[(ChunkId, EmbeddedRecord)]) -> Result<RecordBatch> {
    let now = Utc::now().timestamp_millis();
    let ids: Vec<i64> = rows.iter().map(|(id, _)| *id).collect();
    let filenames: Vec<&str> = rows.iter().map(|(_, r)| r.record.filename.as_str()).collect();
    let pages: Vec<i64> = rows.iter().map(|(_, r)| r.record.page).collect();
    let chunk_ids: Vec<i64> = rows.iter().map(|(_, r)| r.record.chunk_id).collect();
    let contents: Vec<&str> = rows.iter().map(|(_, r)| r.record.content.as_str()).collect();
    let ingested = vec![now; rows.len()];
    let vectors = rows.iter().map(|(_, r)| Some(r.embedding.iter().copied().map(Some)));
    RecordBatch::try_new(
        build_chunk_schema(),
        vec![
            Arc::new(Int64Array::from(ids)),
            Arc::new(StringArray::from(filenames)),
            Arc::new(Int64Array::from(pages)),
            Arc::new(Int64Array::from(chunk_ids)),
            Arc::new(StringArray::from(contents)),
            Arc::new(TimestampMillisecondArray::from(ingested)),
            Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors, vector_dim())),
        ],
    )
    .map_err(|e| Error::Operation(format!("build record batch: {e}")))
}

async fn collect_chunks<S, E>(stream: S) -> Result<Vec<(Chunk, Option<f32>)>>
where
    S: Stream<Item = std::result::Result<RecordBatch, E>>,
    E: std::fmt::Display,
{
    let batches: Vec<RecordBatch> = stream.try_collect().await.map_err(store_err)?;
    let mut out = Vec::new();
    for batch in &batches {
        out.extend(batch_to_chunks(batch)?);
    }
    Ok(out)
}

fn column_missing(name: &str) -> Error {
    Error::StoreUnavailable(format!("column `{name}` missing or mistyped"))
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| column_missing(name))
}

fn i64_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Int64Array> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_primitive_opt::<Int64Type>())
        .ok_or_else(|| column_missing(name))
}

fn batch_to_chunks(batch: &RecordBatch) -> Result<Vec<(Chunk, Option<f32>)>> {
    let ids = i64_column(batch, "id")?;
    let filenames = string_column(batch, "filename")?;
    let pages = i64_column(batch, "page")?;
    let chunk_ids = i64_column(batch, "chunk_id")?;
    let contents = string_column(batch, "content")?;
    let distances = batch.column_by_name(DISTANCE_COLUMN).and_then(|c| c.as_primitive_opt::<Float32Type>());
    let mut out = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        let chunk = Chunk {
            id: (!ids.is_null(i)).then(|| ids.value(i)),
            filename: filenames.value(i).to_string(),
            page: pages.value(i),
            chunk_id: chunk_ids.value(i),
            content: contents.value(i).to_string(),
        };
        let distance = distances.filter(|d| !d.is_null(i)).map(|d| d.value(i));
        out.push((chunk, distance));
    }
    Ok(out)
}
