use std::sync::Arc;

use async_trait::async_trait;
use docqa_core::traits::{ChunkStore, EmbedOutcome, Embedder};
use docqa_core::types::EmbeddedRecord;
use docqa_core::{ChunkRecord, EmbeddingError, Filter, EMBEDDING_DIM};
use docqa_embed::FakeEmbedder;
use docqa_vector::{self_recall, DenseSearch, LanceChunkStore, MemoryChunkStore};

fn embedded(embedder: &FakeEmbedder, filename: &str, page: i64, content: &str) -> EmbeddedRecord {
    EmbeddedRecord {
        record: ChunkRecord { filename: filename.into(), page, chunk_id: 0, content: content.into() },
        embedding: embedder.embed_sync(content),
    }
}

fn corpus(e: &FakeEmbedder) -> Vec<EmbeddedRecord> {
    vec![
        embedded(e, "doc.pdf", 0, "The quarterly revenue was $5M"),
        embedded(e, "doc.pdf", 1, "Employee headcount grew 10%"),
        embedded(e, "notes.pdf", 0, "Revenue guidance for next year"),
    ]
}

async fn exercise_store(store: &dyn ChunkStore) {
    let e = FakeEmbedder::new(EMBEDDING_DIM);

    let ids = store.insert(corpus(&e)).await.unwrap();
    assert_eq!(ids.len(), 3);
    assert!(ids.windows(2).all(|w| w[0] < w[1]), "ids are monotonic");

    // staged writes are invisible until flush
    assert_eq!(store.count().await.unwrap(), 0);
    assert!(store.query(&Filter::all(), 10).await.unwrap().is_empty());
    store.flush().await.unwrap();
    assert_eq!(store.count().await.unwrap(), 3);

    // case-insensitive substring filter
    let hits = store.query(&Filter::ContainsAny(vec!["revenue".into()]), 10).await.unwrap();
    assert_eq!(hits.len(), 2);

    // exact search ranks the identical text first with ~zero distance
    let q = e.embed_sync("Employee headcount grew 10%");
    let hits = store.search(&q, None, 3).await.unwrap();
    assert_eq!(hits[0].chunk.page, 1);
    assert!(hits[0].distance < 1e-4);
    assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));

    // structural filter restricts the search
    let only_notes = Filter::filename("notes.pdf");
    let hits = store.search(&q, Some(&only_notes), 3).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].chunk.filename, "notes.pdf");

    assert_eq!(store.list_filenames().await.unwrap(), vec!["doc.pdf", "notes.pdf"]);
    assert_eq!(
        store.document_text("doc.pdf").await.unwrap().as_deref(),
        Some("The quarterly revenue was $5M\n\nEmployee headcount grew 10%")
    );
    assert_eq!(store.document_text("missing.pdf").await.unwrap(), None);

    // ids keep increasing after a commit
    let more = store.insert(vec![embedded(&e, "late.pdf", 0, "appendix")]).await.unwrap();
    assert!(more[0] > ids[2]);
    store.flush().await.unwrap();

    store.delete_document("doc.pdf").await.unwrap();
    assert_eq!(store.count().await.unwrap(), 2);
    assert_eq!(store.list_filenames().await.unwrap(), vec!["late.pdf", "notes.pdf"]);
}

#[tokio::test]
async fn memory_store_contract() {
    exercise_store(&MemoryChunkStore::new()).await;
}

#[tokio::test]
async fn lance_store_contract() {
    let tmp = tempfile::tempdir().unwrap();
    let store = LanceChunkStore::open(&tmp.path().to_string_lossy(), "chunks").await.unwrap();
    exercise_store(&store).await;
}

#[tokio::test]
async fn lance_ids_continue_after_reopen() {
    let tmp = tempfile::tempdir().unwrap();
    let uri = tmp.path().to_string_lossy().to_string();
    let e = FakeEmbedder::new(EMBEDDING_DIM);
    let first = {
        let store = LanceChunkStore::open(&uri, "chunks").await.unwrap();
        let ids = store.insert(corpus(&e)).await.unwrap();
        store.flush().await.unwrap();
        ids
    };
    let store = LanceChunkStore::open(&uri, "chunks").await.unwrap();
    let ids = store.insert(vec![embedded(&e, "b.pdf", 0, "more text")]).await.unwrap();
    assert_eq!(ids[0], first[2] + 1);
}

#[tokio::test]
async fn lance_rejects_wrong_dimension() {
    let tmp = tempfile::tempdir().unwrap();
    let store = LanceChunkStore::open(&tmp.path().to_string_lossy(), "chunks").await.unwrap();
    let bad = EmbeddedRecord {
        record: ChunkRecord { filename: "x".into(), page: 0, chunk_id: 0, content: "x".into() },
        embedding: vec![0.0; 3],
    };
    assert!(store.insert(vec![bad]).await.is_err());
}

#[tokio::test]
async fn delete_then_insert_in_one_flush_keeps_new_rows() {
    let store = MemoryChunkStore::new();
    let e = FakeEmbedder::new(EMBEDDING_DIM);
    store.insert(corpus(&e)).await.unwrap();
    store.flush().await.unwrap();
    store.delete(&Filter::filename("doc.pdf")).await.unwrap();
    store.insert(vec![embedded(&e, "doc.pdf", 0, "re-ingested")]).await.unwrap();
    store.flush().await.unwrap();
    let docs = store.query(&Filter::filename("doc.pdf"), 10).await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].content, "re-ingested");
}

struct DownEmbedder;

#[async_trait]
impl Embedder for DownEmbedder {
    fn dim(&self) -> usize {
        EMBEDDING_DIM
    }
    async fn embed(&self, _text: &str) -> EmbedOutcome {
        Err(EmbeddingError::Transient("connection refused".into()))
    }
}

#[tokio::test]
async fn dense_search_degrades_on_embedding_failure() {
    let store = MemoryChunkStore::new();
    let e = FakeEmbedder::new(EMBEDDING_DIM);
    store.insert(corpus(&e)).await.unwrap();
    store.flush().await.unwrap();

    let down = DenseSearch::new(Arc::new(DownEmbedder));
    assert!(down.search(&store, "revenue", 5, None).await.unwrap().is_empty());

    let up = DenseSearch::new(Arc::new(e));
    let hits = up.search(&store, "revenue", 5, None).await.unwrap();
    assert_eq!(hits.len(), 3);
}

#[tokio::test]
async fn self_recall_is_perfect_for_exact_search() {
    let store = MemoryChunkStore::new();
    let e = FakeEmbedder::new(EMBEDDING_DIM);
    store.insert(corpus(&e)).await.unwrap();
    store.flush().await.unwrap();

    let report = self_recall(&store, &e, 20).await.unwrap();
    assert_eq!(report.sampled, 3);
    assert_eq!(report.hits, 3);
    assert_eq!(report.rate(), Some(100.0));

    let down = self_recall(&store, &DownEmbedder, 2).await.unwrap();
    assert_eq!((down.sampled, down.hits, down.skipped), (2, 0, 2));

    let empty = self_recall(&MemoryChunkStore::new(), &e, 5).await.unwrap();
    assert_eq!(empty.rate(), None);
}
