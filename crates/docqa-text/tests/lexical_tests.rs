use std::sync::Mutex;

use async_trait::async_trait;
use docqa_core::traits::ChunkStore;
use docqa_core::types::{EmbeddedRecord, ScoredChunk};
use docqa_core::{Chunk, ChunkId, Filter, Result};
use docqa_text::LexicalSearch;

/// Minimal store: evaluates filters in memory and records every predicate it sees.
struct ScanStore {
    chunks: Vec<Chunk>,
    seen: Mutex<Vec<Filter>>,
}

impl ScanStore {
    fn new(contents: &[(&str, i64, &str)]) -> Self {
        let chunks = contents
            .iter()
            .enumerate()
            .map(|(i, (f, p, c))| Chunk {
                id: Some(i as ChunkId),
                filename: f.to_string(),
                page: *p,
                chunk_id: 0,
                content: c.to_string(),
            })
            .collect();
        Self { chunks, seen: Mutex::new(vec![]) }
    }
}

#[async_trait]
impl ChunkStore for ScanStore {
    async fn insert(&self, _records: Vec<EmbeddedRecord>) -> Result<Vec<ChunkId>> {
        Ok(vec![])
    }
    async fn delete(&self, _filter: &Filter) -> Result<()> {
        Ok(())
    }
    async fn query(&self, filter: &Filter, limit: usize) -> Result<Vec<Chunk>> {
        self.seen.lock().unwrap().push(filter.clone());
        Ok(self.chunks.iter().filter(|c| filter.matches(c)).take(limit).cloned().collect())
    }
    async fn search(&self, _v: &[f32], _f: Option<&Filter>, _l: usize) -> Result<Vec<ScoredChunk>> {
        Ok(vec![])
    }
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
    async fn count(&self) -> Result<usize> {
        Ok(self.chunks.len())
    }
}

fn store() -> ScanStore {
    ScanStore::new(&[
        ("doc.pdf", 0, "The quarterly revenue was $5M"),
        ("doc.pdf", 1, "Employee headcount grew 10%"),
        ("report.pdf", 0, "公司营业收入增长明显, revenue up"),
    ])
}

#[tokio::test]
async fn all_stopword_query_returns_nothing_and_never_queries() {
    let store = store();
    let lexical = LexicalSearch::default();
    let hits = lexical.search(&store, "what is the", 10, None).await.unwrap();
    assert!(hits.is_empty());
    assert!(store.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn any_keyword_qualifies() {
    let store = store();
    let hits = LexicalSearch::default().search(&store, "Revenue or headcount?", 10, None).await.unwrap();
    assert_eq!(hits.len(), 3);
}

#[tokio::test]
async fn structural_filter_is_conjoined() {
    let store = store();
    let only_doc = Filter::filename("doc.pdf");
    let hits = LexicalSearch::default().search(&store, "revenue", 10, Some(&only_doc)).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].page, 0);
    let seen = store.seen.lock().unwrap();
    assert!(matches!(&seen[0], Filter::And(parts) if parts[0] == only_doc));
}

#[tokio::test]
async fn cjk_query_matches_by_bigram() {
    let store = store();
    let hits = LexicalSearch::default().search(&store, "营业收入是多少", 10, None).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].filename, "report.pdf");
}

#[tokio::test]
async fn limit_is_respected() {
    let store = store();
    let hits = LexicalSearch::default().search(&store, "revenue headcount", 1, None).await.unwrap();
    assert_eq!(hits.len(), 1);
}

#[test]
fn filter_keyword_cap() {
    let lexical = LexicalSearch::default();
    let kw = lexical.filter_keywords("one two three four five six seven eight");
    assert_eq!(kw.latin, vec!["one", "two", "three", "four", "five"]);
}
