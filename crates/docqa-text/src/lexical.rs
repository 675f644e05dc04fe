//! Recall-biased substring search over stored chunk content.

use docqa_core::traits::ChunkStore;
use docqa_core::{Chunk, Filter, Result};
use tracing::debug;

use crate::keywords::{KeywordExtractor, Keywords};

#[derive(Clone)]
pub struct LexicalSearch {
    extractor: KeywordExtractor,
    max_per_script: usize,
}

impl Default for LexicalSearch {
    fn default() -> Self {
        Self::new(KeywordExtractor::default(), 5)
    }
}

impl LexicalSearch {
    pub fn new(extractor: KeywordExtractor, max_per_script: usize) -> Self {
        Self { extractor, max_per_script }
    }

    pub fn extractor(&self) -> &KeywordExtractor {
        &self.extractor
    }

    /// Keywords that go into the filter: each script partition capped.
    pub fn filter_keywords(&self, query: &str) -> Keywords {
        self.extractor.extract(query).capped(self.max_per_script)
    }

    /// Disjunctive keyword predicate conjoined with the optional structural filter.
    /// `None` when the query has no usable keywords.
    pub fn build_filter(&self, query: &str, filter: Option<&Filter>) -> Option<Filter> {
        let keywords = self.filter_keywords(query);
        if keywords.is_empty() {
            return None;
        }
        Some(Filter::and_then(filter, Filter::ContainsAny(keywords.into_vec())))
    }

    /// Hits come back in store order; they carry no relevance score.
    pub async fn search(
        &self,
        store: &dyn ChunkStore,
        query: &str,
        limit: usize,
        filter: Option<&Filter>,
    ) -> Result<Vec<Chunk>> {
        let Some(predicate) = self.build_filter(query, filter) else {
            debug!("lexical: no usable keywords in query");
            return Ok(vec![]);
        };
        let hits = store.query(&predicate, limit).await?;
        debug!("lexical: {} hits for `{}`", hits.len(), predicate.to_sql());
        Ok(hits)
    }
}
