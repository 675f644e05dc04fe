//! Composite reranker.
//!
//! The base score is a weighted sum of four 0-100 signals: fuzzy partial
//! match, keyword coverage, vector similarity and a content-length shape.
//! Two bonuses are added on top: a position bonus from the candidate's rank
//! in its origin channel and a flat entity-overlap bonus.

use std::collections::HashSet;

use docqa_core::config::RerankSettings;
use docqa_text::{entity_overlap, extract_entities, KeywordExtractor};
use serde::Serialize;

use crate::fusion::RetrievalCandidate;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub fuzzy: f32,
    pub keyword_coverage: f32,
    pub vector_similarity: f32,
    pub length: f32,
    pub position_bonus: f32,
    pub entity_bonus: f32,
    pub composite: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedCandidate {
    pub candidate: RetrievalCandidate,
    pub score: ScoreBreakdown,
}

/// Query-side features computed once per rerank call.
struct QueryFeatures {
    lowered: Vec<char>,
    keywords: HashSet<String>,
    entities: Vec<String>,
}

#[derive(Clone)]
pub struct Reranker {
    settings: RerankSettings,
    keywords: KeywordExtractor,
}

impl Reranker {
    pub fn new(settings: RerankSettings, keywords: KeywordExtractor) -> Self {
        Self { settings, keywords }
    }

    pub fn settings(&self) -> &RerankSettings {
        &self.settings
    }

    /// Score every candidate and sort descending by composite; ties keep input order.
    pub fn rerank(&self, query: &str, candidates: Vec<RetrievalCandidate>) -> Vec<RankedCandidate> {
        let features = self.query_features(query);
        let mut ranked: Vec<RankedCandidate> = candidates
            .into_iter()
            .map(|candidate| {
                let score = self.score_with(&features, &candidate);
                RankedCandidate { candidate, score }
            })
            .collect();
        ranked.sort_by(|a, b| b.score.composite.total_cmp(&a.score.composite));
        ranked
    }

    pub fn score(&self, query: &str, candidate: &RetrievalCandidate) -> ScoreBreakdown {
        self.score_with(&self.query_features(query), candidate)
    }

    fn query_features(&self, query: &str) -> QueryFeatures {
        QueryFeatures {
            lowered: query.to_lowercase().chars().collect(),
            keywords: self.keywords.extract(query).into_vec().into_iter().collect(),
            entities: extract_entities(query),
        }
    }

    fn score_with(&self, q: &QueryFeatures, candidate: &RetrievalCandidate) -> ScoreBreakdown {
        let s = &self.settings;
        let content = &candidate.chunk.content;

        let fuzzy = {
            let lowered: Vec<char> = content.to_lowercase().chars().take(s.fuzzy_max_chars).collect();
            partial_ratio(&q.lowered, &lowered)
        };
        let keyword_coverage = if q.keywords.is_empty() {
            0.0
        } else {
            let content_keywords = self.keywords.extract(content);
            let found = content_keywords.iter().filter(|k| q.keywords.contains(k.as_str())).count();
            found as f32 / q.keywords.len() as f32 * 100.0
        };
        let vector_similarity = match candidate.distance.filter(|d| d.is_finite()) {
            Some(d) => 100.0 / (1.0 + d.max(0.0) * s.distance_scale),
            None => s.lexical_neutral_similarity,
        };
        let length = self.length_score(content.chars().count());

        let position_bonus = (s.position_bonus_cap - candidate.rank as f32).max(0.0);
        let entity_bonus = if entity_overlap(&q.entities, content) { s.entity_bonus } else { 0.0 };

        let base = fuzzy * s.fuzzy_weight
            + keyword_coverage * s.keyword_weight
            + vector_similarity * s.vector_weight
            + length * s.length_weight;
        ScoreBreakdown {
            fuzzy,
            keyword_coverage,
            vector_similarity,
            length,
            position_bonus,
            entity_bonus,
            composite: base + position_bonus + entity_bonus,
        }
    }

    fn length_score(&self, len: usize) -> f32 {
        let (lo, hi) = (self.settings.sweet_spot_min, self.settings.sweet_spot_max);
        if (lo..=hi).contains(&len) {
            100.0
        } else if len < lo {
            50.0 + len as f32 / lo as f32 * 50.0
        } else {
            100.0 - ((len - hi) as f32 / 20.0).min(50.0)
        }
    }
}

/// Best similarity (0-100) between the shorter sequence and any substring of
/// the longer one, from the minimal edit distance over all substrings.
pub fn partial_ratio(a: &[char], b: &[char]) -> f32 {
    let (pattern, text) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let m = pattern.len();
    if m == 0 {
        return 0.0;
    }
    // prev[j]: edit distance of pattern[..i] against the best substring ending at text[j]
    let mut prev = vec![0usize; text.len() + 1];
    let mut cur = vec![0usize; text.len() + 1];
    for (i, &pc) in pattern.iter().enumerate() {
        cur[0] = i + 1;
        for (j, &tc) in text.iter().enumerate() {
            let substitution = prev[j] + usize::from(pc != tc);
            cur[j + 1] = substitution.min(prev[j + 1] + 1).min(cur[j] + 1);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    let best = prev.iter().copied().min().unwrap_or(m).min(m);
    (1.0 - best as f32 / m as f32) * 100.0
}

#[cfg(test)]
mod tests {
    use docqa_core::types::SourceKind;
    use docqa_core::Chunk;

    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    fn candidate(id: i64, content: &str, rank: usize, distance: Option<f32>) -> RetrievalCandidate {
        RetrievalCandidate {
            chunk: Chunk { id: Some(id), filename: "doc.pdf".into(), page: id, chunk_id: 0, content: content.into() },
            source: if distance.is_some() { SourceKind::Dense } else { SourceKind::Lexical },
            rank,
            distance,
            fused_score: 0.0,
        }
    }

    fn reranker() -> Reranker {
        Reranker::new(RerankSettings::default(), KeywordExtractor::default())
    }

    #[test]
    fn partial_ratio_scores() {
        assert_eq!(partial_ratio(&chars("revenue"), &chars("the quarterly revenue was")), 100.0);
        assert_eq!(partial_ratio(&chars("the quarterly revenue was"), &chars("revenue")), 100.0);
        let one_typo = partial_ratio(&chars("revenue"), &chars("total revenve up"));
        assert!((one_typo - 100.0 * 6.0 / 7.0).abs() < 1e-4);
        assert_eq!(partial_ratio(&chars(""), &chars("abc")), 0.0);
        assert_eq!(partial_ratio(&chars("xyz"), &chars("abc")), 0.0);
    }

    #[test]
    fn length_shape() {
        let r = reranker();
        assert_eq!(r.length_score(0), 50.0);
        assert_eq!(r.length_score(100), 75.0);
        assert_eq!(r.length_score(200), 100.0);
        assert_eq!(r.length_score(600), 100.0);
        assert_eq!(r.length_score(800), 90.0);
        assert_eq!(r.length_score(10_000), 50.0);
    }

    #[test]
    fn vector_similarity_and_neutral_value() {
        let r = reranker();
        let dense = r.score("q", &candidate(1, "text", 0, Some(10.0)));
        assert!((dense.vector_similarity - 50.0).abs() < 1e-4);
        let lexical = r.score("q", &candidate(1, "text", 0, None));
        assert_eq!(lexical.vector_similarity, 80.0);
        let broken = r.score("q", &candidate(1, "text", 0, Some(f32::NAN)));
        assert_eq!(broken.vector_similarity, 80.0);
    }

    #[test]
    fn bonuses() {
        let r = reranker();
        let s = r.score("What did Tesla earn", &candidate(1, "Tesla earned more", 3, None));
        assert_eq!(s.position_bonus, 17.0);
        assert_eq!(s.entity_bonus, 30.0);
        let s = r.score("what did tesla earn", &candidate(1, "Tesla earned more", 25, None));
        assert_eq!(s.position_bonus, 0.0);
        assert_eq!(s.entity_bonus, 0.0);
    }

    #[test]
    fn keyword_coverage_uses_stopword_filtered_keywords() {
        let r = reranker();
        let s = r.score("what is the revenue and headcount", &candidate(1, "Revenue rose", 0, None));
        assert_eq!(s.keyword_coverage, 50.0);
        let s = r.score("what is the", &candidate(1, "anything", 0, None));
        assert_eq!(s.keyword_coverage, 0.0);
    }

    #[test]
    fn composite_is_weighted_sum_plus_bonuses() {
        let r = reranker();
        let s = r.score("revenue", &candidate(1, "The quarterly revenue was $5M", 0, Some(0.0)));
        let base = s.fuzzy * 0.25 + s.keyword_coverage * 0.25 + s.vector_similarity * 0.35 + s.length * 0.15;
        assert!((s.composite - (base + s.position_bonus + s.entity_bonus)).abs() < 1e-4);
    }

    #[test]
    fn scores_do_not_depend_on_insertion_order() {
        let r = reranker();
        let items = vec![
            candidate(1, "The quarterly revenue was $5M", 0, Some(0.4)),
            candidate(2, "Employee headcount grew 10%", 1, Some(0.9)),
            candidate(3, "Revenue guidance", 0, None),
            candidate(4, "Revenue guidance", 0, None),
        ];
        let forward = r.rerank("revenue", items.clone());
        let mut reversed_input = items;
        reversed_input.reverse();
        let backward = r.rerank("revenue", reversed_input);

        let score_of = |ranked: &[RankedCandidate], id: i64| {
            ranked.iter().find(|c| c.candidate.chunk.id == Some(id)).map(|c| c.score.composite)
        };
        for id in 1..=4 {
            assert_eq!(score_of(&forward, id), score_of(&backward, id));
        }
        assert!(forward.windows(2).all(|w| w[0].score.composite >= w[1].score.composite));
        // equal scores keep their pre-sort order
        let pos = |ranked: &[RankedCandidate], id: i64| ranked.iter().position(|c| c.candidate.chunk.id == Some(id));
        assert!(pos(&forward, 3) < pos(&forward, 4));
        assert!(pos(&backward, 4) < pos(&backward, 3));
    }
}
