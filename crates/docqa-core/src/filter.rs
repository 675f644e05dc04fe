//! Structural and keyword predicates over stored chunks.
//!
//! A `Filter` is rendered to a SQL predicate for LanceDB and can also be
//! evaluated directly against a `Chunk` by in-memory stores. Both paths must
//! agree: keyword matching is a case-insensitive substring test.

use serde::{Deserialize, Serialize};

use crate::types::{Chunk, ChunkId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Filter {
    /// Restrict to one source document.
    Filename(String),
    /// Restrict to one page of any document.
    Page(i64),
    /// Restrict to a set of primary keys.
    Ids(Vec<ChunkId>),
    /// Content contains at least one of the (lower-case) keywords.
    ContainsAny(Vec<String>),
    And(Vec<Filter>),
}

impl Filter {
    pub fn filename(name: impl Into<String>) -> Self {
        Filter::Filename(name.into())
    }

    /// Matches every chunk.
    pub fn all() -> Self {
        Filter::And(vec![])
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Filter::And(parts) if parts.iter().all(Filter::is_all))
    }

    /// Conjoin an optional structural filter with another predicate.
    pub fn and_then(base: Option<&Filter>, other: Filter) -> Filter {
        match base {
            Some(b) => Filter::And(vec![b.clone(), other]),
            None => other,
        }
    }

    /// Render to a LanceDB/DataFusion SQL predicate.
    pub fn to_sql(&self) -> String {
        match self {
            Filter::Filename(name) => format!("filename = '{}'", escape_literal(name)),
            Filter::Page(page) => format!("page = {page}"),
            Filter::Ids(ids) if ids.is_empty() => "false".to_string(),
            Filter::Ids(ids) => {
                let list = ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(",");
                format!("id IN ({list})")
            }
            Filter::ContainsAny(keywords) if keywords.is_empty() => "false".to_string(),
            Filter::ContainsAny(keywords) => {
                let parts = keywords
                    .iter()
                    .map(|kw| format!("lower(content) LIKE '%{}%'", escape_like(&kw.to_lowercase())))
                    .collect::<Vec<_>>();
                format!("({})", parts.join(" OR "))
            }
            Filter::And(parts) if parts.is_empty() => "true".to_string(),
            Filter::And(parts) => parts
                .iter()
                .map(|p| format!("({})", p.to_sql()))
                .collect::<Vec<_>>()
                .join(" AND "),
        }
    }

    pub fn matches(&self, chunk: &Chunk) -> bool {
        match self {
            Filter::Filename(name) => &chunk.filename == name,
            Filter::Page(page) => chunk.page == *page,
            Filter::Ids(ids) => chunk.id.is_some_and(|id| ids.contains(&id)),
            Filter::ContainsAny(keywords) => {
                let content = chunk.content.to_lowercase();
                keywords.iter().any(|kw| content.contains(&kw.to_lowercase()))
            }
            Filter::And(parts) => parts.iter().all(|p| p.matches(chunk)),
        }
    }
}

fn escape_literal(s: &str) -> String {
    s.replace('\'', "''")
}

// Keywords never contain wildcards in practice; strip them rather than rely on ESCAPE support.
fn escape_like(s: &str) -> String {
    escape_literal(&s.replace(['%', '_'], ""))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(filename: &str, page: i64, content: &str) -> Chunk {
        Chunk { id: Some(7), filename: filename.into(), page, chunk_id: 0, content: content.into() }
    }

    #[test]
    fn sql_rendering() {
        assert_eq!(Filter::filename("o'neil.pdf").to_sql(), "filename = 'o''neil.pdf'");
        let f = Filter::and_then(
            Some(&Filter::filename("doc.pdf")),
            Filter::ContainsAny(vec!["revenue".into(), "营收".into()]),
        );
        assert_eq!(
            f.to_sql(),
            "(filename = 'doc.pdf') AND ((lower(content) LIKE '%revenue%' OR lower(content) LIKE '%营收%'))"
        );
        assert_eq!(Filter::ContainsAny(vec![]).to_sql(), "false");
        assert_eq!(Filter::Ids(vec![1, 2]).to_sql(), "id IN (1,2)");
    }

    #[test]
    fn evaluation_matches_sql_semantics() {
        let c = chunk("doc.pdf", 0, "The quarterly Revenue was $5M");
        assert!(Filter::ContainsAny(vec!["revenue".into()]).matches(&c));
        assert!(!Filter::ContainsAny(vec!["headcount".into()]).matches(&c));
        assert!(!Filter::ContainsAny(vec![]).matches(&c));
        assert!(Filter::And(vec![Filter::filename("doc.pdf"), Filter::Page(0)]).matches(&c));
        assert!(!Filter::And(vec![Filter::filename("other.pdf"), Filter::Page(0)]).matches(&c));
        assert!(Filter::Ids(vec![7]).matches(&c));
        assert!(Filter::all().matches(&c));
        assert!(Filter::all().is_all());
        assert!(!Filter::Page(0).is_all());
    }
}
