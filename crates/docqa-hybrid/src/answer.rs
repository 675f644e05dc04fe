//! Retrieval-augmented answers and document summaries.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;

use docqa_core::config::AnswerSettings;
use docqa_core::traits::{ChatMessage, ChatModel};
use docqa_core::types::RetrievedChunk;
use docqa_core::{Error, Filter, Result};
use docqa_embed::http::truncate_chars;
use serde::Serialize;
use tracing::{debug, info};

use crate::expand::QueryExpander;
use crate::retriever::HybridRetriever;

/// Answer text when retrieval surfaces nothing; the chat model is not asked.
pub const NOTHING_FOUND: &str = "No relevant content found.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceRef {
    pub filename: String,
    /// 1-based page number.
    pub page: i64,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<SourceRef>,
    /// Top composite score capped at 100; 0 when nothing was retrieved.
    pub confidence: f32,
    /// False when retrieval came back empty and `text` is [`NOTHING_FOUND`].
    pub found: bool,
}

impl Answer {
    pub fn nothing_found() -> Self {
        Self { text: NOTHING_FOUND.to_string(), sources: Vec::new(), confidence: 0.0, found: false }
    }
}

pub struct Answerer {
    retriever: Arc<HybridRetriever>,
    chat: Arc<dyn ChatModel>,
    expander: QueryExpander,
    settings: AnswerSettings,
}

impl Answerer {
    pub fn new(retriever: Arc<HybridRetriever>, chat: Arc<dyn ChatModel>, settings: AnswerSettings) -> Self {
        let expander = QueryExpander::new(chat.clone());
        Self { retriever, chat, expander, settings }
    }

    pub async fn ask(&self, question: &str, filter: Option<&Filter>) -> Result<Answer> {
        if question.trim().is_empty() {
            return Err(Error::Operation("question is empty".to_string()));
        }
        let query = if self.settings.expand_query {
            self.expander.expand(question).await
        } else {
            question.to_string()
        };

        let mut context = self.retriever.retrieve(&query, self.settings.search_top_k, filter).await?;
        if context.is_empty() {
            info!("no chunks retrieved for `{question}`");
            return Ok(Answer::nothing_found());
        }
        context.truncate(self.settings.context_chunks);
        let confidence = context.first().map_or(0.0, |c| c.composite_score.min(100.0));
        debug!("answering with {} context chunks", context.len());

        let prompt = build_answer_prompt(question, &context, self.settings.snippet_chars);
        let text = self.chat.chat(&[ChatMessage::user(prompt)], None).await?;
        Ok(Answer { text, sources: collect_sources(&context), confidence, found: true })
    }

    /// Short summary of one stored document.
    pub async fn summarize(&self, filename: &str) -> Result<String> {
        let text = self
            .retriever
            .store()
            .document_text(filename)
            .await?
            .ok_or_else(|| Error::NotFound(format!("document `{filename}`")))?;
        let excerpt = truncate_chars(&text, self.settings.summary_input_chars);
        info!("summarizing {filename} ({} of {} chars)", excerpt.chars().count(), text.chars().count());
        let prompt = format!(
            "Write a concise summary (under 200 words) of the following document and list its key data points:\n\n{excerpt}"
        );
        self.chat.chat(&[ChatMessage::user(prompt)], None).await
    }
}

/// Context block with one labelled snippet per chunk, then the question.
/// Pages are labelled 1-based, matching [`SourceRef::page`].
pub fn build_answer_prompt(question: &str, chunks: &[RetrievedChunk], snippet_chars: usize) -> String {
    let mut context = String::new();
    for (i, c) in chunks.iter().enumerate() {
        let flattened = c.content.replace('\n', " ");
        let snippet = truncate_chars(&flattened, snippet_chars);
        let _ = writeln!(context, "[Source {} ({} p.{})]: {snippet}\n", i + 1, c.filename, c.page + 1);
    }
    format!(
        "Answer the question using the sources below. If they do not contain the answer, \
         answer from general knowledge and say so.\n\n[Sources]:\n{context}\n[Question]:\n{question}"
    )
}

/// One entry per `(filename, page)` in first-seen order.
pub fn collect_sources(chunks: &[RetrievedChunk]) -> Vec<SourceRef> {
    let mut seen = HashSet::new();
    chunks
        .iter()
        .filter(|c| seen.insert((c.filename.as_str(), c.page)))
        .map(|c| SourceRef { filename: c.filename.clone(), page: c.page + 1, score: c.composite_score })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn retrieved(filename: &str, page: i64, content: &str, score: f32) -> RetrievedChunk {
        RetrievedChunk {
            id: None,
            content: content.into(),
            filename: filename.into(),
            page,
            chunk_id: 0,
            composite_score: score,
        }
    }

    #[test]
    fn nothing_found_answer_is_flagged() {
        let answer = Answer::nothing_found();
        assert!(!answer.found);
        assert_eq!(answer.text, NOTHING_FOUND);
        assert!(answer.sources.is_empty());
        assert_eq!(answer.confidence, 0.0);
    }

    #[test]
    fn prompt_labels_and_truncates_snippets() {
        let long = "x".repeat(1000);
        let prompt = build_answer_prompt("q", &[retrieved("a.pdf", 0, &long, 90.0)], 800);
        assert!(prompt.contains("[Source 1 (a.pdf p.1)]"));
        assert!(prompt.contains(&"x".repeat(800)));
        assert!(!prompt.contains(&"x".repeat(801)));
        assert!(prompt.ends_with("[Question]:\nq"));
    }

    #[test]
    fn sources_are_deduplicated_per_page() {
        let chunks = vec![
            retrieved("a.pdf", 0, "one", 90.0),
            retrieved("a.pdf", 0, "two", 80.0),
            retrieved("a.pdf", 1, "three", 70.0),
            retrieved("b.pdf", 0, "four", 60.0),
        ];
        let sources = collect_sources(&chunks);
        let pages: Vec<(&str, i64)> = sources.iter().map(|s| (s.filename.as_str(), s.page)).collect();
        assert_eq!(pages, vec![("a.pdf", 1), ("a.pdf", 2), ("b.pdf", 1)]);
        assert_eq!(sources[0].score, 90.0);
    }
}
