//! Retrieval evaluation over a question set built from stored chunks.
//!
//! Each case pairs a generated question with the chunk it was written from.
//! Two measurements per case, both at `top_k`:
//! - self-recall: the chunk's own text, embedded and searched exactly, finds the chunk
//! - hybrid recall: the question, run through the full retriever, surfaces the
//!   target document, page and chunk
//!
//! Question sets are stored as `.jsonl` so a run can be repeated against the
//! same questions after re-ingestion or retuning.

use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use docqa_core::traits::{ChatMessage, ChatModel, Embedder};
use docqa_core::types::RetrievedChunk;
use docqa_core::{Chunk, ChunkId, Error, Filter, Result};
use docqa_embed::http::truncate_chars;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::retriever::HybridRetriever;

pub const DEFAULT_TOP_K: usize = 50;
/// Chunks read from the store before sampling.
const SAMPLE_POOL: usize = 3_000;
/// Extra samples drawn to cover skipped chunks and failed generations.
const OVERSAMPLE: usize = 50;
const MIN_SOURCE_CHARS: usize = 60;
const PROMPT_SNIPPET_CHARS: usize = 500;
const MAX_SOURCE_CHARS: usize = 800;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalCase {
    pub question: String,
    pub source_content: String,
    pub target_id: ChunkId,
    pub filename: String,
    pub page: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EvalReport {
    pub cases: usize,
    pub top_k: usize,
    pub self_recall: usize,
    pub doc_hits: usize,
    pub page_hits: usize,
    pub chunk_hits: usize,
    /// Cases whose source text could not be embedded; self-recall misses.
    pub unembedded: usize,
}

impl EvalReport {
    /// `hits` as a percentage of all cases.
    pub fn pct(&self, hits: usize) -> f64 {
        if self.cases == 0 {
            return 0.0;
        }
        hits as f64 * 100.0 / self.cases as f64
    }
}

/// Where the question set comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DatasetMode {
    /// Read a saved set; fail when it is missing or empty.
    Load,
    /// Generate a new set and overwrite the saved one.
    Generate,
    /// Load when a non-empty saved set exists, otherwise generate and save.
    #[default]
    Auto,
}

impl FromStr for DatasetMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "load" => Ok(Self::Load),
            "generate" => Ok(Self::Generate),
            "auto" => Ok(Self::Auto),
            other => Err(format!("unknown dataset mode `{other}` (expected load, generate or auto)")),
        }
    }
}

pub struct Evaluator {
    retriever: Arc<HybridRetriever>,
    embedder: Arc<dyn Embedder>,
    chat: Arc<dyn ChatModel>,
    top_k: usize,
}

impl Evaluator {
    pub fn new(retriever: Arc<HybridRetriever>, embedder: Arc<dyn Embedder>, chat: Arc<dyn ChatModel>) -> Self {
        Self { retriever, embedder, chat, top_k: DEFAULT_TOP_K }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn question_prompt(snippet: &str) -> String {
        format!(
            "Based on the following text snippet, generate a search query in English.\n\
             Snippet: {snippet}\n\
             Output only the question text."
        )
    }

    /// Up to `samples` cases from randomly sampled chunks. Chunks shorter
    /// than 60 characters are skipped, as are chunks whose question could
    /// not be generated.
    pub async fn generate_cases(&self, samples: usize) -> Result<Vec<EvalCase>> {
        let pool = self.retriever.store().query(&Filter::all(), SAMPLE_POOL).await?;
        let picked: Vec<Chunk> = pool
            .choose_multiple(&mut rand::thread_rng(), (samples + OVERSAMPLE).min(pool.len()))
            .cloned()
            .collect();

        let mut cases = Vec::with_capacity(samples);
        for chunk in picked {
            if cases.len() >= samples {
                break;
            }
            let Some(target_id) = chunk.id else { continue };
            if chunk.content.chars().count() < MIN_SOURCE_CHARS {
                continue;
            }
            let prompt = Self::question_prompt(truncate_chars(&chunk.content, PROMPT_SNIPPET_CHARS));
            match self.chat.chat(&[ChatMessage::user(prompt)], None).await {
                Ok(question) if !question.trim().is_empty() => cases.push(EvalCase {
                    question: question.trim().to_string(),
                    source_content: chunk.content,
                    target_id,
                    filename: chunk.filename,
                    page: chunk.page,
                }),
                Ok(_) => debug!("empty question for chunk {target_id}"),
                Err(e) => warn!("question generation for chunk {target_id} failed: {e}"),
            }
        }
        info!("generated {} evaluation case(s) from a pool of {}", cases.len(), pool.len());
        Ok(cases)
    }

    /// Resolve the question set for `mode`, saving freshly generated sets to `path`.
    pub async fn prepare_cases(&self, mode: DatasetMode, path: &Path, samples: usize) -> Result<Vec<EvalCase>> {
        if mode != DatasetMode::Generate && (mode == DatasetMode::Load || path.exists()) {
            match load_cases(path) {
                Ok(cases) if !cases.is_empty() => return Ok(cases),
                Ok(_) if mode == DatasetMode::Load => {
                    return Err(Error::Operation(format!("{}: no evaluation cases", path.display())));
                }
                Err(e) if mode == DatasetMode::Load => return Err(e),
                Ok(_) => info!("{} is empty; generating", path.display()),
                Err(e) => warn!("could not load {}: {e}; generating", path.display()),
            }
        }
        let cases = self.generate_cases(samples).await?;
        if cases.is_empty() {
            return Err(Error::Operation("no evaluation cases could be generated".to_string()));
        }
        save_cases(path, &cases)?;
        info!("saved {} case(s) to {}", cases.len(), path.display());
        Ok(cases)
    }

    pub async fn evaluate(&self, cases: &[EvalCase]) -> Result<EvalReport> {
        self.evaluate_with_progress(cases, |_, _| {}).await
    }

    /// Store errors abort the run; embedding failures count as self-recall misses.
    pub async fn evaluate_with_progress<P>(&self, cases: &[EvalCase], mut progress: P) -> Result<EvalReport>
    where
        P: FnMut(usize, usize) + Send,
    {
        let mut report = EvalReport { cases: cases.len(), top_k: self.top_k, ..EvalReport::default() };
        let store = self.retriever.store();
        for (i, case) in cases.iter().enumerate() {
            let source = truncate_at_sentence(&case.source_content, MAX_SOURCE_CHARS);
            match self.embedder.embed(source).await {
                Ok(vector) => {
                    let hits = store.search(&vector, None, self.top_k).await?;
                    if hits.iter().any(|h| h.chunk.id == Some(case.target_id)) {
                        report.self_recall += 1;
                    }
                }
                Err(e) => {
                    warn!("case {}: embedding source failed: {e}", i + 1);
                    report.unembedded += 1;
                }
            }

            let results = self.retriever.retrieve(&case.question, self.top_k, None).await?;
            let (doc, page, chunk) = locate(case, &results);
            report.doc_hits += usize::from(doc);
            report.page_hits += usize::from(page);
            report.chunk_hits += usize::from(chunk);
            progress(i + 1, cases.len());
        }
        info!(
            "evaluated {} case(s) at top {}: self {} doc {} page {} chunk {}",
            report.cases, report.top_k, report.self_recall, report.doc_hits, report.page_hits, report.chunk_hits
        );
        Ok(report)
    }
}

/// Whether `results` contain the target's document, page and chunk.
fn locate(case: &EvalCase, results: &[RetrievedChunk]) -> (bool, bool, bool) {
    let doc = results.iter().any(|r| r.filename == case.filename);
    let page = results.iter().any(|r| r.filename == case.filename && r.page == case.page);
    let chunk = results.iter().any(|r| r.id == Some(case.target_id));
    (doc, page, chunk)
}

/// At most `max_chars` characters, cut after the last sentence end when one
/// falls in the final fifth of the window.
pub fn truncate_at_sentence(text: &str, max_chars: usize) -> &str {
    let cut = truncate_chars(text, max_chars);
    if cut.len() == text.len() {
        return cut;
    }
    let boundary = cut.char_indices().rev().find(|(_, c)| matches!(c, '。' | '.' | '\n'));
    match boundary {
        Some((at, c)) if cut[..at].chars().count() * 5 > max_chars * 4 => &cut[..at + c.len_utf8()],
        _ => cut,
    }
}

pub fn load_cases(path: &Path) -> Result<Vec<EvalCase>> {
    let content = fs::read_to_string(path).map_err(|e| Error::NotFound(format!("{}: {e}", path.display())))?;
    let mut cases = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let case = serde_json::from_str(line).map_err(|e| {
            Error::Operation(format!("{}:{}: malformed case: {e}", path.display(), line_no + 1))
        })?;
        cases.push(case);
    }
    debug!("loaded {} case(s) from {}", cases.len(), path.display());
    Ok(cases)
}

pub fn save_cases(path: &Path, cases: &[EvalCase]) -> Result<()> {
    let mut out = String::new();
    for case in cases {
        let line = serde_json::to_string(case).map_err(|e| Error::Operation(format!("encode case: {e}")))?;
        out.push_str(&line);
        out.push('\n');
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::Operation(format!("{}: {e}", parent.display())))?;
    }
    fs::write(path, out).map_err(|e| Error::Operation(format!("{}: {e}", path.display())))
}
