//! Terminal and JSON rendering of command results.

use docqa_core::types::RetrievedChunk;
use docqa_embed::http::truncate_chars;
use docqa_hybrid::{Answer, EvalReport, IngestReport, RankedCandidate, RetrievalResponse, ScoreBreakdown};
use docqa_vector::RecallReport;
use serde::Serialize;

const SNIPPET_MAX_LEN: usize = 200;

#[derive(Serialize)]
struct JsonHit<'a> {
    #[serde(flatten)]
    chunk: RetrievedChunk,
    #[serde(skip_serializing_if = "Option::is_none")]
    breakdown: Option<&'a ScoreBreakdown>,
}

fn snippet(text: &str) -> String {
    let flat = text.replace('\n', " ");
    let cut = truncate_chars(&flat, SNIPPET_MAX_LEN);
    if cut.len() < flat.len() {
        format!("{cut}...")
    } else {
        cut.to_string()
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

pub fn format_results_json(response: &RetrievalResponse, explain: bool) -> String {
    let hits: Vec<JsonHit<'_>> = response
        .results
        .iter()
        .map(|r| JsonHit { chunk: RetrievedChunk::from(r.clone()), breakdown: explain.then_some(&r.score) })
        .collect();
    to_json(&hits)
}

pub fn format_results_human(query: &str, response: &RetrievalResponse, explain: bool) -> String {
    if response.is_empty() {
        return format!("No results found for \"{query}\".");
    }
    let mut out = format!(
        "{} result(s) for \"{query}\" (dense {}, lexical {})\n",
        response.results.len(),
        response.dense_hits,
        response.lexical_hits
    );
    for source in &response.timed_out {
        out.push_str(&format!("  [{source} channel timed out]\n"));
    }
    for (i, ranked) in response.results.iter().enumerate() {
        out.push_str(&format_hit(i + 1, ranked, explain));
    }
    out
}

fn format_hit(n: usize, ranked: &RankedCandidate, explain: bool) -> String {
    let c = &ranked.candidate;
    let mut out = format!(
        "\n{n}. {} (page {}, chunk {})  score {:.1}\n   {}\n",
        c.chunk.filename,
        c.chunk.page + 1,
        c.chunk.chunk_id,
        ranked.score.composite,
        snippet(&c.chunk.content)
    );
    if explain {
        let s = &ranked.score;
        let distance = c.distance.map_or_else(|| "-".to_string(), |d| format!("{d:.4}"));
        out.push_str(&format!(
            "   via {} #{} | fused {:.4} | distance {distance}\n   fuzzy {:.1} keywords {:.1} vector {:.1} length {:.1} | position +{:.0} entity +{:.0}\n",
            c.source, c.rank, c.fused_score, s.fuzzy, s.keyword_coverage, s.vector_similarity, s.length, s.position_bonus, s.entity_bonus
        ));
    }
    out
}

pub fn format_answer(answer: &Answer, json: bool) -> String {
    if json {
        return to_json(answer);
    }
    if !answer.found {
        return answer.text.clone();
    }
    let mut out = format!("{}\n\nConfidence: {:.1}%\n", answer.text, answer.confidence);
    if !answer.sources.is_empty() {
        out.push_str("\nSources:\n");
        for s in &answer.sources {
            out.push_str(&format!("- {} (P{}) [relevance {:.0}%]\n", s.filename, s.page, s.score));
        }
    }
    out
}

pub fn format_ingest(report: &IngestReport) -> String {
    let mut out = format!(
        "Ingested {}/{} chunks ({} failed)\n",
        report.succeeded, report.attempted, report.failed
    );
    for f in &report.failures {
        out.push_str(&format!("  failed: {} p{} #{}: {}\n", f.filename, f.page + 1, f.chunk_id, f.reason));
    }
    out
}

pub fn format_recall(report: &RecallReport) -> String {
    match report.rate() {
        Some(rate) => format!(
            "Self-recall: {}/{} ({rate:.1}%), {} sample(s) could not be embedded",
            report.hits, report.sampled, report.skipped
        ),
        None => "Store is empty; nothing to sample.".to_string(),
    }
}

pub fn format_eval(report: &EvalReport, json: bool) -> String {
    if json {
        return to_json(report);
    }
    let header = format!("hit rate@{}", report.top_k);
    let rows = [
        ("Vector self-recall", report.self_recall),
        ("Document recall", report.doc_hits),
        ("Page recall", report.page_hits),
        ("Chunk recall", report.chunk_hits),
    ];
    let mut out = format!("{} question(s)\n{:<20} | {header}\n{}\n", report.cases, "Metric", "-".repeat(36));
    for (name, hits) in rows {
        out.push_str(&format!("{name:<20} | {:6.2}%\n", report.pct(hits)));
    }
    if report.unembedded > 0 {
        out.push_str(&format!("{} source(s) could not be embedded\n", report.unembedded));
    }
    out
}
