//! Proper-noun style entity extraction used by the reranker's entity bonus.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::analyzer::is_cjk;

fn latin_entity_re() -> &'static Regex {
	static RE: OnceLock<Regex> = OnceLock::new();
	// Capitalised words (`Tesla`) and acronyms (`GDP`, `NASA`).
	RE.get_or_init(|| Regex::new(r"\b[A-Z][a-z]+\b|[A-Z]{2,}").expect("valid entity regex"))
}

/// Extract entity candidates: capitalised Latin words, acronyms and CJK runs
/// of at least two characters. Result is order-preserving and de-duplicated.
pub fn extract_entities(text: &str) -> Vec<String> {
	let mut seen = HashSet::new();
	let mut out = Vec::new();
	for m in latin_entity_re().find_iter(text) {
		let s = m.as_str().to_string();
		if seen.insert(s.clone()) {
			out.push(s);
		}
	}
	let mut run = String::new();
	for c in text.chars().chain(std::iter::once(' ')) {
		if is_cjk(c) {
			run.push(c);
			continue;
		}
		if run.chars().count() >= 2 && seen.insert(run.clone()) {
			out.push(run.clone());
		}
		run.clear();
	}
	out
}

/// True when `content` yields at least one of `query_entities`.
pub fn entity_overlap(query_entities: &[String], content: &str) -> bool {
	if query_entities.is_empty() {
		return false;
	}
	let found: HashSet<String> = extract_entities(content).into_iter().collect();
	query_entities.iter().any(|e| found.contains(e))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn capitalised_words_and_acronyms() {
		let e = extract_entities("What did Tesla report to the SEC in 2023?");
		assert_eq!(e, vec!["What", "Tesla", "SEC"]);
	}

	#[test]
	fn cjk_runs() {
		let e = extract_entities("百度 发布 文心 a 字");
		assert_eq!(e, vec!["百度", "发布", "文心"]);
	}

	#[test]
	fn acronyms_inside_words() {
		assert_eq!(extract_entities("iPhone XR vs ROIs"), vec!["XR", "ROI"]);
	}

	#[test]
	fn overlap_is_entity_intersection() {
		let q = extract_entities("Tesla revenue");
		assert!(entity_overlap(&q, "Tesla reported revenue"));
		assert!(!entity_overlap(&q, "tesla reported revenue"));
		// substring of a longer entity does not count
		assert!(!entity_overlap(&q, "Teslas are popular"));
		assert!(!entity_overlap(&[], "Tesla"));
	}
}
