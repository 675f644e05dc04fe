//! Language-aware keyword extraction shared by lexical search and reranking.
//!
//! Text is split into script runs. Non-CJK runs go through the tantivy
//! analyzer (word split, lower-case, stopwords). CJK runs have stop phrases
//! cut out and the remaining segments are turned into overlapping n-grams of
//! `min_cjk_len` characters, so query and content keywords are comparable.

use std::collections::HashSet;

use tantivy::tokenizer::{TextAnalyzer, TokenStream};

use crate::analyzer::{build_latin_analyzer, is_cjk, CJK_STOP_PHRASES};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keywords {
    pub latin: Vec<String>,
    pub cjk: Vec<String>,
}

impl Keywords {
    pub fn is_empty(&self) -> bool {
        self.latin.is_empty() && self.cjk.is_empty()
    }

    pub fn len(&self) -> usize {
        self.latin.len() + self.cjk.len()
    }

    /// Keep at most `per_script` keywords of each script, in first-seen order.
    pub fn capped(mut self, per_script: usize) -> Self {
        self.latin.truncate(per_script);
        self.cjk.truncate(per_script);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.cjk.iter().chain(self.latin.iter())
    }

    pub fn to_set(&self) -> HashSet<&str> {
        self.iter().map(String::as_str).collect()
    }

    pub fn into_vec(self) -> Vec<String> {
        let mut all = self.cjk;
        all.extend(self.latin);
        all
    }
}

#[derive(Clone)]
pub struct KeywordExtractor {
    analyzer: TextAnalyzer,
    min_latin_len: usize,
    min_cjk_len: usize,
}

impl Default for KeywordExtractor {
    fn default() -> Self {
        Self::new(2, 2)
    }
}

impl KeywordExtractor {
    pub fn new(min_latin_len: usize, min_cjk_len: usize) -> Self {
        Self { analyzer: build_latin_analyzer(), min_latin_len, min_cjk_len: min_cjk_len.max(1) }
    }

    pub fn extract(&self, text: &str) -> Keywords {
        let mut out = Keywords::default();
        let mut seen_latin = HashSet::new();
        let mut seen_cjk = HashSet::new();
        for (cjk, run) in script_runs(text) {
            if cjk {
                for gram in self.cjk_grams(run) {
                    if seen_cjk.insert(gram.clone()) {
                        out.cjk.push(gram);
                    }
                }
            } else {
                for word in self.latin_words(run) {
                    if seen_latin.insert(word.clone()) {
                        out.latin.push(word);
                    }
                }
            }
        }
        out
    }

    fn latin_words(&self, run: &str) -> Vec<String> {
        let mut analyzer = self.analyzer.clone();
        let mut stream = analyzer.token_stream(run);
        let mut words = Vec::new();
        while let Some(token) = stream.next() {
            if token.text.chars().count() >= self.min_latin_len {
                words.push(token.text.clone());
            }
        }
        words
    }

    fn cjk_grams(&self, run: &str) -> Vec<String> {
        let mut cleaned = run.to_string();
        for phrase in CJK_STOP_PHRASES {
            cleaned = cleaned.replace(phrase, " ");
        }
        let n = self.min_cjk_len;
        let mut grams = Vec::new();
        for segment in cleaned.split(' ').filter(|s| !s.is_empty()) {
            let chars: Vec<char> = segment.chars().collect();
            if chars.len() < n {
                continue;
            }
            for window in chars.windows(n) {
                grams.push(window.iter().collect());
            }
        }
        grams
    }
}

/// Split text into maximal runs of CJK / non-CJK characters.
fn script_runs(text: &str) -> Vec<(bool, &str)> {
    let mut runs = Vec::new();
    let mut start = 0;
    let mut current: Option<bool> = None;
    for (idx, c) in text.char_indices() {
        let cjk = is_cjk(c);
        match current {
            Some(prev) if prev != cjk => {
                runs.push((prev, &text[start..idx]));
                start = idx;
                current = Some(cjk);
            }
            None => current = Some(cjk),
            _ => {}
        }
    }
    if let Some(prev) = current {
        runs.push((prev, &text[start..]));
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latin_words_are_lowercased_and_filtered() {
        let kw = KeywordExtractor::default().extract("What is the Quarterly REVENUE of a company?");
        assert_eq!(kw.latin, vec!["quarterly", "revenue", "company"]);
        assert!(kw.cjk.is_empty());
    }

    #[test]
    fn stopword_only_query_is_empty() {
        let ex = KeywordExtractor::default();
        assert!(ex.extract("what is the").is_empty());
        assert!(ex.extract("请问这个是什么").is_empty());
        assert!(ex.extract("  ？?!").is_empty());
    }

    #[test]
    fn cjk_runs_become_bigrams_without_stop_phrases() {
        let kw = KeywordExtractor::default().extract("解释营业收入的含义");
        assert_eq!(kw.cjk, vec!["营业", "业收", "收入"]);
    }

    #[test]
    fn mixed_script_partitions() {
        let kw = KeywordExtractor::default().extract("ERNIE模型的revenue");
        assert_eq!(kw.latin, vec!["ernie", "revenue"]);
        assert_eq!(kw.cjk, vec!["模型"]);
    }

    #[test]
    fn cap_applies_per_script() {
        let kw = KeywordExtractor::default()
            .extract("alpha bravo charlie delta echo foxtrot golf 甲乙丙丁戊己庚")
            .capped(5);
        assert_eq!(kw.latin.len(), 5);
        assert_eq!(kw.cjk.len(), 5);
        assert_eq!(kw.latin[0], "alpha");
    }

    #[test]
    fn short_tokens_are_dropped() {
        let kw = KeywordExtractor::default().extract("x y revenue 钱");
        assert_eq!(kw.latin, vec!["revenue"]);
        assert!(kw.cjk.is_empty());
    }

    #[test]
    fn runs_cover_whole_text() {
        let runs = script_runs("ab中文cd");
        assert_eq!(runs, vec![(false, "ab"), (true, "中文"), (false, "cd")]);
    }
}
