//! docqa-text
//!
//! Language-aware keyword extraction (tantivy analyzer for Latin-script text,
//! n-grams for CJK), proper-noun extraction, and the lexical retrieval channel.

pub mod analyzer;
pub mod entities;
pub mod keywords;
pub mod lexical;

pub use entities::{entity_overlap, extract_entities};
pub use keywords::{KeywordExtractor, Keywords};
pub use lexical::LexicalSearch;
