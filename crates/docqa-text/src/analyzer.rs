//! Stopword sets and the tantivy analyzer used for non-CJK text.

use tantivy::tokenizer::{LowerCaser, SimpleTokenizer, StopWordFilter, TextAnalyzer};

/// Function words, interrogatives and generic request verbs for Latin-script text.
pub const LATIN_STOP_WORDS: &[&str] = &[
	"a","an","and","are","as","at","be","by","for","from","has","he","in","is","it","its","of","on","that","the","to","was","will","with","or","but","not","this","these","they","them","their","there","then","than","so","if","when","where","why","how","what","which","who","whom","whose","can","could","should","would","may","might","must","shall","do","does","did","have","had","having",
	"please","explain","describe","tell","me","show","give","mean","meaning","means","article","document","image","picture","about",
];

/// Chinese stop phrases, longest first so that multi-character entries win.
pub const CJK_STOP_PHRASES: &[&str] = &[
	"为什么","是什么","怎么样",
	"解释","含义","文章","图片","这个","那个","请问","以及","什么","怎么","如何","哪些","哪个","多少","介绍","说明",
	"的","了","是","篇","被","把","吗","呢","吧","啊",
];

pub fn build_latin_analyzer() -> TextAnalyzer {
	TextAnalyzer::builder(SimpleTokenizer::default())
		.filter(LowerCaser)
		.filter(StopWordFilter::remove(LATIN_STOP_WORDS.iter().map(|s| s.to_string())))
		.build()
}

/// True for Han ideographs, kana and hangul syllables.
pub fn is_cjk(c: char) -> bool {
	matches!(c,
		'\u{4E00}'..='\u{9FFF}'
		| '\u{3400}'..='\u{4DBF}'
		| '\u{F900}'..='\u{FAFF}'
		| '\u{3040}'..='\u{30FF}'
		| '\u{AC00}'..='\u{D7AF}'
	)
}

pub fn contains_cjk(text: &str) -> bool {
	text.chars().any(is_cjk)
}
