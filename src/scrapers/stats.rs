//! Corpus statistics over parsed articles.

use crate::models::ParsedScrap;

/// Corpus size the crawl aims for, in characters.
pub const CORPUS_TARGET_BYTES: u64 = 8 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedStats {
    /// Records in the batch, including failed extractions.
    pub total: usize,
    /// Records that carry text.
    pub with_text: usize,
    /// Average character count over records with text.
    pub avg_chars: f64,
    /// Average number of spaces over records with text; a rough word count.
    pub avg_words: f64,
    /// Documents of average length needed to reach [`CORPUS_TARGET_BYTES`].
    pub docs_for_target: Option<u64>,
}

impl ParsedStats {
    /// `None` for an empty batch.
    pub fn compute(parsed: &[ParsedScrap]) -> Option<Self> {
        if parsed.is_empty() {
            return None;
        }

        let texts: Vec<&str> = parsed.iter().filter_map(|p| p.text.as_deref()).collect();
        let (avg_chars, avg_words) = if texts.is_empty() {
            (0.0, 0.0)
        } else {
            let n = texts.len() as f64;
            let chars: usize = texts.iter().map(|t| t.chars().count()).sum();
            let spaces: usize = texts.iter().map(|t| t.matches(' ').count()).sum();
            (chars as f64 / n, spaces as f64 / n)
        };

        Some(Self {
            total: parsed.len(),
            with_text: texts.len(),
            avg_chars,
            avg_words,
            docs_for_target: docs_needed(avg_chars),
        })
    }
}

/// `ceil(CORPUS_TARGET_BYTES / avg_chars)`, or `None` when the average is zero.
pub fn docs_needed(avg_chars: f64) -> Option<u64> {
    (avg_chars > 0.0).then(|| (CORPUS_TARGET_BYTES as f64 / avg_chars).ceil() as u64)
}
