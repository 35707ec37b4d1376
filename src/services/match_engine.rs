//! Match engine: locates configured phrases in a flat text string and
//! resolves overlaps into an ordered, non-overlapping match set.

use regex::{Regex, RegexBuilder};
use tracing::debug;

use crate::types::errors::PatternError;
use crate::types::settings::{HighlightWord, StyleSpec};

/// Matching rules shared by highlighting and word counting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchOptions {
    pub case_sensitive: bool,
    pub whole_words_only: bool,
}

/// One located occurrence of a phrase. Offsets are byte offsets into the
/// scanned string.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCandidate {
    pub start: usize,
    pub end: usize,
    pub matched_text: String,
    pub style: StyleSpec,
}

/// Builds the literal search pattern for one phrase: all metacharacters
/// escaped, word-boundary bound when requested, case-insensitive unless
/// configured otherwise.
pub fn build_pattern(word: &str, options: &MatchOptions) -> Result<Regex, PatternError> {
    let escaped = regex::escape(word);
    let source = if options.whole_words_only {
        format!(r"\b{}\b", escaped)
    } else {
        escaped
    };
    RegexBuilder::new(&source)
        .case_insensitive(!options.case_sensitive)
        .build()
        .map_err(|e| PatternError::Construction(e.to_string()))
}

/// Finds every phrase occurrence in `text` and returns the kept matches in
/// ascending start order, pairwise non-overlapping.
///
/// Phrases are applied longest-first (stable, so registration order breaks
/// length ties), candidates are sorted by start offset with earlier-applied
/// phrases winning ties, and a left-to-right sweep keeps a candidate only
/// when it starts at or after the end of the last kept one. A phrase whose
/// pattern fails to build is skipped; the rest of the pass continues.
pub fn find_matches(
    text: &str,
    words: &[HighlightWord],
    options: &MatchOptions,
) -> Vec<MatchCandidate> {
    if text.is_empty() || words.is_empty() {
        return Vec::new();
    }

    let mut ordered: Vec<&HighlightWord> = words
        .iter()
        .filter(|w| !w.text.trim().is_empty())
        .collect();
    ordered.sort_by(|a, b| b.text.len().cmp(&a.text.len()));

    let mut candidates: Vec<(usize, MatchCandidate)> = Vec::new();
    for (rank, word) in ordered.iter().enumerate() {
        let pattern = match build_pattern(word.text.trim(), options) {
            Ok(pattern) => pattern,
            Err(err) => {
                debug!(word = %word.text, %err, "skipping word with unbuildable pattern");
                continue;
            }
        };
        for found in pattern.find_iter(text) {
            if found.end() == found.start() {
                continue;
            }
            candidates.push((
                rank,
                MatchCandidate {
                    start: found.start(),
                    end: found.end(),
                    matched_text: found.as_str().to_string(),
                    style: word.style.clone(),
                },
            ));
        }
    }

    candidates.sort_by(|(rank_a, a), (rank_b, b)| (a.start, rank_a).cmp(&(b.start, rank_b)));

    let mut kept = Vec::new();
    let mut last_end = 0;
    for (_, candidate) in candidates {
        if candidate.start >= last_end {
            last_end = candidate.end;
            kept.push(candidate);
        }
    }
    kept
}
