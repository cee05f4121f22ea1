//! Candidate phrase generation.
//!
//! Splits text into lowercase tokens and forms every 1, 2 and 3 token window
//! as a keyword hypothesis. Phrases bounded by function words and single
//! generic academic words are discarded.

use indexmap::IndexSet;

/// Longest phrase, in tokens.
pub const MAX_NGRAM: usize = 3;

/// Function words that may not start or end a phrase.
pub const BASIC_STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "with", "by", "from",
    "as", "is", "are", "was", "were", "be", "been", "of", "this", "that", "these", "those", "it",
    "its", "we", "our", "they", "their", "can", "will", "which", "into", "via", "not", "has",
    "have",
];

/// Generic academic filler that is never a keyword on its own.
pub const DOMAIN_STOP_WORDS: &[&str] = &[
    "paper", "method", "methods", "result", "results", "proposed", "propose", "approach",
    "based", "using", "study", "algorithm", "system", "data", "model", "models", "task",
    "performance", "analysis", "framework",
];

pub fn is_basic_stop_word(token: &str) -> bool {
    BASIC_STOP_WORDS.contains(&token)
}

pub fn is_domain_stop_word(token: &str) -> bool {
    DOMAIN_STOP_WORDS.contains(&token)
}

/// Lowercase `text` and split it into tokens of more than one character.
///
/// Any run of characters other than letters, digits and `-` separates
/// tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '-'))
        .filter(|token| token.chars().count() > 1)
        .map(str::to_string)
        .collect()
}

/// Generate the candidate phrases of `text`.
///
/// The result is deduplicated and keeps generation order: every unigram
/// first, then bigrams, then trigrams, each left to right. The keyword
/// extractor relies on this order to break similarity ties.
pub fn generate_candidates(text: &str) -> IndexSet<String> {
    let tokens = tokenize(text);
    let mut candidates = IndexSet::new();

    for n in 1..=MAX_NGRAM {
        if tokens.len() < n {
            break;
        }
        for window in tokens.windows(n) {
            let first = &window[0];
            let last = &window[n - 1];
            if is_basic_stop_word(first) || is_basic_stop_word(last) {
                continue;
            }
            if n == 1 && is_domain_stop_word(first) {
                continue;
            }
            candidates.insert(window.join(" "));
        }
    }

    candidates
}
