//! Tokenization shared between the hybrid retriever's fallback path and
//! memory conflict detection: lowercase, extract `[a-z0-9_]+` runs of
//! length >= 2, drop a fixed English stop-word set.

use std::collections::HashSet;

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "for", "from", "how", "in", "is", "it", "of", "on", "or", "the",
    "to", "what", "which", "who", "with", "when", "where", "show",
];

/// Negation markers used by the memory conflict-detection heuristic.
pub const NEGATION_MARKERS: &[&str] = &["no", "not", "never", "without", "avoid"];

pub fn tokenize(text: &str) -> HashSet<String> {
    let lowered = text.to_lowercase();
    let mut tokens = HashSet::new();
    let mut current = String::new();
    for ch in lowered.chars().chain(std::iter::once(' ')) {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            current.push(ch);
        } else if !current.is_empty() {
            if current.len() > 1 && !STOP_WORDS.contains(&current.as_str()) {
                tokens.insert(std::mem::take(&mut current));
            } else {
                current.clear();
            }
        }
    }
    tokens
}

/// True if `text` contains any whole-word negation marker, case-insensitively.
pub fn contains_negation(text: &str) -> bool {
    let tokens = tokenize_raw_words(text);
    NEGATION_MARKERS.iter().any(|m| tokens.contains(*m))
}

/// Word-splitting without the stop-word/length filtering `tokenize` applies,
/// since negation markers like "no" are themselves below the length-2 filter
/// boundary and some are stop words.
fn tokenize_raw_words(text: &str) -> HashSet<String> {
    let lowered = text.to_lowercase();
    let mut tokens = HashSet::new();
    let mut current = String::new();
    for ch in lowered.chars().chain(std::iter::once(' ')) {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            current.push(ch);
        } else if !current.is_empty() {
            tokens.insert(std::mem::take(&mut current));
        }
    }
    tokens
}

/// Token overlap ratio used by both retrieval scoring and memory selection:
/// `|a ∩ b| / max(1, |a|)`.
pub fn overlap_ratio(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let overlap = a.intersection(b).count();
    overlap as f64 / (a.len().max(1) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_stop_words_and_short_tokens() {
        let tokens = tokenize("What is the Lewis email about?");
        assert!(!tokens.contains("what"));
        assert!(!tokens.contains("is"));
        assert!(!tokens.contains("the"));
        assert!(tokens.contains("lewis"));
        assert!(tokens.contains("email"));
        assert!(tokens.contains("about"));
    }

    #[test]
    fn lowercases_and_splits_on_non_alphanumeric() {
        let tokens = tokenize("Launch-Metrics, v2.0!");
        assert!(tokens.contains("launch"));
        assert!(tokens.contains("metrics"));
        assert!(tokens.contains("v2"));
        assert!(tokens.contains("0"));
    }

    #[test]
    fn detects_negation_markers() {
        assert!(contains_negation("Do not speculate without citations."));
        assert!(!contains_negation("Always speculate with citations when uncertain."));
    }

    #[test]
    fn overlap_ratio_is_bounded() {
        let a = tokenize("email launch metrics");
        let b = tokenize("launch metrics quality");
        let ratio = overlap_ratio(&a, &b);
        assert!((0.0..=1.0).contains(&ratio));
        assert!(ratio > 0.0);
    }
}
