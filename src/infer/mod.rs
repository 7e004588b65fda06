//! Language-model inference boundary.
//!
//! The pipeline consumes two model capabilities through the
//! [`InferenceEngine`] trait: word-association generation (phase 1) and
//! next-token logprob scoring (phase 2). Transport failures surface as
//! explicit `Err` values; the callers decide how to degrade (the builder
//! treats a failed lookup as zero associations, the scorer falls back to a
//! sentinel logprob). The trait itself never panics and never raises for
//! expected external-call trouble.

pub mod http;

use std::sync::LazyLock;

use regex::Regex;

use crate::error::InferError;

pub use http::{HttpEngine, HttpEngineConfig};

/// Result type for inference operations.
pub type InferResult<T> = std::result::Result<T, InferError>;

/// Outcome of scoring one (source, target) association pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreOutcome {
    /// The target token was found among the model's continuations.
    /// `logprob` is ln P(target | source), always <= 0.
    Found { logprob: f64 },
    /// The call succeeded but the target never appeared among the top
    /// candidate continuations, a very weak association.
    NotInCandidates,
}

/// Abstract language-model capability consumed by the pipeline.
///
/// Implementations are injected into the builder and scorer; there is no
/// ambient global engine, so several pipelines with different engines can
/// coexist in one process (and tests use deterministic stubs).
pub trait InferenceEngine: Send + Sync {
    /// Up to `n` cleaned single-token associations for `word`: lowercase,
    /// alphabetic-with-hyphens only, never the input word itself.
    fn associations(&self, word: &str, n: usize) -> InferResult<Vec<String>>;

    /// Log-probability that `target` is generated immediately after a
    /// prompt built from `source`.
    fn score(&self, source: &str, target: &str) -> InferResult<ScoreOutcome>;
}

// ── Response parsing ────────────────────────────────────────────────────

static RE_LIST_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*\d+\.\s*").unwrap());

static RE_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-zA-Z-]+$").unwrap());

/// Normalize one candidate token: trim, reject multi-word and
/// non-alphabetic strings (hyphens allowed, for words like "sous-vide"),
/// lowercase the survivors.
pub fn normalize_token(raw: &str) -> Option<String> {
    let token = raw.trim();
    if token.is_empty() || !RE_WORD.is_match(token) {
        return None;
    }
    Some(token.to_lowercase())
}

/// Parse a model's association reply into at most `max_words` cleaned
/// tokens.
///
/// Handles the reply shapes models actually produce: comma-separated,
/// numbered lists, one word per line. The `source` word itself is dropped
/// so the engine never hands the caller a self-association.
pub fn parse_associations(text: &str, source: &str, max_words: usize) -> Vec<String> {
    if text.is_empty() || max_words == 0 {
        return vec![];
    }
    let stripped = RE_LIST_PREFIX.replace_all(text, "");
    let source_lower = source.to_lowercase();

    let mut associations = Vec::new();
    for raw in stripped.split(|c| matches!(c, ',' | ';' | '\n')) {
        let Some(word) = normalize_token(raw) else {
            continue;
        };
        if word == source_lower {
            continue;
        }
        associations.push(word);
        if associations.len() >= max_words {
            break;
        }
    }
    associations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comma_separated() {
        let out = parse_associations("gravity, quantum, Newton, energy, matter", "physics", 5);
        assert_eq!(out, vec!["gravity", "quantum", "newton", "energy", "matter"]);
    }

    #[test]
    fn parses_numbered_list() {
        let out = parse_associations("1. gravity\n2. quantum\n3. energy", "physics", 5);
        assert_eq!(out, vec!["gravity", "quantum", "energy"]);
    }

    #[test]
    fn filters_multi_word_and_symbols() {
        let out = parse_associations(
            "dark matter, gravity, e=mc2, , quantum!",
            "physics",
            5,
        );
        assert_eq!(out, vec!["gravity"]);
    }

    #[test]
    fn keeps_hyphenated_words() {
        let out = parse_associations("sous-vide, foam", "gastronomy", 5);
        assert_eq!(out, vec!["sous-vide", "foam"]);
    }

    #[test]
    fn drops_the_source_word() {
        let out = parse_associations("Physics, gravity", "physics", 5);
        assert_eq!(out, vec!["gravity"]);
    }

    #[test]
    fn respects_max_words() {
        let out = parse_associations("a, b, c, d, e, f, g", "seed", 3);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(parse_associations("", "physics", 5).is_empty());
    }

    #[test]
    fn normalize_rejects_junk() {
        assert_eq!(normalize_token("  Gravity "), Some("gravity".into()));
        assert_eq!(normalize_token("dark matter"), None);
        assert_eq!(normalize_token("42"), None);
        assert_eq!(normalize_token(""), None);
    }
}
