//! Seed corpus: the fixed domain → words mapping that roots BFS expansion.
//!
//! The bundled corpus (10 domains × 10 niche concepts) is compiled into the
//! binary from a TOML file; an external corpus with the same shape can be
//! loaded instead. Domains double as the grouping key for the convergence
//! analysis, so every domain must carry exactly [`WORDS_PER_DOMAIN`] words;
//! the loader validates this rather than trusting the file.

use std::path::Path;

use miette::Diagnostic;
use serde::Deserialize;
use thiserror::Error;

/// Required number of seed words per domain.
pub const WORDS_PER_DOMAIN: usize = 10;

// ── Errors ──────────────────────────────────────────────────────────────

#[derive(Debug, Error, Diagnostic)]
pub enum SeedError {
    #[error("failed to parse seed corpus: {message}")]
    #[diagnostic(
        code(semgrav::seed::parse),
        help("Check the TOML syntax: [[domains]] tables with `name` and `words` keys.")
    )]
    Parse { message: String },

    #[error("failed to read seed corpus: {path}")]
    #[diagnostic(code(semgrav::seed::io), help("Ensure the file exists and is readable."))]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("domain \"{domain}\" has {count} words, expected exactly {expected}")]
    #[diagnostic(
        code(semgrav::seed::arity),
        help(
            "Every domain must contribute the same number of seeds so the \
             convergence analysis compares domains fairly. Add or remove \
             words until the domain has exactly the expected count."
        )
    )]
    WrongArity {
        domain: String,
        count: usize,
        expected: usize,
    },

    #[error("seed corpus contains no domains")]
    #[diagnostic(
        code(semgrav::seed::empty),
        help("Provide at least one [[domains]] table.")
    )]
    Empty,
}

pub type SeedResult<T> = std::result::Result<T, SeedError>;

// ── Corpus data model ───────────────────────────────────────────────────

/// One seed domain: a name plus its representative words.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedDomain {
    pub name: String,
    pub words: Vec<String>,
}

/// The full seed corpus, domains in file order.
#[derive(Debug, Clone)]
pub struct SeedCorpus {
    domains: Vec<SeedDomain>,
}

#[derive(Debug, Deserialize)]
struct CorpusToml {
    #[serde(default)]
    domains: Vec<SeedDomain>,
}

const BUNDLED_TOML: &str = include_str!("../../data/seeds/domains.toml");

impl SeedCorpus {
    /// The corpus bundled into the binary.
    pub fn bundled() -> SeedResult<Self> {
        Self::from_toml_str(BUNDLED_TOML)
    }

    /// Load a corpus from an external TOML file.
    pub fn from_path(path: &Path) -> SeedResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| SeedError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate a corpus from TOML text.
    pub fn from_toml_str(toml_str: &str) -> SeedResult<Self> {
        let parsed: CorpusToml = toml::from_str(toml_str).map_err(|e| SeedError::Parse {
            message: e.to_string(),
        })?;
        if parsed.domains.is_empty() {
            return Err(SeedError::Empty);
        }
        for domain in &parsed.domains {
            if domain.words.len() != WORDS_PER_DOMAIN {
                return Err(SeedError::WrongArity {
                    domain: domain.name.clone(),
                    count: domain.words.len(),
                    expected: WORDS_PER_DOMAIN,
                });
            }
        }
        Ok(Self {
            domains: parsed.domains,
        })
    }

    /// Build a corpus directly from in-memory domains (used by tests and
    /// embedding callers). Applies the same arity validation as the loaders.
    pub fn from_domains(domains: Vec<SeedDomain>) -> SeedResult<Self> {
        if domains.is_empty() {
            return Err(SeedError::Empty);
        }
        for domain in &domains {
            if domain.words.len() != WORDS_PER_DOMAIN {
                return Err(SeedError::WrongArity {
                    domain: domain.name.clone(),
                    count: domain.words.len(),
                    expected: WORDS_PER_DOMAIN,
                });
            }
        }
        Ok(Self { domains })
    }

    /// Domains in corpus order.
    pub fn domains(&self) -> &[SeedDomain] {
        &self.domains
    }

    /// All seed words as a flat list, corpus order, original casing.
    pub fn all_seeds(&self) -> Vec<String> {
        self.domains
            .iter()
            .flat_map(|d| d.words.iter().cloned())
            .collect()
    }

    /// Total number of seeds (domain count × words per domain).
    pub fn seed_count(&self) -> usize {
        self.domains.len() * WORDS_PER_DOMAIN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_corpus_parses_and_validates() {
        let corpus = SeedCorpus::bundled().unwrap();
        assert_eq!(corpus.domains().len(), 10);
        assert_eq!(corpus.seed_count(), 100);
        assert_eq!(corpus.all_seeds().len(), 100);
        assert!(corpus.all_seeds().contains(&"entanglement".to_string()));
    }

    #[test]
    fn domain_order_is_file_order() {
        let corpus = SeedCorpus::bundled().unwrap();
        assert_eq!(corpus.domains()[0].name, "quantum_physics");
        assert_eq!(corpus.domains()[9].name, "organic_chemistry");
    }

    #[test]
    fn wrong_arity_rejected() {
        let toml = r#"
            [[domains]]
            name = "tiny"
            words = ["one", "two"]
        "#;
        let err = SeedCorpus::from_toml_str(toml).unwrap_err();
        assert!(matches!(
            err,
            SeedError::WrongArity {
                count: 2,
                expected: WORDS_PER_DOMAIN,
                ..
            }
        ));
    }

    #[test]
    fn empty_corpus_rejected() {
        assert!(matches!(
            SeedCorpus::from_toml_str(""),
            Err(SeedError::Empty)
        ));
    }

    #[test]
    fn malformed_toml_rejected() {
        assert!(matches!(
            SeedCorpus::from_toml_str("[[domains]\nname="),
            Err(SeedError::Parse { .. })
        ));
    }
}
