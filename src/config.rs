//! Pipeline configuration, loadable from TOML.
//!
//! Every knob has a default matching the reference run parameters, so an
//! empty file (or no file at all) yields a working configuration. Sections
//! map one-to-one onto the pipeline phases.

use std::path::Path;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::infer::HttpEngineConfig;
use crate::topology::AnalyzeOptions;

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config file: {path}")]
    #[diagnostic(
        code(semgrav::config::io),
        help("Ensure the file exists and is readable, or omit --config to use defaults.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {message}")]
    #[diagnostic(
        code(semgrav::config::parse),
        help("Check the TOML syntax against the documented [engine]/[build]/[score]/[analyze] sections.")
    )]
    Parse { message: String },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// `[engine]` section: the HTTP inference endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f64,
    pub timeout_secs: u64,
    pub top_logprobs: u32,
}

impl Default for EngineSection {
    fn default() -> Self {
        let d = HttpEngineConfig::default();
        Self {
            base_url: d.base_url,
            model: d.model,
            api_key: d.api_key,
            temperature: d.temperature,
            timeout_secs: d.timeout_secs,
            top_logprobs: d.top_logprobs,
        }
    }
}

impl From<&EngineSection> for HttpEngineConfig {
    fn from(s: &EngineSection) -> Self {
        Self {
            base_url: s.base_url.clone(),
            model: s.model.clone(),
            api_key: s.api_key.clone(),
            temperature: s.temperature,
            timeout_secs: s.timeout_secs,
            top_logprobs: s.top_logprobs,
        }
    }
}

/// `[build]` section: BFS expansion parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSection {
    pub max_hops: u32,
    pub associations_per_word: usize,
    pub checkpoint_interval: u64,
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            max_hops: 3,
            associations_per_word: 5,
            checkpoint_interval: 500,
        }
    }
}

/// `[score]` section: edge-scoring parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreSection {
    pub checkpoint_interval: u64,
}

impl Default for ScoreSection {
    fn default() -> Self {
        Self {
            checkpoint_interval: 2000,
        }
    }
}

/// `[analyze]` section: topology-analysis cutoffs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzeSection {
    pub hub_top_n: usize,
    pub island_min_size: usize,
    pub asymmetry_threshold: f64,
    pub asymmetry_top_n: usize,
    pub centrality_top_k: usize,
}

impl Default for AnalyzeSection {
    fn default() -> Self {
        let d = AnalyzeOptions::default();
        Self {
            hub_top_n: d.hub_top_n,
            island_min_size: d.island_min_size,
            asymmetry_threshold: d.asymmetry_threshold,
            asymmetry_top_n: d.asymmetry_top_n,
            centrality_top_k: d.centrality_top_k,
        }
    }
}

impl From<&AnalyzeSection> for AnalyzeOptions {
    fn from(s: &AnalyzeSection) -> Self {
        Self {
            hub_top_n: s.hub_top_n,
            island_min_size: s.island_min_size,
            asymmetry_threshold: s.asymmetry_threshold,
            asymmetry_top_n: s.asymmetry_top_n,
            centrality_top_k: s.centrality_top_k,
        }
    }
}

/// Full pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub engine: EngineSection,
    pub build: BuildSection,
    pub score: ScoreSection,
    pub analyze: AnalyzeSection,
}

impl PipelineConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })
    }

    /// Load the file if it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> ConfigResult<Self> {
        if path.is_file() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_parameters() {
        let config = PipelineConfig::default();
        assert_eq!(config.build.max_hops, 3);
        assert_eq!(config.build.associations_per_word, 5);
        assert_eq!(config.build.checkpoint_interval, 500);
        assert_eq!(config.score.checkpoint_interval, 2000);
        assert_eq!(config.analyze.hub_top_n, 20);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: PipelineConfig = toml::from_str(
            r#"
            [build]
            max_hops = 2

            [engine]
            model = "mistral-7b"
            "#,
        )
        .unwrap();
        assert_eq!(config.build.max_hops, 2);
        assert_eq!(config.build.associations_per_word, 5);
        assert_eq!(config.engine.model, "mistral-7b");
        assert_eq!(config.score.checkpoint_interval, 2000);
    }

    #[test]
    fn load_or_default_without_file() {
        let config =
            PipelineConfig::load_or_default(Path::new("/nonexistent/semgrav.toml")).unwrap();
        assert_eq!(config.build.max_hops, 3);
    }

    #[test]
    fn malformed_config_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[build\nmax_hops = ").unwrap();
        assert!(matches!(
            PipelineConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
