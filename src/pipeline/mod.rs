//! Pipeline facade: wires engine, store, seeds, and config through the
//! three phases.
//!
//! Data flow: seeds → [`GraphBuilder`] → unweighted graph → [`EdgeScorer`]
//! → weighted graph → [`TopologyAnalyzer`] → analysis report. Each arrow is
//! a checkpointed, resumable batch job; phases can also run individually
//! against the previous phase's final checkpoint.
//!
//! All collaborators are injected at construction (no ambient globals),
//! so multiple pipelines (different engines, different checkpoint
//! directories) can coexist in one process.

use std::sync::Arc;

use crate::builder::{BuildCheckpoint, GraphBuilder};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, SemgravResult};
use crate::graph::AssocGraph;
use crate::infer::InferenceEngine;
use crate::scorer::{EdgeScorer, ScoreCheckpoint};
use crate::seeds::SeedCorpus;
use crate::store::{CheckpointStore, PHASE_BUILD, PHASE_SCORE};
use crate::topology::{AnalysisResult, TopologyAnalyzer};

/// The semantic-gravity mapping pipeline.
pub struct Pipeline {
    engine: Arc<dyn InferenceEngine>,
    store: CheckpointStore,
    seeds: SeedCorpus,
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a pipeline from its collaborators.
    pub fn new(
        engine: Arc<dyn InferenceEngine>,
        store: CheckpointStore,
        seeds: SeedCorpus,
        config: PipelineConfig,
    ) -> Self {
        Self {
            engine,
            store,
            seeds,
            config,
        }
    }

    /// Phase 1: build the association graph by BFS expansion.
    pub fn build(&self, resume: bool) -> SemgravResult<AssocGraph> {
        GraphBuilder::new(
            self.engine.as_ref(),
            &self.store,
            self.config.build.checkpoint_interval,
        )
        .build(
            &self.seeds.all_seeds(),
            self.config.build.max_hops,
            self.config.build.associations_per_word,
            resume,
        )
    }

    /// Phase 2: score every edge of `graph`.
    pub fn score(&self, graph: AssocGraph, resume: bool) -> SemgravResult<AssocGraph> {
        EdgeScorer::new(
            self.engine.as_ref(),
            &self.store,
            self.config.score.checkpoint_interval,
        )
        .score(graph, resume)
    }

    /// Phase 3: analyze the weighted graph.
    pub fn analyze(&self, graph: &AssocGraph) -> AnalysisResult {
        TopologyAnalyzer::new(graph, &self.seeds).analyze_all(&(&self.config.analyze).into())
    }

    /// Run all three phases back to back.
    pub fn run(&self, resume: bool) -> SemgravResult<(AssocGraph, AnalysisResult)> {
        let graph = self.build(resume)?;
        let graph = self.score(graph, resume)?;
        let analysis = self.analyze(&graph);
        Ok((graph, analysis))
    }

    /// Load the graph from the latest phase-1 checkpoint, with its visited
    /// count. Errors when phase 1 has never checkpointed.
    pub fn load_built_graph(&self) -> SemgravResult<(AssocGraph, usize)> {
        let checkpoint: BuildCheckpoint = self
            .store
            .load(PHASE_BUILD, None)?
            .ok_or(PipelineError::PhaseNotReady { phase: PHASE_BUILD })?;
        let visited = checkpoint.visited.len();
        Ok((AssocGraph::from_snapshot(checkpoint.graph)?, visited))
    }

    /// Load the weighted graph from the latest phase-2 checkpoint.
    /// Errors when phase 2 has never checkpointed.
    pub fn load_scored_graph(&self) -> SemgravResult<AssocGraph> {
        let checkpoint: ScoreCheckpoint = self
            .store
            .load(PHASE_SCORE, None)?
            .ok_or(PipelineError::PhaseNotReady { phase: PHASE_SCORE })?;
        Ok(AssocGraph::from_snapshot(checkpoint.graph)?)
    }

    /// The checkpoint store (for enumeration and deletion commands).
    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    /// The seed corpus.
    pub fn seeds(&self) -> &SeedCorpus {
        &self.seeds
    }

    /// The configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SemgravError;
    use crate::infer::{InferResult, ScoreOutcome};
    use crate::seeds::{SeedDomain, WORDS_PER_DOMAIN};
    use std::collections::HashMap;
    use tempfile::TempDir;

    /// Stub with both capabilities: association table plus uniform logprob.
    struct StubEngine {
        table: HashMap<String, Vec<String>>,
        logprob: f64,
    }

    impl crate::infer::InferenceEngine for StubEngine {
        fn associations(&self, word: &str, n: usize) -> InferResult<Vec<String>> {
            let mut out = self.table.get(word).cloned().unwrap_or_default();
            out.truncate(n);
            Ok(out)
        }

        fn score(&self, _source: &str, _target: &str) -> InferResult<ScoreOutcome> {
            Ok(ScoreOutcome::Found {
                logprob: self.logprob,
            })
        }
    }

    fn test_corpus() -> SeedCorpus {
        let mut words: Vec<String> = vec!["alpha".into(), "beta".into()];
        for i in 0..WORDS_PER_DOMAIN - 2 {
            words.push(format!("filler-{i}"));
        }
        SeedCorpus::from_domains(vec![SeedDomain {
            name: "test".into(),
            words,
        }])
        .unwrap()
    }

    fn test_pipeline(dir: &std::path::Path) -> Pipeline {
        let engine = StubEngine {
            table: [
                ("alpha".to_string(), vec!["x".to_string(), "y".to_string()]),
                ("beta".to_string(), vec!["y".to_string(), "z".to_string()]),
            ]
            .into_iter()
            .collect(),
            logprob: -0.1,
        };
        let mut config = PipelineConfig::default();
        config.build.max_hops = 1;
        Pipeline::new(
            Arc::new(engine),
            CheckpointStore::open(dir).unwrap(),
            test_corpus(),
            config,
        )
    }

    #[test]
    fn run_chains_all_phases() {
        let dir = TempDir::new().unwrap();
        let pipeline = test_pipeline(dir.path());

        let (graph, analysis) = pipeline.run(false).unwrap();
        assert!(graph.unscored_pairs().is_empty());
        assert!(!analysis.hubs.is_empty());

        // Both phases left final checkpoints behind.
        assert!(pipeline.load_built_graph().is_ok());
        assert!(pipeline.load_scored_graph().is_ok());
    }

    #[test]
    fn phase_not_ready_without_checkpoints() {
        let dir = TempDir::new().unwrap();
        let pipeline = test_pipeline(dir.path());
        assert!(matches!(
            pipeline.load_built_graph(),
            Err(SemgravError::Pipeline(PipelineError::PhaseNotReady {
                phase: PHASE_BUILD
            }))
        ));
        assert!(matches!(
            pipeline.load_scored_graph(),
            Err(SemgravError::Pipeline(PipelineError::PhaseNotReady {
                phase: PHASE_SCORE
            }))
        ));
    }

    #[test]
    fn score_can_start_from_loaded_checkpoint() {
        let dir = TempDir::new().unwrap();
        let pipeline = test_pipeline(dir.path());

        pipeline.build(false).unwrap();
        let (graph, visited) = pipeline.load_built_graph().unwrap();
        assert_eq!(visited, 13); // 10 seeds at hop 0, x/y/z at hop 1

        let scored = pipeline.score(graph, false).unwrap();
        assert!(scored.unscored_pairs().is_empty());
    }
}
