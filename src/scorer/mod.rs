//! Edge scoring: logprob-derived weights for every association pair.
//!
//! Phase 2 of the pipeline. For each unique ordered (source, target) pair
//! the engine reports ln P(target | source); the edge weight is
//! `exp(logprob)`, a probability-like strength in (0, 1]. Forward and
//! reverse weights are independent measurements; their inequality is an
//! analysis target, not an error.
//!
//! Scoring is total: a transport failure or a target missing from the top
//! candidate continuations records a documented sentinel logprob (tagged
//! with its [`ScoreFallback`] kind) instead of aborting the phase.

use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use crate::error::SemgravResult;
use crate::graph::{AssocGraph, EdgeScore, GraphSnapshot, ScoreFallback};
use crate::infer::{InferenceEngine, ScoreOutcome};
use crate::store::{CheckpointStore, PHASE_SCORE};

/// Sentinel logprob recorded when the scoring call itself fails.
pub const CALL_FAILED_LOGPROB: f64 = -10.0;
/// Sentinel logprob recorded when the target token is not found among the
/// top candidate continuations.
pub const NOT_FOUND_LOGPROB: f64 = -15.0;

/// Persisted phase-2 progress.
#[derive(Debug, Serialize, Deserialize)]
pub struct ScoreCheckpoint {
    pub graph: GraphSnapshot,
    pub scored_pairs: u64,
}

/// Logprob-based edge scorer.
pub struct EdgeScorer<'a> {
    engine: &'a dyn InferenceEngine,
    store: &'a CheckpointStore,
    checkpoint_interval: u64,
    scored_pairs: u64,
}

impl<'a> EdgeScorer<'a> {
    /// Create a scorer with the given collaborators.
    pub fn new(
        engine: &'a dyn InferenceEngine,
        store: &'a CheckpointStore,
        checkpoint_interval: u64,
    ) -> Self {
        Self {
            engine,
            store,
            checkpoint_interval: checkpoint_interval.max(1),
            scored_pairs: 0,
        }
    }

    /// Score every unscored edge in `graph`, checkpointing progress.
    ///
    /// With `resume` the latest phase-2 checkpoint replaces the working
    /// graph first, so already-scored pairs are skipped deterministically.
    /// Re-running on a fully scored graph performs zero engine calls and
    /// returns the graph unchanged.
    pub fn score(mut self, graph: AssocGraph, resume: bool) -> SemgravResult<AssocGraph> {
        let mut graph = graph;
        if resume {
            if let Some(checkpoint) = self.store.load::<ScoreCheckpoint>(PHASE_SCORE, None)? {
                graph = AssocGraph::from_snapshot(checkpoint.graph)?;
                self.scored_pairs = checkpoint.scored_pairs;
                tracing::info!(
                    scored = self.scored_pairs,
                    "resumed edge scoring from checkpoint"
                );
            }
        }

        let to_score = graph.unscored_pairs();
        if to_score.is_empty() {
            tracing::info!("all edges already scored");
            return Ok(graph);
        }
        let total = to_score.len();
        tracing::info!(pairs = total, "scoring association pairs");

        for (done, (source, target)) in to_score.iter().enumerate() {
            let (logprob, fallback) = match self.engine.score(source, target) {
                Ok(ScoreOutcome::Found { logprob }) => (logprob.min(0.0), None),
                Ok(ScoreOutcome::NotInCandidates) => {
                    (NOT_FOUND_LOGPROB, Some(ScoreFallback::NotInCandidates))
                }
                Err(e) => {
                    tracing::warn!(
                        %source,
                        %target,
                        "scoring call failed, recording sentinel: {e}"
                    );
                    (CALL_FAILED_LOGPROB, Some(ScoreFallback::CallFailed))
                }
            };
            graph.set_score(
                source,
                target,
                EdgeScore {
                    weight: logprob.exp(),
                    logprob,
                    fallback,
                },
            );
            self.scored_pairs += 1;

            if self.scored_pairs % self.checkpoint_interval == 0 {
                self.save_checkpoint(&graph, false)?;
                tracing::info!(
                    scored = self.scored_pairs,
                    remaining = total - done - 1,
                    "checkpoint saved"
                );
            }
        }

        self.save_checkpoint(&graph, true)?;
        tracing::info!(scored = self.scored_pairs, "edge scoring complete");
        Ok(graph)
    }

    fn save_checkpoint(&self, graph: &AssocGraph, is_final: bool) -> SemgravResult<()> {
        let data = ScoreCheckpoint {
            graph: graph.snapshot(),
            scored_pairs: self.scored_pairs,
        };
        let iteration = if is_final {
            None
        } else {
            Some(self.scored_pairs)
        };
        self.store.save(PHASE_SCORE, iteration, &data)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Weight statistics and edge rankings
// ---------------------------------------------------------------------------

/// Distribution statistics over scored edge weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightStats {
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub std_dev: f64,
    /// Number of scored edges contributing to the statistics.
    pub scored_edges: usize,
}

impl WeightStats {
    fn empty() -> Self {
        Self {
            mean: 0.0,
            median: 0.0,
            min: 0.0,
            max: 0.0,
            std_dev: 0.0,
            scored_edges: 0,
        }
    }
}

/// Compute weight statistics over all scored edges.
pub fn weight_statistics(graph: &AssocGraph) -> WeightStats {
    let inner = graph.read();
    let weights: Vec<f64> = inner
        .edge_weights()
        .filter_map(|e| e.score.as_ref().map(|s| s.weight))
        .collect();
    if weights.is_empty() {
        return WeightStats::empty();
    }

    let n = weights.len();
    let mean = weights.iter().sum::<f64>() / n as f64;
    let variance = weights.iter().map(|w| (w - mean).powi(2)).sum::<f64>() / n as f64;

    let mut sorted = weights.clone();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let median = if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    };

    WeightStats {
        mean,
        median,
        min: sorted[0],
        max: sorted[n - 1],
        std_dev: variance.sqrt(),
        scored_edges: n,
    }
}

/// Ranking key for edge top/bottom queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeSortKey {
    Weight,
    Logprob,
}

/// A ranked edge: (source, target, value under the chosen key).
pub type RankedEdge = (String, String, f64);

fn scored_edges_by(graph: &AssocGraph, key: EdgeSortKey) -> Vec<RankedEdge> {
    let inner = graph.read();
    inner
        .edge_references()
        .filter_map(|e| {
            let score = e.weight().score.as_ref()?;
            let value = match key {
                EdgeSortKey::Weight => score.weight,
                EdgeSortKey::Logprob => score.logprob,
            };
            Some((inner[e.source()].clone(), inner[e.target()].clone(), value))
        })
        .collect()
}

/// Top `n` scored edges by the given key, descending. Ties keep original
/// edge order (stable sort).
pub fn top_edges(graph: &AssocGraph, n: usize, key: EdgeSortKey) -> Vec<RankedEdge> {
    let mut edges = scored_edges_by(graph, key);
    edges.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));
    edges.truncate(n);
    edges
}

/// Bottom `n` scored edges by the given key, ascending: the weak and
/// spurious associations. Ties keep original edge order.
pub fn bottom_edges(graph: &AssocGraph, n: usize, key: EdgeSortKey) -> Vec<RankedEdge> {
    let mut edges = scored_edges_by(graph, key);
    edges.sort_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal));
    edges.truncate(n);
    edges
}
