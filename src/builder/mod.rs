//! Graph construction: level-synchronous BFS expansion from seed words.
//!
//! Phase 1 of the pipeline. Each frontier word is expanded through the
//! inference engine into up to N association edges tagged with the current
//! hop depth; discovered targets form the next hop's frontier. Progress is
//! checkpointed every `checkpoint_interval` expanded words and once more,
//! unconditionally, when the phase completes.
//!
//! Resume reconstructs the frontier as "all edge targets not yet visited"
//! and the current hop from the maximum hop on any edge. This cannot
//! distinguish "hop N complete" from "hop N partially complete" after a
//! mid-hop crash: a resumed run may re-expand a few words or expand part
//! of the frontier one hop early. Checkpoints are still written mid-hop;
//! node and edge sets converge to the same graph for an engine whose
//! answers are stable.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::SemgravResult;
use crate::graph::{AssocGraph, GraphSnapshot};
use crate::infer::InferenceEngine;
use crate::store::{CheckpointStore, PHASE_BUILD};

/// Persisted phase-1 progress.
#[derive(Debug, Serialize, Deserialize)]
pub struct BuildCheckpoint {
    pub graph: GraphSnapshot,
    pub visited: Vec<String>,
    pub words_processed: u64,
    pub current_hop: u32,
}

/// BFS graph builder.
///
/// Collaborators are injected; nothing is ambient, so several builders with
/// different engines or checkpoint directories can run in one process.
pub struct GraphBuilder<'a> {
    engine: &'a dyn InferenceEngine,
    store: &'a CheckpointStore,
    checkpoint_interval: u64,
    graph: AssocGraph,
    visited: HashSet<String>,
    words_processed: u64,
}

impl<'a> GraphBuilder<'a> {
    /// Create a builder with the given collaborators.
    pub fn new(
        engine: &'a dyn InferenceEngine,
        store: &'a CheckpointStore,
        checkpoint_interval: u64,
    ) -> Self {
        Self {
            engine,
            store,
            checkpoint_interval: checkpoint_interval.max(1),
            graph: AssocGraph::new(),
            visited: HashSet::new(),
            words_processed: 0,
        }
    }

    /// Build the association graph by BFS expansion from `seeds`.
    ///
    /// Expands to `max_hops` inclusive (hop 0 expands the seeds themselves),
    /// requesting up to `associations_per_word` per expansion. With `resume`
    /// the latest phase-1 checkpoint is restored first; otherwise the build
    /// starts fresh. Seeds are lowercased so they obey the same node
    /// normalization as association targets.
    pub fn build(
        mut self,
        seeds: &[String],
        max_hops: u32,
        associations_per_word: usize,
        resume: bool,
    ) -> SemgravResult<AssocGraph> {
        if resume && self.try_resume()? {
            tracing::info!(
                visited = self.visited.len(),
                nodes = self.graph.node_count(),
                edges = self.graph.edge_count(),
                "resumed graph build from checkpoint"
            );
        }

        let (mut frontier, start_hop) = if self.visited.is_empty() {
            let frontier: HashSet<String> = seeds.iter().map(|s| s.to_lowercase()).collect();
            (frontier, 0)
        } else {
            self.reconstruct_frontier(max_hops)
        };

        tracing::info!(
            seeds = seeds.len(),
            max_hops,
            start_hop,
            frontier = frontier.len(),
            "starting BFS expansion"
        );

        for hop in start_hop..=max_hops {
            if frontier.is_empty() {
                tracing::info!(hop, "frontier empty, stopping early");
                break;
            }
            tracing::info!(hop, frontier = frontier.len(), "expanding frontier");

            let mut next_frontier = HashSet::new();
            // Sorted expansion keeps node-insertion order (and therefore
            // analytics tie-breaking) reproducible for a deterministic engine.
            let mut words: Vec<&String> = frontier.iter().collect();
            words.sort();

            for word in words {
                if self.visited.contains(word.as_str()) {
                    continue;
                }

                // A frontier member is a node even when its expansion
                // produces nothing.
                self.graph.ensure_word(word);

                for assoc in self.expand_word(word, associations_per_word) {
                    self.graph.add_association(word, &assoc, hop);
                    next_frontier.insert(assoc);
                }

                self.visited.insert(word.clone());
                self.words_processed += 1;

                if self.words_processed % self.checkpoint_interval == 0 {
                    self.save_checkpoint(hop, false)?;
                    tracing::info!(
                        processed = self.words_processed,
                        hop,
                        "checkpoint saved"
                    );
                }
            }

            tracing::info!(
                hop,
                discovered = next_frontier.len(),
                nodes = self.graph.node_count(),
                edges = self.graph.edge_count(),
                "hop complete"
            );
            frontier = next_frontier;
        }

        self.save_checkpoint(max_hops, true)?;
        tracing::info!(
            nodes = self.graph.node_count(),
            edges = self.graph.edge_count(),
            visited = self.visited.len(),
            "BFS expansion complete"
        );
        Ok(self.graph)
    }

    /// Expand one word into its filtered association targets.
    ///
    /// A failed lookup degrades to zero associations; the word still counts
    /// as visited, so a flaky engine can never wedge the phase.
    fn expand_word(&self, word: &str, n: usize) -> Vec<String> {
        let associations = match self.engine.associations(word, n) {
            Ok(list) => list,
            Err(e) => {
                tracing::warn!(word, "association lookup failed, treating as empty: {e}");
                return vec![];
            }
        };
        associations
            .into_iter()
            .filter(|assoc| !assoc.is_empty() && assoc != word)
            .collect()
    }

    /// Restore builder state from the latest phase-1 checkpoint.
    fn try_resume(&mut self) -> SemgravResult<bool> {
        let Some(checkpoint) = self.store.load::<BuildCheckpoint>(PHASE_BUILD, None)? else {
            return Ok(false);
        };
        self.graph = AssocGraph::from_snapshot(checkpoint.graph)?;
        self.visited = checkpoint.visited.into_iter().collect();
        self.words_processed = checkpoint.words_processed;
        Ok(true)
    }

    /// Derive (frontier, current hop) from restored graph state.
    ///
    /// Frontier: every edge target not yet visited. Hop: the maximum hop
    /// seen on any edge, or one past it (capped at `max_hops`) when that
    /// frontier is empty, meaning the prior run finished a hop completely.
    fn reconstruct_frontier(&self, max_hops: u32) -> (HashSet<String>, u32) {
        let max_hop = self.graph.max_hop().unwrap_or(0);
        let frontier = self.graph.unvisited_targets(&self.visited);
        let current_hop = if frontier.is_empty() {
            (max_hop + 1).min(max_hops)
        } else {
            max_hop
        };
        (frontier, current_hop)
    }

    fn save_checkpoint(&self, current_hop: u32, is_final: bool) -> SemgravResult<()> {
        let mut visited: Vec<String> = self.visited.iter().cloned().collect();
        visited.sort();
        let data = BuildCheckpoint {
            graph: self.graph.snapshot(),
            visited,
            words_processed: self.words_processed,
            current_hop,
        };
        let iteration = if is_final {
            None
        } else {
            Some(self.words_processed)
        };
        self.store.save(PHASE_BUILD, iteration, &data)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Build statistics and previews
// ---------------------------------------------------------------------------

/// Summary statistics for a built (possibly unscored) graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildStatistics {
    pub nodes: usize,
    pub edges: usize,
    pub visited: usize,
    pub avg_out_degree: f64,
    pub max_out_degree: usize,
}

/// Compute build statistics. `visited` is the number of expanded words from
/// the phase-1 checkpoint.
pub fn build_statistics(graph: &AssocGraph, visited: usize) -> BuildStatistics {
    let out_degrees = graph.out_degrees();
    let nodes = out_degrees.len();
    let total: usize = out_degrees.iter().sum();
    BuildStatistics {
        nodes,
        edges: graph.edge_count(),
        visited,
        avg_out_degree: if nodes == 0 {
            0.0
        } else {
            total as f64 / nodes as f64
        },
        max_out_degree: out_degrees.into_iter().max().unwrap_or(0),
    }
}

/// Follow first-successor chains from the first `n` seeds, up to `depth`
/// hops each: a cheap smoke check that the graph looks like language.
pub fn sample_paths(graph: &AssocGraph, seeds: &[String], n: usize, depth: usize) -> Vec<Vec<String>> {
    let inner = graph.read();
    seeds
        .iter()
        .map(|s| s.to_lowercase())
        .filter_map(|seed| {
            let start = graph.node_index_of(&seed)?;
            let mut path = vec![seed];
            let mut current = start;
            for _ in 0..depth {
                let Some(next) = inner
                    .neighbors_directed(current, petgraph::Direction::Outgoing)
                    .next()
                else {
                    break;
                };
                path.push(inner[next].clone());
                current = next;
            }
            Some(path)
        })
        .take(n)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infer::{InferResult, ScoreOutcome};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Deterministic stub: a fixed association table, empty elsewhere.
    struct StubEngine {
        table: HashMap<String, Vec<String>>,
        calls: AtomicUsize,
    }

    impl StubEngine {
        fn new(entries: &[(&str, &[&str])]) -> Self {
            let table = entries
                .iter()
                .map(|(w, assocs)| {
                    (
                        w.to_string(),
                        assocs.iter().map(|a| a.to_string()).collect(),
                    )
                })
                .collect();
            Self {
                table,
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl crate::infer::InferenceEngine for StubEngine {
        fn associations(&self, word: &str, n: usize) -> InferResult<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut out = self.table.get(word).cloned().unwrap_or_default();
            out.truncate(n);
            Ok(out)
        }

        fn score(&self, _source: &str, _target: &str) -> InferResult<ScoreOutcome> {
            Ok(ScoreOutcome::Found { logprob: -0.1 })
        }
    }

    fn seeds(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn spec_scenario_two_seeds_one_hop() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::open(dir.path()).unwrap();
        let engine = StubEngine::new(&[("alpha", &["x", "y"]), ("beta", &["y", "z"])]);

        let graph = GraphBuilder::new(&engine, &store, 100)
            .build(&seeds(&["alpha", "beta"]), 1, 5, false)
            .unwrap();

        let mut nodes = graph.nodes();
        nodes.sort();
        assert_eq!(nodes, vec!["alpha", "beta", "x", "y", "z"]);
        assert_eq!(graph.edge_count(), 4);
        for (src, tgt) in [("alpha", "x"), ("alpha", "y"), ("beta", "y"), ("beta", "z")] {
            assert_eq!(graph.edge(src, tgt).unwrap().hop, 0);
        }
    }

    #[test]
    fn visits_each_reachable_word_exactly_once() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::open(dir.path()).unwrap();
        // Diamond: both b and c point at d; d must expand only once.
        let engine = StubEngine::new(&[
            ("a", &["b", "c"]),
            ("b", &["d"]),
            ("c", &["d"]),
            ("d", &["e"]),
        ]);

        let graph = GraphBuilder::new(&engine, &store, 100)
            .build(&seeds(&["a"]), 3, 5, false)
            .unwrap();

        // a, b, c, d, e each expanded once: 5 engine calls.
        assert_eq!(engine.call_count(), 5);
        assert_eq!(graph.node_count(), 5);
    }

    #[test]
    fn hop_is_minimum_discovery_depth() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::open(dir.path()).unwrap();
        // "shared" is discovered from a seed at hop 0 and again at hop 1.
        let engine = StubEngine::new(&[
            ("root", &["shared", "mid"]),
            ("mid", &["shared"]),
        ]);

        let graph = GraphBuilder::new(&engine, &store, 100)
            .build(&seeds(&["root"]), 2, 5, false)
            .unwrap();

        assert_eq!(graph.edge("root", "shared").unwrap().hop, 0);
        assert_eq!(graph.edge("mid", "shared").unwrap().hop, 1);
    }

    #[test]
    fn self_referential_associations_dropped() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::open(dir.path()).unwrap();
        let engine = StubEngine::new(&[("echo", &["echo", "sound"])]);

        let graph = GraphBuilder::new(&engine, &store, 100)
            .build(&seeds(&["echo"]), 1, 5, false)
            .unwrap();

        assert!(graph.edge("echo", "echo").is_none());
        assert!(graph.edge("echo", "sound").is_some());
    }

    #[test]
    fn zero_association_word_still_visited() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::open(dir.path()).unwrap();
        let engine = StubEngine::new(&[("alpha", &["x"])]);

        let graph = GraphBuilder::new(&engine, &store, 100)
            .build(&seeds(&["alpha", "mute"]), 2, 5, false)
            .unwrap();

        // "mute" produced nothing but was expanded exactly once and still
        // appears as an isolated node.
        assert_eq!(engine.call_count(), 3); // alpha, mute, x
        assert!(graph.has_node("alpha"));
        assert!(graph.has_node("mute"));
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn seeds_are_lowercased() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::open(dir.path()).unwrap();
        let engine = StubEngine::new(&[("ragnarok", &["fenrir"])]);

        let graph = GraphBuilder::new(&engine, &store, 100)
            .build(&seeds(&["Ragnarok"]), 1, 5, false)
            .unwrap();

        assert!(graph.has_node("ragnarok"));
        assert!(!graph.has_node("Ragnarok"));
    }

    #[test]
    fn final_checkpoint_written_on_completion() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::open(dir.path()).unwrap();
        let engine = StubEngine::new(&[("alpha", &["x"])]);

        GraphBuilder::new(&engine, &store, 100)
            .build(&seeds(&["alpha"]), 1, 5, false)
            .unwrap();

        let checkpoint: BuildCheckpoint = store.load(PHASE_BUILD, None).unwrap().unwrap();
        assert_eq!(checkpoint.words_processed, 2); // alpha + x
        assert_eq!(checkpoint.visited, vec!["alpha", "x"]);
    }

    #[test]
    fn resume_from_hop_boundary_reaches_same_graph() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::open(dir.path()).unwrap();
        let table: &[(&str, &[&str])] = &[
            ("alpha", &["x", "y"]),
            ("beta", &["y", "z"]),
            ("x", &["deep"]),
            ("y", &["deep"]),
        ];

        // Fresh run to completion.
        let fresh_engine = StubEngine::new(table);
        let fresh = GraphBuilder::new(&fresh_engine, &store, 1000)
            .build(&seeds(&["alpha", "beta"]), 2, 5, false)
            .unwrap();
        store.delete(PHASE_BUILD, None).unwrap();

        // Simulate an interruption right after hop 0 completed: seeds
        // expanded, hop-1 frontier untouched. (A mid-hop interruption is the
        // documented ambiguous case: hop tags and trailing expansions can
        // then legitimately differ.)
        let partial_engine = StubEngine::new(table);
        let partial = GraphBuilder::new(&partial_engine, &store, 1000)
            .build(&seeds(&["alpha", "beta"]), 0, 5, false)
            .unwrap();
        let mut visited: Vec<String> = vec!["alpha".into(), "beta".into()];
        visited.sort();
        store
            .save(
                PHASE_BUILD,
                Some(2),
                &BuildCheckpoint {
                    graph: partial.snapshot(),
                    visited,
                    words_processed: 2,
                    current_hop: 0,
                },
            )
            .unwrap();
        // Drop the final checkpoint the hop-0 run wrote; keep the partial.
        std::fs::remove_file(dir.path().join("phase1_final.json")).unwrap();

        let resumed_engine = StubEngine::new(table);
        let resumed = GraphBuilder::new(&resumed_engine, &store, 1000)
            .build(&seeds(&["alpha", "beta"]), 2, 5, true)
            .unwrap();

        let mut fresh_nodes = fresh.nodes();
        fresh_nodes.sort();
        let mut resumed_nodes = resumed.nodes();
        resumed_nodes.sort();
        assert_eq!(fresh_nodes, resumed_nodes);

        let mut fresh_pairs = fresh.ordered_pairs();
        fresh_pairs.sort();
        let mut resumed_pairs = resumed.ordered_pairs();
        resumed_pairs.sort();
        assert_eq!(fresh_pairs, resumed_pairs);

        // Seeds were not re-expanded on resume.
        assert_eq!(resumed_engine.call_count(), fresh_engine.call_count() - 2);
    }

    #[test]
    fn build_statistics_counts_degrees() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::open(dir.path()).unwrap();
        let engine = StubEngine::new(&[("a", &["b", "c", "d"]), ("b", &["c"])]);

        let graph = GraphBuilder::new(&engine, &store, 100)
            .build(&seeds(&["a"]), 1, 5, false)
            .unwrap();

        let stats = build_statistics(&graph, 2);
        assert_eq!(stats.nodes, 4);
        assert_eq!(stats.edges, 4);
        assert_eq!(stats.max_out_degree, 3);
        assert!((stats.avg_out_degree - 1.0).abs() < 1e-9);
    }

    #[test]
    fn sample_paths_follow_successors() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::open(dir.path()).unwrap();
        let engine = StubEngine::new(&[("a", &["b"]), ("b", &["c"])]);

        let graph = GraphBuilder::new(&engine, &store, 100)
            .build(&seeds(&["a"]), 2, 5, false)
            .unwrap();

        let paths = sample_paths(&graph, &seeds(&["a"]), 5, 4);
        assert_eq!(paths, vec![vec!["a", "b", "c"]]);
    }
}
