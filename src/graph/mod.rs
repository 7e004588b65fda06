//! Word association graph: a simple directed graph of normalized words.
//!
//! Nodes are lowercased word strings; edges carry the BFS discovery depth
//! (`hop`) and, after scoring, a logprob-derived [`EdgeScore`]. Repeated
//! discoveries of the same ordered pair collapse into one edge whose `hop`
//! is the minimum depth ever seen.
//!
//! Uses `petgraph` for the graph structure and `DashMap` for fast word →
//! node lookups, so readers never block each other and a single writer can
//! feed results in from a driver loop.

pub mod analytics;

use std::sync::RwLock;

use dashmap::DashMap;
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use crate::error::GraphError;

/// Result type for graph operations.
pub type GraphResult<T> = std::result::Result<T, GraphError>;

/// Snapshot schema version written into checkpoints and exports.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Logprob-derived strength attached to an edge by the scoring phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeScore {
    /// `exp(logprob)`, a probability-like strength in (0, 1].
    pub weight: f64,
    /// Raw log-probability, always <= 0. More negative = weaker.
    pub logprob: f64,
    /// Set when the score is a sentinel rather than a real measurement.
    pub fallback: Option<ScoreFallback>,
}

/// Why a sentinel logprob was recorded instead of a measured one.
///
/// The two fallback paths carry different sentinel magnitudes (see the
/// scorer's `CALL_FAILED_LOGPROB` and `NOT_FOUND_LOGPROB`) and are kept
/// distinguishable in persisted edge records for downstream analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreFallback {
    /// The inference call itself failed (transport or response error).
    CallFailed,
    /// The call succeeded but the target token never appeared among the
    /// top candidate continuations.
    NotInCandidates,
}

/// Edge attributes: BFS discovery depth plus optional score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssocEdge {
    /// Minimum BFS depth at which this ordered pair was discovered.
    pub hop: u32,
    /// Present once the scoring phase has processed this pair.
    pub score: Option<EdgeScore>,
}

impl AssocEdge {
    /// Whether the scoring phase has processed this edge.
    pub fn scored(&self) -> bool {
        self.score.is_some()
    }

    /// Edge weight, with unscored edges contributing 0.
    pub fn weight_or_zero(&self) -> f64 {
        self.score.as_ref().map_or(0.0, |s| s.weight)
    }
}

/// One edge in a [`GraphSnapshot`], the language-neutral persisted form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub source: String,
    pub target: String,
    pub hop: u32,
    pub scored: bool,
    pub weight: Option<f64>,
    pub logprob: Option<f64>,
    pub fallback: Option<ScoreFallback>,
}

/// Structurally lossless serialized form of an [`AssocGraph`].
///
/// Node list plus edge list with all documented attributes; used by both
/// checkpoints and exports so a downstream tool can reconstruct the exact
/// topology without recomputation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub schema_version: u32,
    pub nodes: Vec<String>,
    pub edges: Vec<EdgeRecord>,
}

/// In-memory word association graph with a word → node index.
///
/// A simple directed graph: at most one edge per ordered (source, target)
/// pair, no self-loops. Insertion order of nodes and edges is preserved by
/// petgraph, which makes iteration (and therefore tie-breaking in the
/// analytics layer) deterministic for a fixed instance.
pub struct AssocGraph {
    graph: RwLock<DiGraph<String, AssocEdge>>,
    node_index: DashMap<String, NodeIndex>,
}

impl AssocGraph {
    /// Create a new empty association graph.
    pub fn new() -> Self {
        Self {
            graph: RwLock::new(DiGraph::new()),
            node_index: DashMap::new(),
        }
    }

    /// Ensure a node exists for the given word, returning its NodeIndex.
    fn ensure_node(&self, word: &str) -> NodeIndex {
        if let Some(idx) = self.node_index.get(word) {
            return *idx.value();
        }
        let mut graph = self.graph.write().expect("graph lock poisoned");
        // Double-check after acquiring write lock
        if let Some(idx) = self.node_index.get(word) {
            return *idx.value();
        }
        let idx = graph.add_node(word.to_string());
        self.node_index.insert(word.to_string(), idx);
        idx
    }

    /// Ensure the word exists as a node even if no edge touches it yet.
    /// Used for frontier members whose expansion produced nothing.
    pub fn ensure_word(&self, word: &str) {
        self.ensure_node(word);
    }

    /// Record a discovered association `source -> target` at the given hop.
    ///
    /// Self-loops are rejected. A pair already present keeps a single edge
    /// whose `hop` becomes the minimum of the old and new depths; its score
    /// (if any) is untouched. Returns `true` when a new edge was inserted.
    pub fn add_association(&self, source: &str, target: &str, hop: u32) -> bool {
        if source == target {
            return false;
        }
        let src_idx = self.ensure_node(source);
        let tgt_idx = self.ensure_node(target);

        let mut graph = self.graph.write().expect("graph lock poisoned");
        match graph.find_edge(src_idx, tgt_idx) {
            Some(edge_idx) => {
                let edge = &mut graph[edge_idx];
                if hop < edge.hop {
                    edge.hop = hop;
                }
                false
            }
            None => {
                graph.add_edge(src_idx, tgt_idx, AssocEdge { hop, score: None });
                true
            }
        }
    }

    /// Attach a score to the edge `source -> target`.
    ///
    /// Returns `false` when no such edge exists.
    pub fn set_score(&self, source: &str, target: &str, score: EdgeScore) -> bool {
        let (Some(src), Some(tgt)) = (self.node_index_of(source), self.node_index_of(target))
        else {
            return false;
        };
        let mut graph = self.graph.write().expect("graph lock poisoned");
        match graph.find_edge(src, tgt) {
            Some(edge_idx) => {
                graph[edge_idx].score = Some(score);
                true
            }
            None => false,
        }
    }

    /// Look up the edge attributes for an ordered pair.
    pub fn edge(&self, source: &str, target: &str) -> Option<AssocEdge> {
        let (src, tgt) = (self.node_index_of(source)?, self.node_index_of(target)?);
        let graph = self.graph.read().expect("graph lock poisoned");
        graph
            .find_edge(src, tgt)
            .map(|edge_idx| graph[edge_idx].clone())
    }

    /// NodeIndex for a word, if present.
    pub fn node_index_of(&self, word: &str) -> Option<NodeIndex> {
        self.node_index.get(word).map(|idx| *idx.value())
    }

    /// Whether the word exists as a node.
    pub fn has_node(&self, word: &str) -> bool {
        self.node_index.contains_key(word)
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.graph.read().expect("graph lock poisoned").node_count()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.graph.read().expect("graph lock poisoned").edge_count()
    }

    /// All words, in node-insertion order.
    pub fn nodes(&self) -> Vec<String> {
        let graph = self.graph.read().expect("graph lock poisoned");
        graph.node_weights().cloned().collect()
    }

    /// All ordered (source, target) pairs, in edge-insertion order.
    ///
    /// The graph is simple, so this is already the deduplicated pair set
    /// the scoring phase iterates.
    pub fn ordered_pairs(&self) -> Vec<(String, String)> {
        let graph = self.graph.read().expect("graph lock poisoned");
        graph
            .edge_references()
            .map(|e| (graph[e.source()].clone(), graph[e.target()].clone()))
            .collect()
    }

    /// Ordered pairs whose edge has not been scored yet, in edge order.
    pub fn unscored_pairs(&self) -> Vec<(String, String)> {
        let graph = self.graph.read().expect("graph lock poisoned");
        graph
            .edge_references()
            .filter(|e| e.weight().score.is_none())
            .map(|e| (graph[e.source()].clone(), graph[e.target()].clone()))
            .collect()
    }

    /// Edge targets that are not in `visited`: the reconstructed frontier
    /// used when resuming a build from a checkpoint.
    pub fn unvisited_targets(
        &self,
        visited: &std::collections::HashSet<String>,
    ) -> std::collections::HashSet<String> {
        let graph = self.graph.read().expect("graph lock poisoned");
        graph
            .edge_references()
            .map(|e| graph[e.target()].clone())
            .filter(|word| !visited.contains(word))
            .collect()
    }

    /// Maximum `hop` value on any edge, or None for an edgeless graph.
    pub fn max_hop(&self) -> Option<u32> {
        let graph = self.graph.read().expect("graph lock poisoned");
        graph.edge_references().map(|e| e.weight().hop).max()
    }

    /// Out-degree of every node, in node order.
    pub fn out_degrees(&self) -> Vec<usize> {
        let graph = self.graph.read().expect("graph lock poisoned");
        graph
            .node_indices()
            .map(|idx| graph.edges_directed(idx, Direction::Outgoing).count())
            .collect()
    }

    /// Serialize to the persisted snapshot form.
    pub fn snapshot(&self) -> GraphSnapshot {
        let graph = self.graph.read().expect("graph lock poisoned");
        let nodes = graph.node_weights().cloned().collect();
        let edges = graph
            .edge_references()
            .map(|e| {
                let attrs = e.weight();
                EdgeRecord {
                    source: graph[e.source()].clone(),
                    target: graph[e.target()].clone(),
                    hop: attrs.hop,
                    scored: attrs.scored(),
                    weight: attrs.score.as_ref().map(|s| s.weight),
                    logprob: attrs.score.as_ref().map(|s| s.logprob),
                    fallback: attrs.score.as_ref().and_then(|s| s.fallback),
                }
            })
            .collect();
        GraphSnapshot {
            schema_version: SNAPSHOT_VERSION,
            nodes,
            edges,
        }
    }

    /// Rebuild a graph from a snapshot, validating edge-attribute invariants.
    pub fn from_snapshot(snapshot: GraphSnapshot) -> GraphResult<Self> {
        if snapshot.schema_version != SNAPSHOT_VERSION {
            return Err(GraphError::SchemaVersion {
                found: snapshot.schema_version,
                expected: SNAPSHOT_VERSION,
            });
        }

        let graph = Self::new();
        for word in &snapshot.nodes {
            graph.ensure_node(word);
        }
        for record in snapshot.edges {
            if record.source == record.target {
                return Err(GraphError::InvalidSnapshot {
                    detail: format!("self-loop on \"{}\"", record.source),
                });
            }
            let score = validate_score(&record)?;
            graph.add_association(&record.source, &record.target, record.hop);
            if let Some(score) = score {
                graph.set_score(&record.source, &record.target, score);
            }
        }
        Ok(graph)
    }

    /// Read access to the underlying petgraph structure (for analytics).
    pub(crate) fn read(&self) -> std::sync::RwLockReadGuard<'_, DiGraph<String, AssocEdge>> {
        self.graph.read().expect("graph lock poisoned")
    }
}

impl Default for AssocGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AssocGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssocGraph")
            .field("nodes", &self.node_count())
            .field("edges", &self.edge_count())
            .finish()
    }
}

fn validate_score(record: &EdgeRecord) -> GraphResult<Option<EdgeScore>> {
    if !record.scored {
        if record.weight.is_some() || record.logprob.is_some() {
            return Err(GraphError::InvalidSnapshot {
                detail: format!(
                    "unscored edge ({} -> {}) carries weight/logprob",
                    record.source, record.target
                ),
            });
        }
        return Ok(None);
    }

    let (Some(weight), Some(logprob)) = (record.weight, record.logprob) else {
        return Err(GraphError::InvalidSnapshot {
            detail: format!(
                "scored edge ({} -> {}) missing weight or logprob",
                record.source, record.target
            ),
        });
    };
    if !(weight > 0.0 && weight <= 1.0) || logprob > 0.0 {
        return Err(GraphError::InvalidSnapshot {
            detail: format!(
                "scored edge ({} -> {}) out of range: weight={weight}, logprob={logprob}",
                record.source, record.target
            ),
        });
    }
    Ok(Some(EdgeScore {
        weight,
        logprob,
        fallback: record.fallback,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_association_creates_nodes_and_edge() {
        let g = AssocGraph::new();
        assert!(g.add_association("physics", "gravity", 0));
        assert_eq!(g.node_count(), 2);
        assert_eq!(g.edge_count(), 1);
        assert_eq!(g.edge("physics", "gravity").unwrap().hop, 0);
    }

    #[test]
    fn self_loops_rejected() {
        let g = AssocGraph::new();
        assert!(!g.add_association("echo", "echo", 0));
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn duplicate_pair_keeps_minimum_hop() {
        let g = AssocGraph::new();
        assert!(g.add_association("a", "b", 2));
        assert!(!g.add_association("a", "b", 1));
        assert!(!g.add_association("a", "b", 3));
        assert_eq!(g.edge("a", "b").unwrap().hop, 1);
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn set_score_marks_edge_scored() {
        let g = AssocGraph::new();
        g.add_association("a", "b", 0);
        assert!(g.set_score(
            "a",
            "b",
            EdgeScore {
                weight: 0.5,
                logprob: -0.6931,
                fallback: None,
            },
        ));
        let edge = g.edge("a", "b").unwrap();
        assert!(edge.scored());
        assert_eq!(g.unscored_pairs().len(), 0);
    }

    #[test]
    fn set_score_on_missing_edge_is_noop() {
        let g = AssocGraph::new();
        g.add_association("a", "b", 0);
        assert!(!g.set_score(
            "b",
            "a",
            EdgeScore {
                weight: 0.5,
                logprob: -0.7,
                fallback: None,
            },
        ));
    }

    #[test]
    fn unvisited_targets_reconstructs_frontier() {
        let g = AssocGraph::new();
        g.add_association("a", "b", 0);
        g.add_association("a", "c", 0);
        g.add_association("b", "d", 1);

        let visited: std::collections::HashSet<String> =
            ["a".to_string(), "b".to_string()].into_iter().collect();
        let frontier = g.unvisited_targets(&visited);
        assert_eq!(
            frontier,
            ["c".to_string(), "d".to_string()].into_iter().collect()
        );
    }

    #[test]
    fn snapshot_round_trip_preserves_attributes() {
        let g = AssocGraph::new();
        g.add_association("a", "b", 0);
        g.add_association("b", "c", 1);
        g.set_score(
            "a",
            "b",
            EdgeScore {
                weight: 0.9,
                logprob: -0.105,
                fallback: None,
            },
        );
        g.set_score(
            "b",
            "c",
            EdgeScore {
                weight: (-15.0f64).exp(),
                logprob: -15.0,
                fallback: Some(ScoreFallback::NotInCandidates),
            },
        );

        let restored = AssocGraph::from_snapshot(g.snapshot()).unwrap();
        assert_eq!(restored.node_count(), 3);
        assert_eq!(restored.edge_count(), 2);

        let ab = restored.edge("a", "b").unwrap();
        assert_eq!(ab.hop, 0);
        assert_eq!(ab.score.as_ref().unwrap().weight, 0.9);

        let bc = restored.edge("b", "c").unwrap();
        assert_eq!(
            bc.score.as_ref().unwrap().fallback,
            Some(ScoreFallback::NotInCandidates)
        );
    }

    #[test]
    fn snapshot_rejects_wrong_version() {
        let mut snap = AssocGraph::new().snapshot();
        snap.schema_version = 99;
        assert!(matches!(
            AssocGraph::from_snapshot(snap),
            Err(GraphError::SchemaVersion { found: 99, .. })
        ));
    }

    #[test]
    fn snapshot_rejects_out_of_range_weight() {
        let snap = GraphSnapshot {
            schema_version: SNAPSHOT_VERSION,
            nodes: vec!["a".into(), "b".into()],
            edges: vec![EdgeRecord {
                source: "a".into(),
                target: "b".into(),
                hop: 0,
                scored: true,
                weight: Some(1.5),
                logprob: Some(-0.1),
                fallback: None,
            }],
        };
        assert!(matches!(
            AssocGraph::from_snapshot(snap),
            Err(GraphError::InvalidSnapshot { .. })
        ));
    }

    #[test]
    fn ordered_pairs_in_edge_insertion_order() {
        let g = AssocGraph::new();
        g.add_association("a", "b", 0);
        g.add_association("a", "c", 0);
        g.add_association("c", "b", 1);
        assert_eq!(
            g.ordered_pairs(),
            vec![
                ("a".to_string(), "b".to_string()),
                ("a".to_string(), "c".to_string()),
                ("c".to_string(), "b".to_string()),
            ]
        );
    }
}
