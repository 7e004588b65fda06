//! Graph analytics: centrality, components, and path algorithms.
//!
//! All functions operate on an [`AssocGraph`] reference and return
//! structured results sorted by relevance (score desc, size desc, etc.).
//! Unscored edges contribute weight 0 everywhere; the shortest-path cost
//! transform adds [`WEIGHT_COST_EPSILON`] so a zero weight never divides
//! by zero.

use std::collections::BinaryHeap;

use petgraph::algo::astar;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::unionfind::UnionFind;
use petgraph::visit::EdgeRef;
use rayon::prelude::*;

use super::{AssocEdge, AssocGraph};

/// Additive epsilon in the weight → distance transform `1 / (w + ε)`.
pub const WEIGHT_COST_EPSILON: f64 = 0.01;

/// Convergence tolerance for the PageRank power iteration (per node).
const PAGERANK_TOLERANCE: f64 = 1e-8;

/// Distance tie tolerance for shortest-path counting in betweenness.
const DISTANCE_TIE_EPSILON: f64 = 1e-12;

/// Traversal cost of an edge with the given weight.
///
/// Strong associations (weight near 1) are cheap to traverse; weak or
/// unscored ones are expensive but never infinite.
pub fn edge_cost(weight: f64) -> f64 {
    1.0 / (weight + WEIGHT_COST_EPSILON)
}

// ---------------------------------------------------------------------------
// Degree centrality
// ---------------------------------------------------------------------------

/// Degree centrality metrics for a single node.
#[derive(Debug, Clone)]
pub struct DegreeCentrality {
    /// The word this measurement belongs to.
    pub word: String,
    /// Number of incoming edges.
    pub in_degree: usize,
    /// Number of outgoing edges.
    pub out_degree: usize,
    /// Total degree (in + out).
    pub total: usize,
}

/// Compute degree centrality for all nodes. Returns sorted by total degree desc.
pub fn degree_centrality(g: &AssocGraph) -> Vec<DegreeCentrality> {
    let graph = g.read();
    let mut results: Vec<DegreeCentrality> = graph
        .node_indices()
        .map(|idx| {
            let out_degree = graph
                .edges_directed(idx, petgraph::Direction::Outgoing)
                .count();
            let in_degree = graph
                .edges_directed(idx, petgraph::Direction::Incoming)
                .count();
            DegreeCentrality {
                word: graph[idx].clone(),
                in_degree,
                out_degree,
                total: in_degree + out_degree,
            }
        })
        .collect();
    results.sort_by(|a, b| b.total.cmp(&a.total));
    results
}

// ---------------------------------------------------------------------------
// Weighted PageRank
// ---------------------------------------------------------------------------

/// PageRank score for a single node.
#[derive(Debug, Clone)]
pub struct PageRankScore {
    /// The word this score belongs to.
    pub word: String,
    /// Computed PageRank score.
    pub score: f64,
}

/// Compute weight-proportional PageRank scores. Returns sorted by score desc;
/// ties keep the graph's node-insertion order (stable sort).
///
/// Transition probability out of a node is proportional to edge weight.
/// Nodes with zero total out-weight are dangling: their rank mass is
/// redistributed uniformly, so the iteration stays a proper distribution.
/// Stops after `max_iter` sweeps or once the L1 change drops below
/// tolerance, whichever comes first.
pub fn pagerank(g: &AssocGraph, damping: f64, max_iter: usize) -> Vec<PageRankScore> {
    let graph = g.read();
    let n = graph.node_count();
    if n == 0 {
        return vec![];
    }
    let nf = n as f64;

    let mut out_weight = vec![0.0f64; n];
    for edge in graph.edge_references() {
        out_weight[edge.source().index()] += edge.weight().weight_or_zero();
    }

    let mut ranks = vec![1.0 / nf; n];
    for _ in 0..max_iter {
        let dangling_mass: f64 = ranks
            .iter()
            .zip(&out_weight)
            .filter(|&(_, &ow)| ow <= 0.0)
            .map(|(&r, _)| r)
            .sum();

        let base = (1.0 - damping) / nf + damping * dangling_mass / nf;
        let mut next = vec![base; n];
        for edge in graph.edge_references() {
            let src = edge.source().index();
            if out_weight[src] > 0.0 {
                next[edge.target().index()] +=
                    damping * ranks[src] * edge.weight().weight_or_zero() / out_weight[src];
            }
        }

        let err: f64 = next
            .iter()
            .zip(&ranks)
            .map(|(a, b)| (a - b).abs())
            .sum();
        ranks = next;
        if err < PAGERANK_TOLERANCE * nf {
            break;
        }
    }

    let mut results: Vec<PageRankScore> = graph
        .node_indices()
        .map(|idx| PageRankScore {
            word: graph[idx].clone(),
            score: ranks[idx.index()],
        })
        .collect();
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    results
}

// ---------------------------------------------------------------------------
// Weighted betweenness centrality
// ---------------------------------------------------------------------------

/// Betweenness score for a single node.
#[derive(Debug, Clone)]
pub struct BetweennessScore {
    /// The word this score belongs to.
    pub word: String,
    /// Normalized betweenness centrality.
    pub score: f64,
}

/// Min-heap entry for the Dijkstra stage of Brandes' algorithm.
/// Costs are finite and positive, so the partial order is total here.
struct MinCost {
    cost: f64,
    node: usize,
}

impl PartialEq for MinCost {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost
    }
}
impl Eq for MinCost {}
impl PartialOrd for MinCost {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for MinCost {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reversed so BinaryHeap pops the cheapest entry first.
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(std::cmp::Ordering::Equal)
    }
}

/// Compute weighted betweenness centrality (Brandes over Dijkstra).
///
/// Edge distance is `edge_cost(weight)`, the same transform the convergence
/// analysis uses. Scores are normalized by `(n-1)(n-2)` for directed graphs.
/// Sources are processed in parallel; per-source dependency vectors are
/// summed, so the result is deterministic. Returns sorted by score desc.
pub fn betweenness(g: &AssocGraph) -> Vec<BetweennessScore> {
    let guard = g.read();
    let graph = &*guard;
    let n = graph.node_count();
    if n < 3 {
        return graph
            .node_indices()
            .map(|idx| BetweennessScore {
                word: graph[idx].clone(),
                score: 0.0,
            })
            .collect();
    }

    let totals: Vec<f64> = (0..n)
        .into_par_iter()
        .map(|source| source_dependencies(graph, source))
        .reduce(
            || vec![0.0; n],
            |mut acc, dep| {
                for (a, d) in acc.iter_mut().zip(&dep) {
                    *a += d;
                }
                acc
            },
        );

    let scale = 1.0 / ((n - 1) as f64 * (n - 2) as f64);
    let mut results: Vec<BetweennessScore> = graph
        .node_indices()
        .map(|idx| BetweennessScore {
            word: graph[idx].clone(),
            score: totals[idx.index()] * scale,
        })
        .collect();
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    results
}

/// One source's dependency contributions (Brandes' δ accumulation).
fn source_dependencies(graph: &DiGraph<String, AssocEdge>, source: usize) -> Vec<f64> {
    let n = graph.node_count();
    let mut dist = vec![f64::INFINITY; n];
    let mut sigma = vec![0.0f64; n];
    let mut preds: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut settled: Vec<usize> = Vec::with_capacity(n);
    let mut done = vec![false; n];

    dist[source] = 0.0;
    sigma[source] = 1.0;
    let mut heap = BinaryHeap::new();
    heap.push(MinCost {
        cost: 0.0,
        node: source,
    });

    while let Some(MinCost { cost, node }) = heap.pop() {
        if done[node] {
            continue;
        }
        done[node] = true;
        settled.push(node);

        for edge in graph.edges(NodeIndex::new(node)) {
            let next = edge.target().index();
            let next_cost = cost + edge_cost(edge.weight().weight_or_zero());
            if next_cost < dist[next] - DISTANCE_TIE_EPSILON {
                dist[next] = next_cost;
                sigma[next] = sigma[node];
                preds[next].clear();
                preds[next].push(node);
                heap.push(MinCost {
                    cost: next_cost,
                    node: next,
                });
            } else if !done[next] && (next_cost - dist[next]).abs() <= DISTANCE_TIE_EPSILON {
                sigma[next] += sigma[node];
                preds[next].push(node);
            }
        }
    }

    let mut delta = vec![0.0f64; n];
    let mut dep = vec![0.0f64; n];
    for &w in settled.iter().rev() {
        for &v in &preds[w] {
            delta[v] += sigma[v] / sigma[w] * (1.0 + delta[w]);
        }
        if w != source {
            dep[w] = delta[w];
        }
    }
    dep
}

// ---------------------------------------------------------------------------
// Weakly connected components
// ---------------------------------------------------------------------------

/// A weakly connected component of the directed graph.
#[derive(Debug, Clone)]
pub struct Component {
    /// Member words, sorted.
    pub members: Vec<String>,
    /// Number of members.
    pub size: usize,
}

/// Find weakly connected components (direction ignored for connectivity).
/// Returns sorted by size desc; members sorted within each component.
pub fn weak_components(g: &AssocGraph) -> Vec<Component> {
    let graph = g.read();
    let n = graph.node_count();
    if n == 0 {
        return vec![];
    }

    let mut uf = UnionFind::<usize>::new(n);
    for edge in graph.edge_references() {
        uf.union(edge.source().index(), edge.target().index());
    }

    let mut groups: std::collections::HashMap<usize, Vec<String>> =
        std::collections::HashMap::new();
    for idx in graph.node_indices() {
        groups
            .entry(uf.find(idx.index()))
            .or_default()
            .push(graph[idx].clone());
    }

    let mut components: Vec<Component> = groups
        .into_values()
        .map(|mut members| {
            members.sort();
            let size = members.len();
            Component { members, size }
        })
        .collect();
    components.sort_by(|a, b| b.size.cmp(&a.size).then_with(|| a.members.cmp(&b.members)));
    components
}

// ---------------------------------------------------------------------------
// Weighted shortest path
// ---------------------------------------------------------------------------

/// Hop count (edge count, not cost) of the cheapest weighted path between
/// two words, using `edge_cost` as the distance. Returns None when either
/// word is absent or no path exists.
pub fn shortest_path_hops(g: &AssocGraph, from: &str, to: &str) -> Option<usize> {
    let from_idx = g.node_index_of(from)?;
    let to_idx = g.node_index_of(to)?;
    let graph = g.read();

    let result = astar(
        &*graph,
        from_idx,
        |node| node == to_idx,
        |edge| edge_cost(edge.weight().weight_or_zero()),
        |_| 0.0,
    );
    result.map(|(_cost, path)| path.len() - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EdgeScore;

    fn scored(weight: f64) -> EdgeScore {
        EdgeScore {
            weight,
            logprob: weight.ln(),
            fallback: None,
        }
    }

    fn weighted_edge(g: &AssocGraph, from: &str, to: &str, hop: u32, weight: f64) {
        g.add_association(from, to, hop);
        g.set_score(from, to, scored(weight));
    }

    fn build_star_graph() -> AssocGraph {
        // Spokes all point at the hub with strong weights.
        let g = AssocGraph::new();
        for spoke in ["alpha", "beta", "gamma", "delta"] {
            weighted_edge(&g, spoke, "hub", 0, 0.9);
        }
        g
    }

    #[test]
    fn degree_centrality_hub_highest() {
        let g = build_star_graph();
        let results = degree_centrality(&g);
        assert_eq!(results[0].word, "hub");
        assert_eq!(results[0].in_degree, 4);
        assert_eq!(results[0].out_degree, 0);
    }

    #[test]
    fn pagerank_hub_scores_highest() {
        let g = build_star_graph();
        let results = pagerank(&g, 0.85, 100);
        assert_eq!(results[0].word, "hub");
        assert!(results[0].score > results[1].score);
    }

    #[test]
    fn pagerank_empty_graph() {
        let g = AssocGraph::new();
        assert!(pagerank(&g, 0.85, 100).is_empty());
    }

    #[test]
    fn pagerank_sums_to_one() {
        let g = build_star_graph();
        weighted_edge(&g, "hub", "alpha", 1, 0.2);
        let total: f64 = pagerank(&g, 0.85, 100).iter().map(|r| r.score).sum();
        assert!((total - 1.0).abs() < 1e-6, "rank mass {total} != 1");
    }

    #[test]
    fn pagerank_unscored_graph_is_uniform() {
        // All weights default to zero: every node dangles, ranks are uniform.
        let g = AssocGraph::new();
        g.add_association("a", "b", 0);
        g.add_association("b", "c", 0);
        let results = pagerank(&g, 0.85, 100);
        for r in &results {
            assert!((r.score - 1.0 / 3.0).abs() < 1e-9);
        }
    }

    #[test]
    fn betweenness_bridge_node() {
        // a -> b -> c plus a disconnected pair: b bridges the only path.
        let g = AssocGraph::new();
        weighted_edge(&g, "a", "b", 0, 0.9);
        weighted_edge(&g, "b", "c", 1, 0.9);
        weighted_edge(&g, "x", "y", 0, 0.9);
        let results = betweenness(&g);
        assert_eq!(results[0].word, "b");
        assert!(results[0].score > 0.0);
        let a_score = results.iter().find(|r| r.word == "a").unwrap();
        assert_eq!(a_score.score, 0.0);
    }

    #[test]
    fn betweenness_counts_shortest_path_multiplicity() {
        // Two equal-cost routes a->m1->z and a->m2->z split the dependency.
        let g = AssocGraph::new();
        weighted_edge(&g, "a", "m1", 0, 0.5);
        weighted_edge(&g, "a", "m2", 0, 0.5);
        weighted_edge(&g, "m1", "z", 1, 0.5);
        weighted_edge(&g, "m2", "z", 1, 0.5);
        let results = betweenness(&g);
        let m1 = results.iter().find(|r| r.word == "m1").unwrap().score;
        let m2 = results.iter().find(|r| r.word == "m2").unwrap().score;
        assert!((m1 - m2).abs() < 1e-9, "equal routes must split evenly");
        assert!(m1 > 0.0);
    }

    #[test]
    fn weak_components_ignore_direction() {
        let g = AssocGraph::new();
        g.add_association("a", "b", 0);
        g.add_association("c", "b", 0); // converging edges still connect a and c
        g.add_association("x", "y", 0);
        let components = weak_components(&g);
        assert_eq!(components.len(), 2);
        assert_eq!(components[0].size, 3);
        assert_eq!(components[0].members, vec!["a", "b", "c"]);
        assert_eq!(components[1].members, vec!["x", "y"]);
    }

    #[test]
    fn shortest_path_prefers_strong_edges() {
        // Direct weak edge vs a two-hop strong detour: the detour is cheaper.
        let g = AssocGraph::new();
        weighted_edge(&g, "a", "z", 0, 0.01);
        weighted_edge(&g, "a", "m", 0, 0.9);
        weighted_edge(&g, "m", "z", 1, 0.9);
        assert_eq!(shortest_path_hops(&g, "a", "z"), Some(2));
    }

    #[test]
    fn shortest_path_missing_node() {
        let g = AssocGraph::new();
        g.add_association("a", "b", 0);
        assert_eq!(shortest_path_hops(&g, "a", "nowhere"), None);
    }

    #[test]
    fn shortest_path_no_route() {
        let g = AssocGraph::new();
        g.add_association("a", "b", 0);
        g.add_association("c", "d", 0);
        assert_eq!(shortest_path_hops(&g, "a", "c"), None);
    }

    #[test]
    fn shortest_path_to_self_is_zero_hops() {
        let g = AssocGraph::new();
        g.add_association("a", "b", 0);
        assert_eq!(shortest_path_hops(&g, "a", "a"), Some(0));
    }

    #[test]
    fn edge_cost_never_divides_by_zero() {
        assert!(edge_cost(0.0).is_finite());
        assert!(edge_cost(0.0) > edge_cost(1.0));
    }
}
