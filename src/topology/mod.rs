//! Topology analysis of the weighted association graph.
//!
//! Phase 3 of the pipeline. Extracts the semantic patterns the graph was
//! built to reveal:
//!
//! - **Hubs**: weighted-PageRank attractors, paired with in-degree
//! - **Convergence**: how few hops each domain's seeds need to reach the
//!   top hubs via cheapest weighted paths ("semantic gravity")
//! - **Islands**: weakly connected components cut off from the rest
//! - **Centrality bundle**: PageRank, betweenness, in/out degree top lists
//! - **Asymmetry**: reciprocal pairs where one direction is much stronger
//!
//! Every sub-analysis is a pure function of the input graph; `analyze_all`
//! just runs each and assembles the bundle.

use serde::{Deserialize, Serialize};

use crate::graph::analytics;
use crate::graph::AssocGraph;
use crate::seeds::SeedCorpus;

use petgraph::visit::EdgeRef;

/// PageRank damping factor.
const PAGERANK_DAMPING: f64 = 0.85;
/// PageRank iteration cap.
const PAGERANK_MAX_ITER: usize = 100;
/// Number of hubs the convergence analysis measures distances to.
const CONVERGENCE_HUBS: usize = 5;

/// Tunable cutoffs for [`TopologyAnalyzer::analyze_all`].
#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    /// Hubs returned by the hub ranking.
    pub hub_top_n: usize,
    /// Minimum component size reported as an island.
    pub island_min_size: usize,
    /// Minimum |forward - backward| weight difference to report.
    pub asymmetry_threshold: f64,
    /// Asymmetric pairs returned.
    pub asymmetry_top_n: usize,
    /// Entries per centrality metric.
    pub centrality_top_k: usize,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            hub_top_n: 20,
            island_min_size: 3,
            asymmetry_threshold: 0.3,
            asymmetry_top_n: 20,
            centrality_top_k: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// One hub: a high-PageRank attractor word.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hub {
    pub word: String,
    pub pagerank: f64,
    pub in_degree: usize,
}

/// Hop-count distribution over successful seed → hub paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HopStats {
    pub avg: f64,
    pub min: usize,
    pub max: usize,
    pub std_dev: f64,
}

/// Convergence metrics for one seed domain.
///
/// `stats` is None when no seed of the domain reaches any hub: the
/// "infinite distance" case. Such domains are excluded from the overall
/// average rather than counted as zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainConvergence {
    pub domain: String,
    pub stats: Option<HopStats>,
    pub paths_found: usize,
}

/// Convergence report across all domains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvergenceReport {
    /// The hub words distances were measured to.
    pub hub_words: Vec<String>,
    /// Per-domain metrics, corpus order.
    pub by_domain: Vec<DomainConvergence>,
    /// Mean of the finite per-domain averages; None when every domain is
    /// disconnected.
    pub overall_avg_hops: Option<f64>,
}

/// A weakly connected component reported as an island.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Island {
    pub words: Vec<String>,
    pub size: usize,
}

/// One directionally biased association pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsymmetricPair {
    pub source: String,
    pub target: String,
    pub forward_weight: f64,
    pub backward_weight: f64,
    pub asymmetry: f64,
}

/// Top-K rankings for each centrality metric, rank order preserved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CentralityReport {
    pub pagerank: Vec<(String, f64)>,
    pub betweenness: Vec<(String, f64)>,
    pub in_degree: Vec<(String, usize)>,
    pub out_degree: Vec<(String, usize)>,
}

/// Basic structural statistics of the graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphStatistics {
    pub nodes: usize,
    pub edges: usize,
    /// Average total degree (in + out).
    pub avg_degree: f64,
    pub max_degree: usize,
    /// Directed simple-graph density: edges / (n * (n - 1)).
    pub density: f64,
    pub weakly_connected_components: usize,
}

/// The full analysis bundle: pure derived data, immutable once computed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub statistics: GraphStatistics,
    pub hubs: Vec<Hub>,
    pub convergence: ConvergenceReport,
    pub islands: Vec<Island>,
    pub centrality: CentralityReport,
    pub asymmetry: Vec<AsymmetricPair>,
}

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

/// Topology analyzer over a scored graph.
///
/// Works on any graph (unscored edges count as weight 0), so a partially
/// built pipeline degrades to well-defined, if uninteresting, results
/// instead of failing.
pub struct TopologyAnalyzer<'g> {
    graph: &'g AssocGraph,
    corpus: &'g SeedCorpus,
}

impl<'g> TopologyAnalyzer<'g> {
    /// Create an analyzer for the given graph and seed corpus.
    pub fn new(graph: &'g AssocGraph, corpus: &'g SeedCorpus) -> Self {
        Self { graph, corpus }
    }

    /// Run every sub-analysis and assemble the bundle.
    pub fn analyze_all(&self, options: &AnalyzeOptions) -> AnalysisResult {
        tracing::info!(
            nodes = self.graph.node_count(),
            edges = self.graph.edge_count(),
            "running topology analysis"
        );
        let statistics = self.statistics();
        let hubs = self.find_hubs(options.hub_top_n);
        let convergence = self.convergence_analysis();
        let islands = self.detect_islands(options.island_min_size);
        let centrality = self.centrality(options.centrality_top_k);
        let asymmetry =
            self.asymmetry_check(options.asymmetry_threshold, options.asymmetry_top_n);
        tracing::info!("topology analysis complete");
        AnalysisResult {
            statistics,
            hubs,
            convergence,
            islands,
            centrality,
            asymmetry,
        }
    }

    /// Top concepts by weighted PageRank, paired with raw in-degree.
    /// Ties keep the graph's iteration order.
    pub fn find_hubs(&self, top_n: usize) -> Vec<Hub> {
        let in_degrees: std::collections::HashMap<String, usize> =
            analytics::degree_centrality(self.graph)
                .into_iter()
                .map(|d| (d.word, d.in_degree))
                .collect();

        analytics::pagerank(self.graph, PAGERANK_DAMPING, PAGERANK_MAX_ITER)
            .into_iter()
            .take(top_n)
            .map(|score| {
                let in_degree = in_degrees.get(&score.word).copied().unwrap_or(0);
                Hub {
                    word: score.word,
                    pagerank: score.score,
                    in_degree,
                }
            })
            .collect()
    }

    /// Measure "semantic gravity": hop counts of the cheapest weighted
    /// paths from each domain's seeds to the top hubs.
    pub fn convergence_analysis(&self) -> ConvergenceReport {
        let hub_words: Vec<String> = self
            .find_hubs(CONVERGENCE_HUBS)
            .into_iter()
            .map(|h| h.word)
            .collect();

        let mut by_domain = Vec::with_capacity(self.corpus.domains().len());
        for domain in self.corpus.domains() {
            let mut hops: Vec<usize> = Vec::new();
            for seed in &domain.words {
                let seed = seed.to_lowercase();
                if !self.graph.has_node(&seed) {
                    continue;
                }
                for hub in &hub_words {
                    if !self.graph.has_node(hub) {
                        continue;
                    }
                    if let Some(h) = analytics::shortest_path_hops(self.graph, &seed, hub) {
                        hops.push(h);
                    }
                }
            }
            by_domain.push(DomainConvergence {
                domain: domain.name.clone(),
                stats: hop_stats(&hops),
                paths_found: hops.len(),
            });
        }

        let finite_avgs: Vec<f64> = by_domain
            .iter()
            .filter_map(|d| d.stats.as_ref().map(|s| s.avg))
            .collect();
        let overall_avg_hops = if finite_avgs.is_empty() {
            None
        } else {
            Some(finite_avgs.iter().sum::<f64>() / finite_avgs.len() as f64)
        };

        ConvergenceReport {
            hub_words,
            by_domain,
            overall_avg_hops,
        }
    }

    /// Weakly connected components at or above `min_size`, largest first.
    pub fn detect_islands(&self, min_size: usize) -> Vec<Island> {
        analytics::weak_components(self.graph)
            .into_iter()
            .filter(|c| c.size >= min_size)
            .map(|c| Island {
                words: c.members,
                size: c.size,
            })
            .collect()
    }

    /// Reciprocal pairs whose directional weights differ by at least
    /// `threshold`, strongest bias first.
    pub fn asymmetry_check(&self, threshold: f64, top_n: usize) -> Vec<AsymmetricPair> {
        let inner = self.graph.read();
        let mut pairs: Vec<AsymmetricPair> = inner
            .edge_references()
            .filter_map(|e| {
                let forward_weight = e.weight().weight_or_zero();
                let backward_weight = inner
                    .find_edge(e.target(), e.source())
                    .map_or(0.0, |idx| inner[idx].weight_or_zero());
                let asymmetry = (forward_weight - backward_weight).abs();
                if asymmetry < threshold {
                    return None;
                }
                Some(AsymmetricPair {
                    source: inner[e.source()].clone(),
                    target: inner[e.target()].clone(),
                    forward_weight,
                    backward_weight,
                    asymmetry,
                })
            })
            .collect();
        pairs.sort_by(|a, b| {
            b.asymmetry
                .partial_cmp(&a.asymmetry)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        pairs.truncate(top_n);
        pairs
    }

    /// Top-K rankings for PageRank, betweenness, and raw degrees.
    pub fn centrality(&self, top_k: usize) -> CentralityReport {
        let pagerank = analytics::pagerank(self.graph, PAGERANK_DAMPING, PAGERANK_MAX_ITER)
            .into_iter()
            .take(top_k)
            .map(|s| (s.word, s.score))
            .collect();
        let betweenness = analytics::betweenness(self.graph)
            .into_iter()
            .take(top_k)
            .map(|s| (s.word, s.score))
            .collect();

        let degrees = analytics::degree_centrality(self.graph);
        let mut by_in = degrees.clone();
        by_in.sort_by(|a, b| b.in_degree.cmp(&a.in_degree));
        let in_degree = by_in
            .into_iter()
            .take(top_k)
            .map(|d| (d.word, d.in_degree))
            .collect();
        let mut by_out = degrees;
        by_out.sort_by(|a, b| b.out_degree.cmp(&a.out_degree));
        let out_degree = by_out
            .into_iter()
            .take(top_k)
            .map(|d| (d.word, d.out_degree))
            .collect();

        CentralityReport {
            pagerank,
            betweenness,
            in_degree,
            out_degree,
        }
    }

    /// Basic structural statistics.
    pub fn statistics(&self) -> GraphStatistics {
        let nodes = self.graph.node_count();
        let edges = self.graph.edge_count();

        let degrees: Vec<usize> = analytics::degree_centrality(self.graph)
            .into_iter()
            .map(|d| d.total)
            .collect();
        let avg_degree = if nodes == 0 {
            0.0
        } else {
            degrees.iter().sum::<usize>() as f64 / nodes as f64
        };
        let max_degree = degrees.into_iter().max().unwrap_or(0);
        let density = if nodes > 1 {
            edges as f64 / (nodes as f64 * (nodes as f64 - 1.0))
        } else {
            0.0
        };

        GraphStatistics {
            nodes,
            edges,
            avg_degree,
            max_degree,
            density,
            weakly_connected_components: analytics::weak_components(self.graph).len(),
        }
    }
}

fn hop_stats(hops: &[usize]) -> Option<HopStats> {
    if hops.is_empty() {
        return None;
    }
    let n = hops.len() as f64;
    let avg = hops.iter().sum::<usize>() as f64 / n;
    let variance = hops
        .iter()
        .map(|&h| (h as f64 - avg).powi(2))
        .sum::<f64>()
        / n;
    Some(HopStats {
        avg,
        min: *hops.iter().min().expect("non-empty"),
        max: *hops.iter().max().expect("non-empty"),
        std_dev: variance.sqrt(),
    })
}

// ---------------------------------------------------------------------------
// Human-readable summary
// ---------------------------------------------------------------------------

impl std::fmt::Display for AnalysisResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "semantic graph analysis")?;
        let s = &self.statistics;
        writeln!(f, "  nodes:       {}", s.nodes)?;
        writeln!(f, "  edges:       {}", s.edges)?;
        writeln!(f, "  avg degree:  {:.2}", s.avg_degree)?;
        writeln!(f, "  density:     {:.4}", s.density)?;
        writeln!(f, "  components:  {}", s.weakly_connected_components)?;

        writeln!(f, "\ntop hubs (by PageRank):")?;
        for (i, hub) in self.hubs.iter().take(10).enumerate() {
            writeln!(
                f,
                "  {:2}. {:20} PR {:.4}  in-degree {}",
                i + 1,
                hub.word,
                hub.pagerank,
                hub.in_degree
            )?;
        }

        writeln!(f, "\nconvergence (hops to hubs):")?;
        match self.convergence.overall_avg_hops {
            Some(avg) => writeln!(f, "  overall avg: {avg:.2}")?,
            None => writeln!(f, "  overall avg: unreachable")?,
        }
        for d in &self.convergence.by_domain {
            match &d.stats {
                Some(stats) => writeln!(
                    f,
                    "  {:24} {:.2} hops (±{:.2}, {} paths)",
                    d.domain, stats.avg, stats.std_dev, d.paths_found
                )?,
                None => writeln!(f, "  {:24} unreachable (0 paths)", d.domain)?,
            }
        }

        if self.islands.is_empty() {
            writeln!(f, "\nno islands at the size threshold")?;
        } else {
            writeln!(f, "\nislands:")?;
            for island in self.islands.iter().take(5) {
                let preview: Vec<&str> =
                    island.words.iter().take(5).map(String::as_str).collect();
                writeln!(f, "  size {:4}: {}", island.size, preview.join(", "))?;
            }
        }

        writeln!(f, "\ntop asymmetric associations:")?;
        for pair in self.asymmetry.iter().take(5) {
            writeln!(
                f,
                "  {} -> {}: forward {:.3}, backward {:.3}, asymmetry {:.3}",
                pair.source, pair.target, pair.forward_weight, pair.backward_weight, pair.asymmetry
            )?;
        }
        Ok(())
    }
}
