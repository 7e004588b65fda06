//! Export of the final graph and analysis report.
//!
//! The JSON bundle is structurally lossless: node list, edge list with all
//! attributes, and the nested analysis report, so downstream visualization
//! tools can reconstruct the exact topology without recomputation. The CSV
//! edge list is a convenience for external graph tools.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::graph::{AssocGraph, GraphSnapshot};
use crate::store::StoreResult;
use crate::topology::AnalysisResult;

/// Complete export: graph plus analysis with audit metadata.
#[derive(Debug, Serialize, Deserialize)]
pub struct ExportBundle {
    /// Seconds since UNIX epoch at export time.
    pub generated_at: u64,
    pub graph: GraphSnapshot,
    pub analysis: AnalysisResult,
}

impl ExportBundle {
    /// Assemble a bundle from a graph and its analysis.
    pub fn new(graph: &AssocGraph, analysis: AnalysisResult) -> Self {
        Self {
            generated_at: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            graph: graph.snapshot(),
            analysis,
        }
    }
}

/// Write the lossless JSON bundle.
pub fn write_bundle_json(path: &Path, bundle: &ExportBundle) -> StoreResult<()> {
    let json = serde_json::to_vec_pretty(bundle).map_err(|e| StoreError::Serialization {
        message: e.to_string(),
    })?;
    std::fs::write(path, json).map_err(|e| StoreError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Write a `source,target,weight` CSV edge list for external graph tools.
/// Unscored edges are written with weight 1.0 so a raw phase-1 graph still
/// imports as an unweighted graph.
pub fn write_edge_csv(path: &Path, graph: &AssocGraph) -> StoreResult<()> {
    let mut out = String::from("source,target,weight\n");
    for record in graph.snapshot().edges {
        let weight = record.weight.unwrap_or(1.0);
        out.push_str(&format!("{},{},{}\n", record.source, record.target, weight));
    }
    std::fs::write(path, out).map_err(|e| StoreError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}
