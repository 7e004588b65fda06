//! # semgrav
//!
//! Semantic gravity mapper: builds a directed word-association graph of a
//! language model's internal semantic structure, weights the edges with
//! token log-probabilities, and analyzes the resulting topology.
//!
//! ## Architecture
//!
//! - **Graph core** (`graph`): petgraph-backed simple directed graph with
//!   typed edge attributes and analytics (PageRank, betweenness, components)
//! - **Phases** (`builder` → `scorer` → `topology`): checkpointed BFS
//!   expansion, logprob scoring, and topology analysis
//! - **Inference boundary** (`infer`): abstract engine trait plus an
//!   OpenAI-compatible HTTP adapter
//! - **Durability** (`store`): atomic, versioned JSON checkpoints with
//!   resume support
//! - **Seeds** (`seeds`): the bundled 10-domain seed corpus
//!
//! ## Library usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use semgrav::config::PipelineConfig;
//! use semgrav::infer::{HttpEngine, HttpEngineConfig};
//! use semgrav::pipeline::Pipeline;
//! use semgrav::seeds::SeedCorpus;
//! use semgrav::store::CheckpointStore;
//!
//! let config = PipelineConfig::default();
//! let engine = Arc::new(HttpEngine::new(HttpEngineConfig::default()));
//! let store = CheckpointStore::open(std::path::Path::new("checkpoints")).unwrap();
//! let seeds = SeedCorpus::bundled().unwrap();
//!
//! let pipeline = Pipeline::new(engine, store, seeds, config);
//! let (graph, analysis) = pipeline.run(true).unwrap();
//! println!("{analysis}");
//! ```

pub mod builder;
pub mod config;
pub mod error;
pub mod export;
pub mod graph;
pub mod infer;
pub mod paths;
pub mod pipeline;
pub mod scorer;
pub mod seeds;
pub mod store;
pub mod topology;
