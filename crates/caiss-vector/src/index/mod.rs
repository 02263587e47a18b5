//! Vector indexes for similarity search.
//!
//! This module provides the HNSW (Hierarchical Navigable Small World) index
//! for approximate nearest neighbor (ANN) search.
//!
//! # Overview
//!
//! HNSW builds a layered proximity graph. Every node lives on layer 0; each
//! higher layer holds an exponentially thinner subset. A query descends greedily
//! from the single entry point on the top layer, then runs a bounded best-first
//! search on layer 0.
//!
//! - **Concurrent**: inserts and searches both take `&self`
//! - **Tombstone deletes**: removed nodes keep routing but never appear in results
//! - **Persistence**: [`persistence::save`] and [`persistence::load`] write a
//!   versioned, checksummed model file
//!
//! # Configuration Parameters
//!
//! - **M**: Maximum number of connections per node above layer 0
//! - **`m_max0`**: Maximum connections on layer 0 (defaults to 2 * M)
//! - **`ef_construction`**: Beam width during insertion
//! - **`ef_search`**: Default beam width during search
//!
//! # Example
//!
//! ```
//! use caiss_vector::distance::DistanceMetric;
//! use caiss_vector::index::{HnswConfig, HnswIndex, InsertMode, SearchParams};
//! use caiss_vector::types::Embedding;
//!
//! let index = HnswIndex::new(2, DistanceMetric::Euclidean, HnswConfig::new(8)).unwrap();
//! index.insert(1u64.into(), Embedding::new(vec![0.0, 0.0]).unwrap(), InsertMode::Overwrite).unwrap();
//! index.insert(2u64.into(), Embedding::new(vec![3.0, 4.0]).unwrap(), InsertMode::Overwrite).unwrap();
//!
//! let outcome = index.search(&[2.5, 4.0], &SearchParams::new(1)).unwrap();
//! assert_eq!(outcome.results[0].external_id, 2u64.into());
//! ```

mod config;
pub(crate) mod graph;
mod hnsw;
pub mod persistence;

pub use config::{HnswConfig, NeighborSelection, MAX_LEVEL_CAP};
pub use graph::{Candidate, GraphNode, HnswGraph, MaxCandidate};
pub use hnsw::{
    HnswIndex, InsertMode, InsertOutcome, SearchOutcome, SearchParams, SearchResult,
};
pub use persistence::{LoadedModel, ModelExpectation, ModelHeader, ModelOptions};
