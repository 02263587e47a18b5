//! Caiss Vector
//!
//! The algorithmic core of the caiss search engine: validated vectors, distance
//! kernels, the HNSW index and its model file.
//!
//! # Overview
//!
//! - **Distance kernels**: inner product, squared Euclidean, cosine and Hamming,
//!   all oriented so that a smaller value means closer
//! - **Vector store**: an append-only arena with tombstone deletes
//! - **HNSW index**: concurrent insert and search with a deadline-aware search loop
//! - **Exact k-NN**: a brute-force scan over the same records
//! - **Persistence**: a versioned, checksummed, little-endian model file
//!
//! # Example
//!
//! ```
//! use caiss_vector::{DistanceMetric, Embedding, HnswConfig, HnswIndex, InsertMode, SearchParams};
//!
//! let index = HnswIndex::new(3, DistanceMetric::Cosine, HnswConfig::default()).unwrap();
//! index
//!     .insert("apple".into(), Embedding::new(vec![1.0, 0.2, 0.0]).unwrap(), InsertMode::Overwrite)
//!     .unwrap();
//!
//! let outcome = index.search(&[1.0, 0.1, 0.0], &SearchParams::new(1)).unwrap();
//! assert_eq!(outcome.results[0].external_id, "apple".into());
//! ```
//!
//! # Modules
//!
//! - [`distance`] - Distance kernels
//! - [`types`] - Core types ([`Embedding`], [`ExternalId`])
//! - [`store`] - Record storage
//! - [`index`] - The HNSW index and model persistence
//! - [`ops`] - Exact search
//! - [`error`] - Error types

pub mod distance;
pub mod error;
pub mod index;
pub mod ops;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use distance::{CustomDistance, DistanceFn, DistanceKernel, DistanceMetric};
pub use error::{Result, VectorError};
pub use index::{
    HnswConfig, HnswIndex, InsertMode, InsertOutcome, NeighborSelection, SearchOutcome,
    SearchParams, SearchResult,
};
pub use types::{Embedding, ExternalId};
