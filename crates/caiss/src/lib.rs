//! # caiss
//!
//! An embeddable approximate nearest-neighbor search engine.
//!
//! Each [`IndexEngine`] owns one HNSW index from [`caiss_vector`] together with a
//! worker pool, a result cache and a model file. Engines are independent; the
//! [`Caiss`] facade keeps them in a generation-checked handle table and reports
//! every outcome as an integer [`Status`].
//!
//! # Example
//!
//! ```
//! use caiss::{DistanceMetric, EngineConfig, ExternalId, IndexEngine, RunMode, SearchOptions, SearchType};
//!
//! let engine = IndexEngine::new(EngineConfig::default()).unwrap();
//! engine.initialize(RunMode::Process, DistanceMetric::Cosine, 3, None).unwrap();
//!
//! engine.insert(&[1.0, 0.0, 0.0], ExternalId::Int(1)).unwrap();
//! engine.insert(&[0.0, 1.0, 0.0], ExternalId::from("north")).unwrap();
//!
//! let response = engine
//!     .search(&[0.1, 0.9, 0.0], SearchType::Approximate, 1, &SearchOptions::default())
//!     .unwrap();
//! assert_eq!(response.hits[0].external_id, ExternalId::from("north"));
//!
//! engine.destroy().unwrap();
//! ```
//!
//! # Modules
//!
//! - [`api`] - Status-code boundary over a handle table
//! - [`engine`] - Engine lifecycle, insert, search, persist and train
//! - [`config`] - Engine configuration and boundary codes
//! - [`registry`] - Generation-checked handle table
//! - [`executor`] - Worker pool, completions and in-flight tracking
//! - [`cache`] - Search-by-ID result cache
//! - [`train`] - Index tuning from a training corpus
//! - [`error`] - Error and status types

pub mod api;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod registry;
pub mod train;

pub use api::{Caiss, Query};
pub use config::{
    AlgorithmKind, EngineConfig, ManagementMode, MetricKind, RunMode, SearchCode, SearchType,
};
pub use engine::{EngineStats, Hit, IndexEngine, SearchOptions, SearchResponse};
pub use error::{Error, Result, Status};
pub use executor::Completion;
pub use registry::{Handle, HandleRegistry};
pub use train::{TrainOptions, TrainReport};

pub use caiss_vector::{
    CustomDistance, DistanceFn, DistanceMetric, ExternalId, HnswConfig, InsertMode, InsertOutcome,
    NeighborSelection,
};
