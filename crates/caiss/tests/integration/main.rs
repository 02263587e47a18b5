//! Integration tests for caiss.
//!
//! These drive engines through the status-code boundary the way client glue
//! does: raw handles, integer codes and `Status` results.

mod boundary;
mod concurrency;
mod end_to_end;
mod lifecycle;
mod persistence;

use caiss::{Caiss, EngineConfig, ExternalId, HnswConfig, Status};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Run mode code for the in-process engine.
pub const PROCESS: u32 = 0;
/// Metric codes.
pub const INNER_PRODUCT: u32 = 0;
pub const EUCLIDEAN: u32 = 1;
/// Search codes.
pub const APPROX: u32 = 0;
pub const APPROX_BY_ID: u32 = 1;
pub const EXACT: u32 = 2;

/// A seeded engine configuration so graphs are reproducible.
pub fn seeded_config() -> EngineConfig {
    EngineConfig::default().with_hnsw(HnswConfig::new(8).with_ef_construction(100).with_seed(7))
}

/// Create and initialize a handle, panicking on failure.
pub fn open(caiss: &Caiss, config: EngineConfig, metric: u32, dimension: u32) -> u64 {
    let (status, handle) = caiss.create_handle(config);
    assert_eq!(status, Status::Ok);
    assert_eq!(caiss.init(handle, PROCESS, metric, dimension, None), Status::Ok);
    handle
}

/// `n` random vectors of `dimension` components in [-1, 1).
pub fn random_vectors(n: usize, dimension: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| (0..dimension).map(|_| rng.gen_range(-1.0..1.0)).collect()).collect()
}

/// Insert `vectors` one by one under IDs `0..n`.
pub fn fill(caiss: &Caiss, handle: u64, vectors: &[Vec<f32>]) {
    for (i, v) in vectors.iter().enumerate() {
        assert_eq!(caiss.insert(handle, v, ExternalId::Int(i as u64)), Status::Ok);
    }
}
