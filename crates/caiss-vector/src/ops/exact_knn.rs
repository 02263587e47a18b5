//! Exact k-nearest-neighbor scan.
//!
//! Computes the distance to every live record and keeps the K nearest. Used as the
//! recall baseline for the graph and for small corpora.
//!
//! # Complexity
//!
//! O(n * d) where n is the number of records and d the dimension.

use std::collections::BinaryHeap;
use std::sync::Arc;

use crate::distance::DistanceKernel;
use crate::index::graph::{by_distance, Candidate, MaxCandidate};
use crate::store::VectorRecord;

/// The `k` live records nearest to `query`, ascending by distance (ties to lower index).
///
/// `records` must be in internal-index order, as returned by
/// [`VectorStore::snapshot`](crate::store::VectorStore::snapshot); the position of a
/// record is its internal index.
#[must_use]
pub fn exact_knn(
    records: &[Arc<VectorRecord>],
    kernel: &DistanceKernel,
    query: &[f32],
    k: usize,
) -> Vec<Candidate> {
    if k == 0 {
        return Vec::new();
    }

    let mut heap: BinaryHeap<MaxCandidate> = BinaryHeap::with_capacity(k.saturating_add(1).min(1024));
    for (position, record) in records.iter().enumerate() {
        if record.is_tombstoned() {
            continue;
        }
        let Ok(index) = u32::try_from(position) else { break };
        let candidate = Candidate::new(index, kernel.raw(query, record.vector()));

        if heap.len() < k {
            heap.push(MaxCandidate(candidate));
        } else if heap.peek().is_some_and(|worst| by_distance(&candidate, &worst.0).is_lt()) {
            heap.pop();
            heap.push(MaxCandidate(candidate));
        }
    }

    let mut results: Vec<Candidate> = heap.into_iter().map(|e| e.0).collect();
    results.sort_by(by_distance);
    results
}
