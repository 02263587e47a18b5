//! HNSW index implementation.
//!
//! [`HnswIndex`] owns a [`VectorStore`] and the [`HnswGraph`] over it. Inserts and
//! searches take `&self` and run concurrently: the only serialized step is allocating
//! the record/node pair, which keeps store and graph indices in lockstep. Linking a
//! new node into the graph happens outside that critical section under per-node locks.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::distance::{DistanceKernel, DistanceMetric};
use crate::error::{Result, VectorError};
use crate::ops::exact_knn;
use crate::store::{VectorRecord, VectorStore};
use crate::types::{Embedding, ExternalId};

use super::config::{HnswConfig, MAX_LEVEL_CAP};
use super::graph::{
    distance_to, greedy_closest, prune_neighbors, search_layer, select_neighbors, Candidate,
    GraphNode, HnswGraph, LayerQuery,
};

/// Random level generator for HNSW.
///
/// Generates node levels using an exponential distribution, as specified in the
/// HNSW paper, from a seedable xorshift64 stream.
#[derive(Debug)]
struct LevelGenerator {
    ml: f64,
    rng_state: u64,
}

impl LevelGenerator {
    #[allow(clippy::cast_possible_truncation)] // Intentional: nanos truncation is fine for seeding
    fn new(ml: f64, seed: Option<u64>) -> Self {
        let seed = seed.unwrap_or_else(|| {
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(12345)
        });
        // splitmix64 scramble so nearby seeds give unrelated streams; xorshift needs a non-zero state
        let mut z = seed.wrapping_add(0x9E37_79B9_7F4A_7C15);
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^= z >> 31;
        Self { ml, rng_state: if z == 0 { 0x2545_F491_4F6C_DD1D } else { z } }
    }

    /// Generate a random level for a new node.
    #[allow(clippy::cast_precision_loss)] // Intentional: precision loss is acceptable for RNG
    #[allow(clippy::cast_possible_truncation)] // Intentional: level is bounded by MAX_LEVEL_CAP
    #[allow(clippy::cast_sign_loss)] // Level is always non-negative after floor
    fn generate_level(&mut self) -> usize {
        let mut x = self.rng_state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.rng_state = x;

        // Uniform in (0, 1]; x is never zero
        let uniform = (x as f64) / (u64::MAX as f64);
        let level = (-uniform.ln() * self.ml).floor() as usize;
        level.min(MAX_LEVEL_CAP)
    }
}

/// What to do when inserting an external ID that is already live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertMode {
    /// Tombstone the old record and insert the new vector.
    #[default]
    Overwrite,
    /// Keep the old record and ignore the new vector.
    Discard,
}

/// Result of a successful insert call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// A new record was stored at this internal index.
    Inserted(u32),
    /// A new record replaced a live one under the same external ID.
    Replaced {
        /// Internal index of the new record.
        index: u32,
        /// Internal index of the tombstoned record.
        previous: u32,
    },
    /// The external ID was live and the insert was ignored.
    Discarded(u32),
}

impl InsertOutcome {
    /// Whether a record was written.
    #[must_use]
    pub const fn is_stored(&self) -> bool {
        !matches!(self, Self::Discarded(_))
    }
}

/// Result of a similarity search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// Internal index of the matching record.
    pub index: u32,
    /// External ID of the matching record.
    pub external_id: ExternalId,
    /// Distance to the query vector (smaller is closer for every metric).
    pub distance: f32,
}

/// Per-query search parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchParams {
    /// Number of results wanted.
    pub k: usize,
    /// Beam width; defaults to the index's `ef_search`, and is never below `k`.
    pub ef: Option<usize>,
    /// Return the best frontier found so far once this instant passes.
    pub deadline: Option<Instant>,
}

impl SearchParams {
    /// Search for the `k` nearest records with default beam width and no deadline.
    #[must_use]
    pub const fn new(k: usize) -> Self {
        Self { k, ef: None, deadline: None }
    }

    /// Override the beam width.
    #[must_use]
    pub const fn with_ef(mut self, ef: usize) -> Self {
        self.ef = Some(ef);
        self
    }

    /// Set a deadline.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Results of a graph search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOutcome {
    /// Results ascending by distance.
    pub results: Vec<SearchResult>,
    /// The deadline passed before the search converged.
    pub partial: bool,
}

/// HNSW (Hierarchical Navigable Small World) index.
///
/// Provides approximate nearest neighbor search with configurable
/// precision-performance tradeoffs, plus an exact scan over the same records.
#[derive(Debug)]
pub struct HnswIndex {
    config: HnswConfig,
    kernel: DistanceKernel,
    store: VectorStore,
    graph: HnswGraph,
    level_gen: Mutex<LevelGenerator>,
    /// Serializes ID lookup, record append and node append.
    alloc: Mutex<()>,
}

impl HnswIndex {
    /// Create a new empty HNSW index.
    ///
    /// # Errors
    ///
    /// Returns [`VectorError::InvalidDimension`] for a zero dimension and
    /// [`VectorError::InvalidConfig`] if `config` fails validation.
    pub fn new(dimension: usize, metric: DistanceMetric, config: HnswConfig) -> Result<Self> {
        Self::from_parts(dimension, metric, config, VectorStore::new(dimension), HnswGraph::new())
    }

    pub(crate) fn from_parts(
        dimension: usize,
        metric: DistanceMetric,
        config: HnswConfig,
        store: VectorStore,
        graph: HnswGraph,
    ) -> Result<Self> {
        if dimension == 0 {
            return Err(VectorError::InvalidDimension { expected: 1, actual: 0 });
        }
        config.validate()?;

        // Restored indexes continue the level stream from a different point
        let seed = config.seed.map(|s| s ^ (store.len() as u64).rotate_left(32));
        Ok(Self {
            kernel: DistanceKernel::new(metric, dimension),
            level_gen: Mutex::new(LevelGenerator::new(config.ml, seed)),
            alloc: Mutex::new(()),
            config,
            store,
            graph,
        })
    }

    /// Limit the total number of records, live and tombstoned.
    #[must_use]
    pub fn with_capacity_limit(mut self, capacity: Option<usize>) -> Self {
        self.store = self.store.with_capacity_limit(capacity);
        self
    }

    /// The index configuration.
    #[must_use]
    pub fn config(&self) -> &HnswConfig {
        &self.config
    }

    /// The bound distance kernel.
    #[must_use]
    pub fn kernel(&self) -> &DistanceKernel {
        &self.kernel
    }

    /// The distance metric.
    #[must_use]
    pub fn metric(&self) -> DistanceMetric {
        self.kernel.metric()
    }

    /// Vector dimensionality.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.kernel.dimension()
    }

    /// The underlying record store.
    #[must_use]
    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    /// The underlying graph.
    #[must_use]
    pub fn graph(&self) -> &HnswGraph {
        &self.graph
    }

    /// Number of live records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.live_len()
    }

    /// Whether there are no live records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `external_id` is bound to a live record.
    #[must_use]
    pub fn contains(&self, external_id: &ExternalId) -> bool {
        self.store.index_of(external_id).is_some()
    }

    /// The live record bound to `external_id`.
    ///
    /// # Errors
    ///
    /// Returns [`VectorError::NotFound`] if the ID is unknown or removed.
    pub fn record_of(&self, external_id: &ExternalId) -> Result<Arc<VectorRecord>> {
        let index = self
            .store
            .index_of(external_id)
            .ok_or_else(|| VectorError::not_found(format!("external id {external_id}")))?;
        self.store.get(index)
    }

    fn check_dimension(&self, len: usize) -> Result<()> {
        if len == self.dimension() {
            Ok(())
        } else {
            Err(VectorError::DimensionMismatch { expected: self.dimension(), actual: len })
        }
    }

    /// Insert a vector under `external_id` and link it into the graph.
    ///
    /// Nothing is modified when the dimension check or the capacity check fails.
    ///
    /// # Errors
    ///
    /// Returns [`VectorError::DimensionMismatch`] for a wrong-length vector and
    /// [`VectorError::ResourceExhausted`] when the store is full.
    pub fn insert(
        &self,
        external_id: ExternalId,
        embedding: Embedding,
        mode: InsertMode,
    ) -> Result<InsertOutcome> {
        self.check_dimension(embedding.dimension())?;

        let (index, level, outcome) = {
            let _alloc = self.alloc.lock();

            let existing = self.store.index_of(&external_id);
            if let (Some(previous), InsertMode::Discard) = (existing, mode) {
                return Ok(InsertOutcome::Discarded(previous));
            }

            let (index, record) = self.store.append_shared(external_id, embedding)?;
            let level = self.level_gen.lock().generate_level().min(self.graph.max_layer() + 1);
            let node_index = self.graph.push(GraphNode::new(record, level));
            debug_assert_eq!(node_index, index, "store and graph out of step");

            // A concurrent remove may already have tombstoned the previous record
            let outcome = match existing {
                Some(previous) if self.store.tombstone(previous).is_ok() => {
                    InsertOutcome::Replaced { index, previous }
                }
                _ => InsertOutcome::Inserted(index),
            };
            (index, level, outcome)
        };

        self.link(index, level);
        Ok(outcome)
    }

    /// Connect node `index` at layers `0..=level`.
    fn link(&self, index: u32, level: usize) {
        let graph = &self.graph;
        let kernel = &self.kernel;
        let Some(node) = graph.node(index) else { return };
        let query = node.vector();

        let (entry, top) = match graph.entry_point() {
            Some(entry) => entry,
            None => {
                if graph.try_init_entry_point(index, level) {
                    return;
                }
                // Another insert claimed the empty graph first
                match graph.entry_point() {
                    Some(entry) => entry,
                    None => return,
                }
            }
        };

        let start = distance_to(graph, kernel, query, entry).unwrap_or(f32::INFINITY);
        let mut current = Candidate::new(entry, start);
        for layer in (level + 1..=top).rev() {
            current = greedy_closest(graph, kernel, query, current, layer);
        }

        let mut entry_points = vec![current];
        for layer in (0..=level.min(top)).rev() {
            let params = LayerQuery {
                ef: self.config.ef_construction,
                layer,
                skip_tombstoned: false,
                deadline: None,
            };
            let found: Vec<Candidate> = search_layer(graph, kernel, query, &entry_points, &params)
                .candidates
                .into_iter()
                .filter(|c| c.index != index)
                .collect();

            let neighbors = select_neighbors(graph, kernel, &found, self.config.m, self.config.selection);
            let max_conn = self.config.max_connections(layer);

            // Merge with any back-edges concurrent inserts already added
            node.update_neighbors(layer, |list| {
                for &n in &neighbors {
                    if !list.contains(&n) {
                        list.push(n);
                    }
                }
                if list.len() > max_conn {
                    prune_neighbors(graph, kernel, query, list, max_conn);
                }
            });

            for &neighbor_index in &neighbors {
                let Some(neighbor) = graph.node(neighbor_index) else { continue };
                neighbor.update_neighbors(layer, |list| {
                    if list.contains(&index) {
                        return;
                    }
                    list.push(index);
                    if list.len() > max_conn {
                        prune_neighbors(graph, kernel, neighbor.vector(), list, max_conn);
                    }
                });
            }

            if !found.is_empty() {
                entry_points = found;
            }
        }

        if level > top {
            graph.promote_entry_point(index, level);
        }
    }

    /// Approximate k-NN search through the graph.
    ///
    /// Tombstoned records are traversed but never returned.
    ///
    /// # Errors
    ///
    /// Returns [`VectorError::DimensionMismatch`] for a wrong-length query.
    pub fn search(&self, query: &[f32], params: &SearchParams) -> Result<SearchOutcome> {
        self.check_dimension(query.len())?;
        if params.k == 0 {
            return Ok(SearchOutcome::default());
        }
        let Some((entry, top)) = self.graph.entry_point() else {
            return Ok(SearchOutcome::default());
        };

        let graph = &self.graph;
        let kernel = &self.kernel;
        let start = distance_to(graph, kernel, query, entry).unwrap_or(f32::INFINITY);
        let mut current = Candidate::new(entry, start);
        for layer in (1..=top).rev() {
            current = greedy_closest(graph, kernel, query, current, layer);
        }

        let layer0 = LayerQuery {
            ef: params.ef.unwrap_or(self.config.ef_search).max(params.k),
            layer: 0,
            skip_tombstoned: true,
            deadline: params.deadline,
        };
        let found = search_layer(graph, kernel, query, &[current], &layer0);
        if found.expired {
            debug!(k = params.k, found = found.candidates.len(), "search deadline expired");
        }

        let results = self.resolve(found.candidates.into_iter().take(params.k));
        Ok(SearchOutcome { results, partial: found.expired })
    }

    /// Exact k-NN by scanning every live record.
    ///
    /// # Errors
    ///
    /// Returns [`VectorError::DimensionMismatch`] for a wrong-length query.
    pub fn exact_search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        self.check_dimension(query.len())?;
        let found = exact_knn(&self.store.snapshot(), &self.kernel, query, k);
        Ok(self.resolve(found.into_iter()))
    }

    fn resolve(&self, candidates: impl Iterator<Item = Candidate>) -> Vec<SearchResult> {
        candidates
            .filter_map(|c| {
                self.store.get(c.index).ok().map(|record| SearchResult {
                    index: c.index,
                    external_id: record.external_id().clone(),
                    distance: c.distance,
                })
            })
            .collect()
    }

    /// Tombstone the live record bound to `external_id`.
    ///
    /// The node stays in the graph as a bridge; it is only excluded from results.
    ///
    /// # Errors
    ///
    /// Returns [`VectorError::NotFound`] if the ID is unknown or already removed.
    pub fn remove(&self, external_id: &ExternalId) -> Result<u32> {
        let index = self
            .store
            .index_of(external_id)
            .ok_or_else(|| VectorError::not_found(format!("external id {external_id}")))?;
        self.store.tombstone(index)?;
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::config::NeighborSelection;

    fn emb(values: Vec<f32>) -> Embedding {
        Embedding::new(values).unwrap()
    }

    /// Deterministic pseudo-random vectors without pulling an RNG into unit tests.
    fn corpus(n: usize, dim: usize) -> Vec<Vec<f32>> {
        let mut state = 0x1234_5678_9ABC_DEF0u64;
        (0..n)
            .map(|_| {
                (0..dim)
                    .map(|_| {
                        state ^= state << 13;
                        state ^= state >> 7;
                        state ^= state << 17;
                        (state >> 40) as f32 / (1u64 << 24) as f32 - 0.5
                    })
                    .collect()
            })
            .collect()
    }

    fn build(vectors: &[Vec<f32>], config: HnswConfig) -> HnswIndex {
        let index = HnswIndex::new(vectors[0].len(), DistanceMetric::Euclidean, config).unwrap();
        for (i, v) in vectors.iter().enumerate() {
            index.insert((i as u64).into(), emb(v.clone()), InsertMode::Overwrite).unwrap();
        }
        index
    }

    #[test]
    fn test_create_index() {
        let index = HnswIndex::new(4, DistanceMetric::Cosine, HnswConfig::default()).unwrap();
        assert!(index.is_empty());
        assert_eq!(index.dimension(), 4);
        assert_eq!(index.metric(), DistanceMetric::Cosine);
        assert!(HnswIndex::new(0, DistanceMetric::Cosine, HnswConfig::default()).is_err());
    }

    #[test]
    fn test_search_empty() {
        let index = HnswIndex::new(2, DistanceMetric::Euclidean, HnswConfig::default()).unwrap();
        let outcome = index.search(&[0.0, 0.0], &SearchParams::new(3)).unwrap();
        assert!(outcome.results.is_empty());
        assert!(!outcome.partial);
    }

    #[test]
    fn test_search_nearest() {
        let index = HnswIndex::new(2, DistanceMetric::Euclidean, HnswConfig::new(4).with_seed(1)).unwrap();
        for (i, x) in [0.0f32, 10.0, 20.0, 30.0, 40.0].iter().enumerate() {
            index.insert((i as u64).into(), emb(vec![*x, 0.0]), InsertMode::Overwrite).unwrap();
        }
        let outcome = index.search(&[21.0, 0.0], &SearchParams::new(2)).unwrap();
        let ids: Vec<ExternalId> = outcome.results.iter().map(|r| r.external_id.clone()).collect();
        assert_eq!(ids, vec![ExternalId::Int(2), ExternalId::Int(3)]);
        assert!((outcome.results[0].distance - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_custom_metric_drives_search() {
        // Only the second component counts
        fn second_axis(a: &[f32], b: &[f32]) -> f32 {
            (a[1] - b[1]).abs()
        }
        let index =
            HnswIndex::new(2, DistanceMetric::custom(second_axis), HnswConfig::new(4).with_seed(3)).unwrap();
        for (i, (x, y)) in [(0.0f32, 9.0f32), (100.0, 1.0), (5.0, 5.0)].iter().enumerate() {
            index.insert((i as u64).into(), emb(vec![*x, *y]), InsertMode::Overwrite).unwrap();
        }
        let outcome = index.search(&[0.0, 0.0], &SearchParams::new(1)).unwrap();
        assert_eq!(outcome.results[0].external_id, ExternalId::Int(1));
        assert_eq!(index.exact_search(&[0.0, 0.0], 3).unwrap()[2].external_id, ExternalId::Int(0));
    }

    #[test]
    fn test_dimension_mismatch_leaves_index_unchanged() {
        let index = HnswIndex::new(3, DistanceMetric::Euclidean, HnswConfig::default()).unwrap();
        index.insert(1u64.into(), emb(vec![1.0, 2.0, 3.0]), InsertMode::Overwrite).unwrap();

        let err = index.insert(2u64.into(), emb(vec![1.0, 2.0]), InsertMode::Overwrite).unwrap_err();
        assert!(matches!(err, VectorError::DimensionMismatch { expected: 3, actual: 2 }));
        assert_eq!(index.store().len(), 1);
        assert_eq!(index.graph().len(), 1);

        let err = index.search(&[1.0], &SearchParams::new(1)).unwrap_err();
        assert!(matches!(err, VectorError::DimensionMismatch { expected: 3, actual: 1 }));
        assert!(index.exact_search(&[1.0], 1).is_err());
    }

    #[test]
    fn test_overwrite_and_discard() {
        let index = HnswIndex::new(1, DistanceMetric::Euclidean, HnswConfig::default()).unwrap();
        let first = index.insert("w".into(), emb(vec![1.0]), InsertMode::Overwrite).unwrap();
        assert_eq!(first, InsertOutcome::Inserted(0));

        let discarded = index.insert("w".into(), emb(vec![5.0]), InsertMode::Discard).unwrap();
        assert_eq!(discarded, InsertOutcome::Discarded(0));
        assert!(!discarded.is_stored());
        assert_eq!(index.record_of(&"w".into()).unwrap().vector(), &[1.0]);

        let replaced = index.insert("w".into(), emb(vec![5.0]), InsertMode::Overwrite).unwrap();
        assert_eq!(replaced, InsertOutcome::Replaced { index: 1, previous: 0 });
        assert_eq!(index.record_of(&"w".into()).unwrap().vector(), &[5.0]);
        assert_eq!(index.len(), 1);

        let results = index.search(&[1.0], &SearchParams::new(5)).unwrap().results;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].index, 1);
    }

    #[test]
    fn test_remove_excludes_from_results() {
        let vectors = corpus(200, 8);
        let index = build(&vectors, HnswConfig::new(8).with_seed(3));

        index.remove(&ExternalId::Int(17)).unwrap();
        assert!(!index.contains(&ExternalId::Int(17)));
        assert!(matches!(index.remove(&ExternalId::Int(17)), Err(VectorError::NotFound(_))));

        let approx = index.search(&vectors[17], &SearchParams::new(10).with_ef(64)).unwrap();
        assert!(approx.results.iter().all(|r| r.external_id != ExternalId::Int(17)));
        let exact = index.exact_search(&vectors[17], 10).unwrap();
        assert!(exact.iter().all(|r| r.external_id != ExternalId::Int(17)));
    }

    #[test]
    fn test_same_seed_same_graph() {
        let vectors = corpus(300, 12);
        let a = build(&vectors, HnswConfig::new(6).with_seed(42));
        let b = build(&vectors, HnswConfig::new(6).with_seed(42));

        assert_eq!(a.graph().entry_point(), b.graph().entry_point());
        for (na, nb) in a.graph().nodes().iter().zip(b.graph().nodes().iter()) {
            assert_eq!(na.level(), nb.level());
            for layer in 0..=na.level() {
                assert_eq!(na.neighbors(layer), nb.neighbors(layer));
            }
        }
    }

    #[test]
    fn test_neighbor_lists_respect_bounds() {
        let vectors = corpus(400, 6);
        let config = HnswConfig::new(5).with_seed(9);
        let index = build(&vectors, config.clone());
        for node in index.graph().nodes() {
            for layer in 0..=node.level() {
                let neighbors = node.neighbors(layer);
                assert!(neighbors.len() <= config.max_connections(layer));
                assert!(neighbors.iter().all(|&n| (n as usize) < vectors.len()));
            }
        }
        let (entry, top) = index.graph().entry_point().unwrap();
        assert_eq!(index.graph().node(entry).unwrap().level(), top);
        assert!(index.graph().nodes().iter().all(|n| n.level() <= top));
    }

    #[test]
    fn test_exact_search_matches_brute_force_order() {
        let vectors = corpus(50, 4);
        let index = build(&vectors, HnswConfig::default().with_seed(5));
        let exact = index.exact_search(&vectors[0], 3).unwrap();
        assert_eq!(exact[0].external_id, ExternalId::Int(0));
        assert!(exact.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[test]
    fn test_diverse_selection_finds_self() {
        let vectors = corpus(300, 16);
        let config = HnswConfig::new(8).with_seed(11).with_selection(NeighborSelection::Diverse);
        let index = build(&vectors, config);
        for i in [0usize, 99, 250] {
            let results = index.search(&vectors[i], &SearchParams::new(1).with_ef(50)).unwrap().results;
            assert_eq!(results[0].external_id, ExternalId::Int(i as u64));
        }
    }

    #[test]
    fn test_expired_deadline_returns_partial() {
        let vectors = corpus(100, 4);
        let index = build(&vectors, HnswConfig::default().with_seed(2));
        let params = SearchParams::new(10).with_deadline(Instant::now());
        let outcome = index.search(&vectors[3], &params).unwrap();
        assert!(outcome.partial);
        assert!(outcome.results.len() <= 10);
    }

    #[test]
    fn test_capacity_limit() {
        let index = HnswIndex::new(1, DistanceMetric::Euclidean, HnswConfig::default())
            .unwrap()
            .with_capacity_limit(Some(2));
        index.insert(1u64.into(), emb(vec![1.0]), InsertMode::Overwrite).unwrap();
        index.insert(2u64.into(), emb(vec![2.0]), InsertMode::Overwrite).unwrap();
        let err = index.insert(3u64.into(), emb(vec![3.0]), InsertMode::Overwrite).unwrap_err();
        assert!(matches!(err, VectorError::ResourceExhausted(_)));
        assert_eq!(index.graph().len(), 2);
    }

    #[test]
    fn test_level_generator_is_seeded() {
        let mut a = LevelGenerator::new(1.0 / 16f64.ln(), Some(7));
        let mut b = LevelGenerator::new(1.0 / 16f64.ln(), Some(7));
        let la: Vec<usize> = (0..100).map(|_| a.generate_level()).collect();
        let lb: Vec<usize> = (0..100).map(|_| b.generate_level()).collect();
        assert_eq!(la, lb);
        assert!(la.iter().all(|&l| l <= MAX_LEVEL_CAP));
        assert!(la.iter().filter(|&&l| l == 0).count() > 80);
    }
}
