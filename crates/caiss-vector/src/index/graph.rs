//! HNSW graph data structure.
//!
//! The graph is a multi-layer structure where each node has a neighbor list per layer
//! it belongs to. Every neighbor list sits behind its own lock, so searches and inserts
//! touching different nodes never contend. The entry point and top layer are packed
//! into one atomic word and published with compare-and-swap.
//!
//! Lock discipline: at most one neighbor-list lock is held at a time, and the node
//! directory lock is only ever held briefly (lookup or append), never while waiting on
//! a neighbor list.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;

use crate::distance::DistanceKernel;
use crate::index::config::NeighborSelection;
use crate::store::VectorRecord;

/// How many expansions run between deadline checks.
const DEADLINE_CHECK_INTERVAL: usize = 32;

/// A node in the HNSW graph.
#[derive(Debug)]
pub struct GraphNode {
    record: Arc<VectorRecord>,
    level: usize,
    /// `layers[l]` = neighbor indices at layer `l`.
    layers: Box<[RwLock<Vec<u32>>]>,
}

impl GraphNode {
    /// Create a node present in layers `0..=level` with no connections yet.
    #[must_use]
    pub fn new(record: Arc<VectorRecord>, level: usize) -> Self {
        let layers = (0..=level).map(|_| RwLock::new(Vec::new())).collect();
        Self { record, level, layers }
    }

    /// The highest layer this node belongs to.
    #[inline]
    #[must_use]
    pub const fn level(&self) -> usize {
        self.level
    }

    /// The stored record this node indexes.
    #[inline]
    #[must_use]
    pub fn record(&self) -> &Arc<VectorRecord> {
        &self.record
    }

    /// The node's vector.
    #[inline]
    #[must_use]
    pub fn vector(&self) -> &[f32] {
        self.record.vector()
    }

    /// Whether the underlying record has been removed.
    #[inline]
    #[must_use]
    pub fn is_tombstoned(&self) -> bool {
        self.record.is_tombstoned()
    }

    /// Snapshot of the neighbor list at `layer`; empty above the node's level.
    #[must_use]
    pub fn neighbors(&self, layer: usize) -> Vec<u32> {
        self.layers.get(layer).map(|l| l.read().clone()).unwrap_or_default()
    }

    /// Replace the neighbor list at `layer`. Ignored above the node's level.
    pub fn set_neighbors(&self, layer: usize, neighbors: Vec<u32>) {
        if let Some(l) = self.layers.get(layer) {
            *l.write() = neighbors;
        }
    }

    /// Mutate the neighbor list at `layer` under its write lock.
    pub(crate) fn update_neighbors<R>(
        &self,
        layer: usize,
        f: impl FnOnce(&mut Vec<u32>) -> R,
    ) -> Option<R> {
        self.layers.get(layer).map(|l| f(&mut l.write()))
    }
}

/// Entry point and top layer packed into one atomic word.
///
/// Bit 63 marks presence, bits 32..40 hold the layer, bits 0..32 the node index.
#[derive(Debug, Default)]
struct EntryPoint(AtomicU64);

const PRESENT_BIT: u64 = 1 << 63;
const LEVEL_SHIFT: u32 = 32;
const LEVEL_MASK: u64 = 0xFF;

impl EntryPoint {
    fn pack(index: u32, level: usize) -> u64 {
        PRESENT_BIT | (((level as u64) & LEVEL_MASK) << LEVEL_SHIFT) | u64::from(index)
    }

    #[allow(clippy::cast_possible_truncation)] // masked to the packed field widths
    fn unpack(word: u64) -> Option<(u32, usize)> {
        if word & PRESENT_BIT == 0 {
            return None;
        }
        Some((word as u32, ((word >> LEVEL_SHIFT) & LEVEL_MASK) as usize))
    }

    fn load(&self) -> Option<(u32, usize)> {
        Self::unpack(self.0.load(AtomicOrdering::Acquire))
    }

    fn store(&self, entry: Option<(u32, usize)>) {
        let word = entry.map_or(0, |(index, level)| Self::pack(index, level));
        self.0.store(word, AtomicOrdering::Release);
    }

    /// Claim the entry point of an empty graph. Returns `false` if one already exists.
    fn try_init(&self, index: u32, level: usize) -> bool {
        self.0
            .compare_exchange(0, Self::pack(index, level), AtomicOrdering::AcqRel, AtomicOrdering::Acquire)
            .is_ok()
    }

    /// Make `index` the entry point if `level` is strictly above the current top layer.
    fn promote(&self, index: u32, level: usize) {
        let new = Self::pack(index, level);
        let mut current = self.0.load(AtomicOrdering::Acquire);
        loop {
            if let Some((_, top)) = Self::unpack(current) {
                if top >= level {
                    return;
                }
            }
            match self.0.compare_exchange_weak(current, new, AtomicOrdering::AcqRel, AtomicOrdering::Acquire) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }
}

/// The HNSW graph structure.
///
/// Node `i` indexes record `i` of the vector store; the two grow in lockstep.
#[derive(Debug, Default)]
pub struct HnswGraph {
    nodes: RwLock<Vec<Arc<GraphNode>>>,
    entry: EntryPoint,
}

impl HnswGraph {
    /// Create a new empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node, returning its index.
    pub(crate) fn push(&self, node: GraphNode) -> u32 {
        let mut nodes = self.nodes.write();
        #[allow(clippy::cast_possible_truncation)] // bounded by the store's u32 index space
        let index = nodes.len() as u32;
        nodes.push(Arc::new(node));
        index
    }

    /// Get a node by index.
    #[inline]
    #[must_use]
    pub fn node(&self, index: u32) -> Option<Arc<GraphNode>> {
        self.nodes.read().get(index as usize).cloned()
    }

    /// Snapshot of the neighbor list of `index` at `layer`.
    #[must_use]
    pub fn neighbors(&self, index: u32, layer: usize) -> Option<Vec<u32>> {
        self.node(index).map(|n| n.neighbors(layer))
    }

    /// Snapshot of every node in index order.
    #[must_use]
    pub fn nodes(&self) -> Vec<Arc<GraphNode>> {
        self.nodes.read().clone()
    }

    /// Number of nodes, tombstoned included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    /// Whether the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current entry point and its layer.
    #[must_use]
    pub fn entry_point(&self) -> Option<(u32, usize)> {
        self.entry.load()
    }

    /// Highest populated layer (0 for an empty graph).
    #[must_use]
    pub fn max_layer(&self) -> usize {
        self.entry.load().map_or(0, |(_, level)| level)
    }

    pub(crate) fn set_entry_point(&self, entry: Option<(u32, usize)>) {
        self.entry.store(entry);
    }

    pub(crate) fn try_init_entry_point(&self, index: u32, level: usize) -> bool {
        self.entry.try_init(index, level)
    }

    pub(crate) fn promote_entry_point(&self, index: u32, level: usize) {
        self.entry.promote(index, level);
    }
}

/// A candidate during HNSW search.
///
/// Orders as a min-heap entry: the closest candidate is the greatest. Equal distances
/// fall back to the node index so that every ordering is total and deterministic.
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    /// Node index.
    pub index: u32,
    /// Distance to the query.
    pub distance: f32,
}

impl Candidate {
    /// Create a new candidate.
    #[inline]
    #[must_use]
    pub const fn new(index: u32, distance: f32) -> Self {
        Self { index, distance }
    }
}

/// Ascending by distance, then by lower index.
#[inline]
pub(crate) fn by_distance(a: &Candidate, b: &Candidate) -> Ordering {
    a.distance.total_cmp(&b.distance).then(a.index.cmp(&b.index))
}

impl PartialEq for Candidate {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        by_distance(self, other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap
        by_distance(other, self)
    }
}

/// A max-heap candidate for tracking the worst element in the result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxCandidate(pub Candidate);

impl PartialOrd for MaxCandidate {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MaxCandidate {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        by_distance(&self.0, &other.0)
    }
}

/// Parameters for one [`search_layer`] pass.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LayerQuery {
    pub ef: usize,
    pub layer: usize,
    /// Keep tombstoned nodes out of the result frontier (they are still expanded).
    pub skip_tombstoned: bool,
    pub deadline: Option<Instant>,
}

/// Outcome of a [`search_layer`] pass.
#[derive(Debug)]
pub(crate) struct LayerResult {
    /// Frontier, ascending by distance.
    pub candidates: Vec<Candidate>,
    /// The deadline passed before the frontier converged.
    pub expired: bool,
}

/// Distance from `query` to node `index`, or `None` for a dangling index.
#[inline]
pub(crate) fn distance_to(
    graph: &HnswGraph,
    kernel: &DistanceKernel,
    query: &[f32],
    index: u32,
) -> Option<f32> {
    graph.node(index).map(|node| kernel.raw(query, node.vector()))
}

/// Single-point greedy descent within one layer.
///
/// Moves to the neighbor closest to `query` until no neighbor is closer.
pub(crate) fn greedy_closest(
    graph: &HnswGraph,
    kernel: &DistanceKernel,
    query: &[f32],
    start: Candidate,
    layer: usize,
) -> Candidate {
    let mut current = start;
    loop {
        let Some(node) = graph.node(current.index) else {
            return current;
        };
        let mut improved = false;
        for neighbor in node.neighbors(layer) {
            if let Some(distance) = distance_to(graph, kernel, query, neighbor) {
                let candidate = Candidate::new(neighbor, distance);
                if by_distance(&candidate, &current) == Ordering::Less {
                    current = candidate;
                    improved = true;
                }
            }
        }
        if !improved {
            return current;
        }
    }
}

/// Best-first search of one layer with a frontier of at most `ef` results.
///
/// Dangling neighbor indices are skipped. When the deadline passes the frontier found
/// so far is returned with `expired` set.
pub(crate) fn search_layer(
    graph: &HnswGraph,
    kernel: &DistanceKernel,
    query: &[f32],
    entry_points: &[Candidate],
    params: &LayerQuery,
) -> LayerResult {
    let ef = params.ef.max(1);
    let mut candidates: BinaryHeap<Candidate> = BinaryHeap::new();
    let mut results: BinaryHeap<MaxCandidate> = BinaryHeap::new();
    let mut visited: HashSet<u32> = HashSet::new();

    for &ep in entry_points {
        if !visited.insert(ep.index) {
            continue;
        }
        let Some(node) = graph.node(ep.index) else { continue };
        candidates.push(ep);
        if !(params.skip_tombstoned && node.is_tombstoned()) {
            results.push(MaxCandidate(ep));
            if results.len() > ef {
                results.pop();
            }
        }
    }

    let mut expired = false;
    let mut expansions = 0usize;

    while let Some(current) = candidates.pop() {
        if results.len() >= ef {
            if let Some(worst) = results.peek() {
                // The closest candidate is further than the furthest result
                if current.distance > worst.0.distance {
                    break;
                }
            }
        }

        if let Some(deadline) = params.deadline {
            if expansions % DEADLINE_CHECK_INTERVAL == 0 && Instant::now() >= deadline {
                expired = true;
                break;
            }
        }
        expansions += 1;

        let Some(node) = graph.node(current.index) else { continue };
        for neighbor_index in node.neighbors(params.layer) {
            if !visited.insert(neighbor_index) {
                continue;
            }
            let Some(neighbor) = graph.node(neighbor_index) else { continue };

            let candidate = Candidate::new(neighbor_index, kernel.raw(query, neighbor.vector()));
            let admit = results.len() < ef
                || results.peek().is_some_and(|w| by_distance(&candidate, &w.0) == Ordering::Less);
            if !admit {
                continue;
            }

            candidates.push(candidate);
            if !(params.skip_tombstoned && neighbor.is_tombstoned()) {
                results.push(MaxCandidate(candidate));
                if results.len() > ef {
                    results.pop();
                }
            }
        }
    }

    let mut found: Vec<Candidate> = results.into_iter().map(|mc| mc.0).collect();
    found.sort_by(by_distance);
    LayerResult { candidates: found, expired }
}

/// Choose up to `m` neighbors from `candidates` (ascending by distance to the new node).
pub(crate) fn select_neighbors(
    graph: &HnswGraph,
    kernel: &DistanceKernel,
    candidates: &[Candidate],
    m: usize,
    selection: NeighborSelection,
) -> Vec<u32> {
    match selection {
        NeighborSelection::Nearest => select_neighbors_simple(candidates, m),
        NeighborSelection::Diverse => select_neighbors_heuristic(graph, kernel, candidates, m),
    }
}

/// Keep the `m` closest candidates.
pub(crate) fn select_neighbors_simple(candidates: &[Candidate], m: usize) -> Vec<u32> {
    candidates.iter().take(m).map(|c| c.index).collect()
}

/// Diversity heuristic: a candidate is kept only if it is closer to the new node than
/// to any neighbor already kept. Rejected candidates top up the list if fewer than `m`
/// survive.
pub(crate) fn select_neighbors_heuristic(
    graph: &HnswGraph,
    kernel: &DistanceKernel,
    candidates: &[Candidate],
    m: usize,
) -> Vec<u32> {
    if candidates.len() <= m {
        return select_neighbors_simple(candidates, m);
    }

    let mut selected: Vec<(u32, Arc<GraphNode>)> = Vec::with_capacity(m);
    let mut rejected: Vec<u32> = Vec::new();

    for candidate in candidates {
        if selected.len() >= m {
            break;
        }
        let Some(node) = graph.node(candidate.index) else { continue };

        let diverse = selected
            .iter()
            .all(|(_, kept)| kernel.raw(node.vector(), kept.vector()) >= candidate.distance);
        if diverse || selected.is_empty() {
            selected.push((candidate.index, node));
        } else {
            rejected.push(candidate.index);
        }
    }

    let mut result: Vec<u32> = selected.into_iter().map(|(index, _)| index).collect();
    let missing = m.saturating_sub(result.len());
    result.extend(rejected.into_iter().take(missing));
    result
}

/// Sort `neighbors` by distance to `base` (ties to the lower index) and keep `max`.
/// Dangling indices are dropped.
pub(crate) fn prune_neighbors(
    graph: &HnswGraph,
    kernel: &DistanceKernel,
    base: &[f32],
    neighbors: &mut Vec<u32>,
    max: usize,
) {
    let mut scored: Vec<Candidate> = neighbors
        .iter()
        .filter_map(|&n| distance_to(graph, kernel, base, n).map(|d| Candidate::new(n, d)))
        .collect();
    scored.sort_by(by_distance);
    scored.truncate(max);
    *neighbors = scored.into_iter().map(|c| c.index).collect();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::DistanceMetric;
    use crate::store::VectorStore;
    use crate::types::Embedding;

    /// Nodes on a line at positions `xs`, each linked to its immediate neighbors at layer 0.
    fn line_graph(xs: &[f32]) -> (VectorStore, HnswGraph) {
        let store = VectorStore::new(1);
        let graph = HnswGraph::new();
        for (i, &x) in xs.iter().enumerate() {
            let idx = store.append((i as u64).into(), Embedding::new(vec![x]).unwrap()).unwrap();
            graph.push(GraphNode::new(store.get(idx).unwrap(), 0));
        }
        for i in 0..xs.len() as u32 {
            let mut links = Vec::new();
            if i > 0 {
                links.push(i - 1);
            }
            if (i as usize) + 1 < xs.len() {
                links.push(i + 1);
            }
            graph.node(i).unwrap().set_neighbors(0, links);
        }
        graph.set_entry_point(Some((0, 0)));
        (store, graph)
    }

    fn kernel() -> DistanceKernel {
        DistanceKernel::new(DistanceMetric::Euclidean, 1)
    }

    fn layer0(ef: usize, skip_tombstoned: bool) -> LayerQuery {
        LayerQuery { ef, layer: 0, skip_tombstoned, deadline: None }
    }

    #[test]
    fn test_candidate_ordering() {
        let mut heap: BinaryHeap<Candidate> = BinaryHeap::new();
        heap.push(Candidate::new(1, 1.0));
        heap.push(Candidate::new(2, 2.0));
        heap.push(Candidate::new(3, 0.5));
        heap.push(Candidate::new(0, 1.0));

        // Min-heap: smallest distance first, lower index on ties
        let order: Vec<u32> = std::iter::from_fn(|| heap.pop()).map(|c| c.index).collect();
        assert_eq!(order, vec![3, 0, 1, 2]);
    }

    #[test]
    fn test_max_candidate_evicts_higher_index_on_tie() {
        let mut heap: BinaryHeap<MaxCandidate> = BinaryHeap::new();
        heap.push(MaxCandidate(Candidate::new(4, 1.0)));
        heap.push(MaxCandidate(Candidate::new(9, 1.0)));
        assert_eq!(heap.pop().unwrap().0.index, 9);
    }

    #[test]
    fn test_entry_point_packing() {
        let graph = HnswGraph::new();
        assert_eq!(graph.entry_point(), None);
        assert_eq!(graph.max_layer(), 0);

        assert!(graph.try_init_entry_point(5, 2));
        assert!(!graph.try_init_entry_point(6, 3));
        assert_eq!(graph.entry_point(), Some((5, 2)));

        graph.promote_entry_point(7, 2);
        assert_eq!(graph.entry_point(), Some((5, 2)));
        graph.promote_entry_point(u32::MAX - 1, 4);
        assert_eq!(graph.entry_point(), Some((u32::MAX - 1, 4)));
    }

    #[test]
    fn test_node_neighbors_above_level_are_empty() {
        let store = VectorStore::new(1);
        let idx = store.append(1u64.into(), Embedding::new(vec![0.0]).unwrap()).unwrap();
        let node = GraphNode::new(store.get(idx).unwrap(), 1);
        node.set_neighbors(1, vec![3]);
        node.set_neighbors(5, vec![4]);
        assert_eq!(node.neighbors(1), vec![3]);
        assert!(node.neighbors(5).is_empty());
    }

    #[test]
    fn test_greedy_closest_walks_the_line() {
        let (_store, graph) = line_graph(&[0.0, 1.0, 2.0, 3.0, 4.0]);
        let start = Candidate::new(0, 9.0);
        let found = greedy_closest(&graph, &kernel(), &[3.2], start, 0);
        assert_eq!(found.index, 3);
    }

    #[test]
    fn test_search_layer_returns_sorted_frontier() {
        let (_store, graph) = line_graph(&[0.0, 1.0, 2.0, 3.0, 4.0]);
        let k = kernel();
        let ep = Candidate::new(0, k.raw(&[2.1], &[0.0]));
        let result = search_layer(&graph, &k, &[2.1], &[ep], &layer0(3, true));
        let order: Vec<u32> = result.candidates.iter().map(|c| c.index).collect();
        assert_eq!(order, vec![2, 3, 1]);
        assert!(!result.expired);
    }

    #[test]
    fn test_search_layer_traverses_tombstones() {
        let (store, graph) = line_graph(&[0.0, 1.0, 2.0, 3.0]);
        store.tombstone(1).unwrap();
        store.tombstone(2).unwrap();
        let k = kernel();
        let ep = Candidate::new(0, k.raw(&[3.0], &[0.0]));
        let result = search_layer(&graph, &k, &[3.0], &[ep], &layer0(2, true));
        let order: Vec<u32> = result.candidates.iter().map(|c| c.index).collect();
        // Node 3 is only reachable through the tombstoned bridge nodes
        assert_eq!(order, vec![3, 0]);
    }

    #[test]
    fn test_search_layer_skips_dangling_neighbors() {
        let (_store, graph) = line_graph(&[0.0, 1.0]);
        graph.node(0).unwrap().set_neighbors(0, vec![1, 42]);
        let k = kernel();
        let result =
            search_layer(&graph, &k, &[1.0], &[Candidate::new(0, 1.0)], &layer0(4, false));
        assert_eq!(result.candidates.len(), 2);
    }

    #[test]
    fn test_search_layer_expired_deadline_returns_seed() {
        let (_store, graph) = line_graph(&[0.0, 1.0, 2.0]);
        let params = LayerQuery {
            ef: 3,
            layer: 0,
            skip_tombstoned: false,
            deadline: Some(Instant::now()),
        };
        let result = search_layer(&graph, &kernel(), &[2.0], &[Candidate::new(0, 4.0)], &params);
        assert!(result.expired);
        assert_eq!(result.candidates.len(), 1);
    }

    #[test]
    fn test_select_neighbors_heuristic_prefers_spread() {
        // Query at 0; candidates at 1.0, 1.1 (clustered with 1.0) and -1.5.
        let (_store, graph) = line_graph(&[1.0, 1.1, -1.5]);
        let k = kernel();
        let candidates = [Candidate::new(0, 1.0), Candidate::new(1, 1.21), Candidate::new(2, 2.25)];
        assert_eq!(select_neighbors_simple(&candidates, 2), vec![0, 1]);
        assert_eq!(select_neighbors_heuristic(&graph, &k, &candidates, 2), vec![0, 2]);
    }

    #[test]
    fn test_prune_neighbors_by_distance_then_index() {
        let (_store, graph) = line_graph(&[1.0, -1.0, 3.0, 0.5]);
        let mut neighbors = vec![2, 1, 0, 3, 99];
        prune_neighbors(&graph, &kernel(), &[0.0], &mut neighbors, 3);
        // 0 and 1 tie at distance 1.0; the lower index wins; 99 is dangling
        assert_eq!(neighbors, vec![3, 0, 1]);
    }
}
