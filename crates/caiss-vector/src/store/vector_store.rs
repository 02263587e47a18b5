//! Append-only vector store with tombstones.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Result, VectorError};
use crate::types::{Embedding, ExternalId};

/// One stored vector and the identifier it was inserted under.
///
/// The vector is immutable; the tombstone flag is the only mutable state.
#[derive(Debug)]
pub struct VectorRecord {
    external_id: ExternalId,
    vector: Embedding,
    tombstone: AtomicBool,
}

impl VectorRecord {
    fn new(external_id: ExternalId, vector: Embedding, tombstoned: bool) -> Self {
        Self { external_id, vector, tombstone: AtomicBool::new(tombstoned) }
    }

    /// The caller-facing identifier.
    #[must_use]
    pub fn external_id(&self) -> &ExternalId {
        &self.external_id
    }

    /// The stored vector.
    #[inline]
    #[must_use]
    pub fn vector(&self) -> &[f32] {
        self.vector.as_slice()
    }

    /// The stored vector as an [`Embedding`].
    #[must_use]
    pub fn embedding(&self) -> &Embedding {
        &self.vector
    }

    /// Whether this record has been logically deleted.
    #[inline]
    #[must_use]
    pub fn is_tombstoned(&self) -> bool {
        self.tombstone.load(Ordering::Acquire)
    }
}

/// Flat, append-only storage of vectors and their external IDs.
///
/// Records live behind `Arc`, so growing the backing `Vec` never moves the vector
/// data that graph nodes and in-flight searches are reading.
#[derive(Debug)]
pub struct VectorStore {
    dimension: usize,
    capacity: Option<usize>,
    records: RwLock<Vec<Arc<VectorRecord>>>,
    /// Live external ID to internal index.
    ids: RwLock<HashMap<ExternalId, u32>>,
    live: AtomicUsize,
}

impl VectorStore {
    /// Create an empty store for vectors of `dimension` components.
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            capacity: None,
            records: RwLock::new(Vec::new()),
            ids: RwLock::new(HashMap::new()),
            live: AtomicUsize::new(0),
        }
    }

    /// Limit the total number of records, live and tombstoned.
    #[must_use]
    pub fn with_capacity_limit(mut self, capacity: Option<usize>) -> Self {
        self.capacity = capacity;
        self
    }

    /// Vector dimensionality.
    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    /// Configured record limit, if any.
    #[must_use]
    pub const fn capacity_limit(&self) -> Option<usize> {
        self.capacity
    }

    /// Append a vector and bind `external_id` to its new internal index.
    ///
    /// An existing binding for the same ID is replaced; tombstoning the previous record
    /// is the caller's job.
    ///
    /// # Errors
    ///
    /// Returns [`VectorError::DimensionMismatch`] for a wrong-length vector, and
    /// [`VectorError::ResourceExhausted`] when the record limit or the `u32` index space
    /// is used up.
    pub fn append(&self, external_id: ExternalId, vector: Embedding) -> Result<u32> {
        self.push(external_id, vector, false).map(|(index, _)| index)
    }

    /// Like [`VectorStore::append`], also handing back the shared record.
    pub(crate) fn append_shared(
        &self,
        external_id: ExternalId,
        vector: Embedding,
    ) -> Result<(u32, Arc<VectorRecord>)> {
        self.push(external_id, vector, false)
    }

    /// Append a record restored from a model file, tombstone state included.
    pub(crate) fn push_restored(
        &self,
        external_id: ExternalId,
        vector: Embedding,
        tombstoned: bool,
    ) -> Result<(u32, Arc<VectorRecord>)> {
        self.push(external_id, vector, tombstoned)
    }

    fn push(
        &self,
        external_id: ExternalId,
        vector: Embedding,
        tombstoned: bool,
    ) -> Result<(u32, Arc<VectorRecord>)> {
        if vector.dimension() != self.dimension {
            return Err(VectorError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.dimension(),
            });
        }

        let mut records = self.records.write();
        let len = records.len();
        if self.capacity.is_some_and(|cap| len >= cap) {
            return Err(VectorError::ResourceExhausted(format!(
                "vector store is full ({len} records)"
            )));
        }
        let index = u32::try_from(len)
            .ok()
            .filter(|&i| i != u32::MAX)
            .ok_or_else(|| VectorError::ResourceExhausted("internal index space exhausted".into()))?;

        let record = Arc::new(VectorRecord::new(external_id.clone(), vector, tombstoned));
        records.push(Arc::clone(&record));
        if !tombstoned {
            self.ids.write().insert(external_id, index);
            self.live.fetch_add(1, Ordering::AcqRel);
        }
        Ok((index, record))
    }

    /// Fetch a live record.
    ///
    /// # Errors
    ///
    /// Returns [`VectorError::NotFound`] if the index is out of range or tombstoned.
    pub fn get(&self, index: u32) -> Result<Arc<VectorRecord>> {
        match self.record(index) {
            Some(record) if !record.is_tombstoned() => Ok(record),
            Some(_) => Err(VectorError::not_found(format!("record {index} is tombstoned"))),
            None => Err(VectorError::not_found(format!("record {index} is out of range"))),
        }
    }

    /// Fetch a record whether or not it is tombstoned.
    #[inline]
    #[must_use]
    pub fn record(&self, index: u32) -> Option<Arc<VectorRecord>> {
        self.records.read().get(index as usize).cloned()
    }

    /// Logically delete a record. Its index is never handed out again.
    ///
    /// # Errors
    ///
    /// Returns [`VectorError::NotFound`] if the index is out of range or already tombstoned.
    pub fn tombstone(&self, index: u32) -> Result<()> {
        let record = self.get(index)?;
        if record.tombstone.swap(true, Ordering::AcqRel) {
            return Err(VectorError::not_found(format!("record {index} is tombstoned")));
        }
        self.live.fetch_sub(1, Ordering::AcqRel);

        let mut ids = self.ids.write();
        if ids.get(record.external_id()) == Some(&index) {
            ids.remove(record.external_id());
        }
        Ok(())
    }

    /// Internal index currently bound to a live external ID.
    #[must_use]
    pub fn index_of(&self, external_id: &ExternalId) -> Option<u32> {
        self.ids.read().get(external_id).copied()
    }

    /// Snapshot of every record in internal-index order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<VectorRecord>> {
        self.records.read().clone()
    }

    /// Total number of records, tombstoned included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether the store holds no records at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of records that are not tombstoned.
    #[must_use]
    pub fn live_len(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }
}
