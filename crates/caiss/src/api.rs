//! Status-code boundary over a table of engines.
//!
//! Client glue holds only raw `u64` handles and integer codes. Every call decodes
//! and validates its codes, resolves the handle, runs the engine operation and
//! folds the outcome into a [`Status`].
//!
//! ```
//! use caiss::{Caiss, EngineConfig, ExternalId, Query, Status};
//!
//! let caiss = Caiss::new();
//! let (status, handle) = caiss.create_handle(EngineConfig::default());
//! assert_eq!(status, Status::Ok);
//!
//! // process mode, Euclidean, 2 dimensions, no model file
//! assert_eq!(caiss.init(handle, 0, 1, 2, None), Status::Ok);
//! assert_eq!(caiss.insert(handle, &[1.0, 0.0], ExternalId::Int(7)), Status::Ok);
//!
//! let (status, hits) = caiss.search(handle, Query::Vector(&[1.0, 0.1]), 0, 1, 0);
//! assert_eq!(status, Status::Ok);
//! assert_eq!(hits[0].external_id, ExternalId::Int(7));
//!
//! assert_eq!(caiss.destroy(handle), Status::Ok);
//! assert_eq!(caiss.insert(handle, &[1.0, 0.0], ExternalId::Int(8)), Status::InvalidHandle);
//! ```

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use caiss_vector::{DistanceFn, DistanceMetric, ExternalId};
use tracing::debug;

use crate::config::{EngineConfig, MetricKind, RunMode, SearchCode, SearchType};
use crate::engine::{Hit, IndexEngine, SearchOptions, SearchResponse};
use crate::error::{Error, Result, Status};
use crate::registry::{Handle, HandleRegistry};
use crate::train::{TrainOptions, TrainReport};

/// What a search is anchored on.
#[derive(Debug, Clone, PartialEq)]
pub enum Query<'a> {
    /// A query vector of the engine's dimensionality.
    Vector(&'a [f32]),
    /// The external ID of a stored vector.
    Id(ExternalId),
}

impl<'a> From<&'a [f32]> for Query<'a> {
    fn from(vector: &'a [f32]) -> Self {
        Self::Vector(vector)
    }
}

impl From<ExternalId> for Query<'_> {
    fn from(id: ExternalId) -> Self {
        Self::Id(id)
    }
}

fn initialize(
    engine: &IndexEngine,
    mode: u32,
    metric: DistanceMetric,
    dimension: u32,
    model_path: Option<&Path>,
) -> Result<()> {
    let mode = RunMode::try_from(mode)?;
    let dimension = usize::try_from(dimension)
        .map_err(|_| Error::config(format!("dimension {dimension} is too large")))?;
    engine.initialize(mode, metric, dimension, model_path)
}

fn status_of<T>(op: &'static str, result: &Result<T>) -> Status {
    if let Err(e) = result {
        debug!(op, error = %e, "call failed");
    }
    Status::from(result)
}

/// Process-local engine table with a status-code API.
#[derive(Debug, Default)]
pub struct Caiss {
    engines: HandleRegistry<IndexEngine>,
}

impl Caiss {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self { engines: HandleRegistry::new() }
    }

    /// Create a table holding at most `max_handles` live engines.
    #[must_use]
    pub fn with_max_handles(max_handles: usize) -> Self {
        Self { engines: HandleRegistry::with_max_handles(max_handles) }
    }

    /// The process-wide table.
    pub fn global() -> &'static Self {
        static GLOBAL: OnceLock<Caiss> = OnceLock::new();
        GLOBAL.get_or_init(Self::new)
    }

    /// Number of live handles.
    pub fn len(&self) -> usize {
        self.engines.len()
    }

    /// Whether no handle is live.
    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }

    /// Resolve a raw handle to its engine.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHandle`] for an unknown or destroyed handle.
    pub fn engine(&self, handle: u64) -> Result<Arc<IndexEngine>> {
        self.engines.get_raw(handle)
    }

    /// Create an uninitialized engine. The handle is `0` on failure.
    pub fn create_handle(&self, config: EngineConfig) -> (Status, u64) {
        let result = IndexEngine::new(config)
            .and_then(|engine| self.engines.insert(engine))
            .map(|handle| handle.to_raw());
        let status = status_of("create_handle", &result);
        (status, result.unwrap_or(0))
    }

    /// Decode the run mode and metric codes and initialize the engine.
    pub fn init(
        &self,
        handle: u64,
        mode: u32,
        metric: u32,
        dimension: u32,
        model_path: Option<&Path>,
    ) -> Status {
        let result = self.try_init(handle, mode, metric, dimension, model_path);
        status_of("init", &result)
    }

    /// Initialize the engine with a caller-supplied distance function.
    ///
    /// `distance` must return smaller values for closer vectors. The index lives
    /// in memory only: no model is loaded and `persist` fails with
    /// [`Status::Config`].
    pub fn init_custom(&self, handle: u64, mode: u32, dimension: u32, distance: DistanceFn) -> Status {
        let result = self.engine(handle).and_then(|engine| {
            initialize(&engine, mode, DistanceMetric::custom(distance), dimension, None)
        });
        status_of("init_custom", &result)
    }

    /// Insert one vector. In async management the work runs on the engine's pool.
    pub fn insert(&self, handle: u64, vector: &[f32], external_id: ExternalId) -> Status {
        let result = self
            .engine(handle)
            .and_then(|engine| engine.submit_insert(vector.to_vec(), external_id).wait());
        status_of("insert", &result)
    }

    /// Insert many vectors in parallel on the engine's pool.
    pub fn insert_batch(&self, handle: u64, items: Vec<(ExternalId, Vec<f32>)>) -> (Status, usize) {
        let result = self.engine(handle).and_then(|engine| engine.insert_batch(items));
        let status = status_of("insert_batch", &result);
        (status, result.unwrap_or(0))
    }

    /// Search with a vector or a stored ID.
    ///
    /// `search_code` selects approximate or exact search and whether the query is
    /// a vector (codes 0, 2) or an ID (codes 1, 3); a query of the other kind is a
    /// [`Status::Config`] error. `timeout_ms = 0` means no deadline. In async
    /// management both query kinds run on the engine's pool.
    pub fn search(
        &self,
        handle: u64,
        query: Query<'_>,
        search_code: u32,
        top_k: u32,
        timeout_ms: u32,
    ) -> (Status, Vec<Hit>) {
        let result = self.try_search(handle, query, search_code, top_k, timeout_ms);
        let status = status_of("search", &result);
        (status, result.map(|(_, response)| response.hits).unwrap_or_default())
    }

    /// Like [`Caiss::search`], but return the result as a JSON document.
    ///
    /// The document carries `"type"` (`ann_search` for codes 0 and 1,
    /// `force_loop` for codes 2 and 3), `"size"`, `"partial"` and the ordered
    /// `"details"`. The string is empty on failure.
    pub fn search_json(
        &self,
        handle: u64,
        query: Query<'_>,
        search_code: u32,
        top_k: u32,
        timeout_ms: u32,
    ) -> (Status, String) {
        let result = self
            .try_search(handle, query, search_code, top_k, timeout_ms)
            .and_then(|(search_type, response)| response.to_json(search_type));
        let status = status_of("search_json", &result);
        (status, result.unwrap_or_default())
    }

    /// Tombstone a record.
    pub fn remove(&self, handle: u64, external_id: &ExternalId) -> Status {
        let result = self.engine(handle).and_then(|engine| engine.remove(external_id));
        status_of("remove", &result)
    }

    /// Save the engine's index to `model_path`, or to its initialize path.
    pub fn persist(&self, handle: u64, model_path: Option<&Path>) -> (Status, Option<PathBuf>) {
        let result = self.engine(handle).and_then(|engine| engine.persist(model_path));
        let status = status_of("persist", &result);
        (status, result.ok())
    }

    /// Tune and rebuild the engine's index from a JSON-lines corpus.
    pub fn train(
        &self,
        handle: u64,
        data_path: &Path,
        options: &TrainOptions,
    ) -> (Status, Option<TrainReport>) {
        let result = self.engine(handle).and_then(|engine| engine.train(data_path, options));
        let status = status_of("train", &result);
        (status, result.ok())
    }

    /// Invalidate the handle, then drain and release its engine.
    ///
    /// Other handles are untouched; calls already running on this engine finish
    /// before it is released.
    pub fn destroy(&self, handle: u64) -> Status {
        let result = Handle::from_raw(handle)
            .ok_or(Error::InvalidHandle(handle))
            .and_then(|handle| self.engines.remove(handle))
            .and_then(|engine| engine.destroy());
        status_of("destroy", &result)
    }

    fn try_init(
        &self,
        handle: u64,
        mode: u32,
        metric: u32,
        dimension: u32,
        model_path: Option<&Path>,
    ) -> Result<()> {
        let engine = self.engine(handle)?;
        let metric = MetricKind::try_from(metric)?;
        initialize(&engine, mode, metric.into(), dimension, model_path)
    }

    fn try_search(
        &self,
        handle: u64,
        query: Query<'_>,
        search_code: u32,
        top_k: u32,
        timeout_ms: u32,
    ) -> Result<(SearchType, SearchResponse)> {
        let engine = self.engine(handle)?;
        let code = SearchCode::try_from(search_code)?;
        let k = usize::try_from(top_k)
            .map_err(|_| Error::config(format!("top_k {top_k} is too large")))?;
        let mut options = SearchOptions::default();
        if timeout_ms > 0 {
            options = options.with_timeout(Duration::from_millis(u64::from(timeout_ms)));
        }

        let completion = match (query, code.by_id) {
            (Query::Vector(vector), false) => {
                engine.submit_search(vector.to_vec(), code.search_type, k, options)
            }
            (Query::Id(id), true) => engine.submit_search_by_id(id, code.search_type, k, options),
            (Query::Vector(_), true) => {
                return Err(Error::config(format!("search code {search_code} expects an ID")))
            }
            (Query::Id(_), false) => {
                return Err(Error::config(format!("search code {search_code} expects a vector")))
            }
        };
        Ok((code.search_type, completion.wait()?))
    }
}
