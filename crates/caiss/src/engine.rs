//! The index engine.
//!
//! An [`IndexEngine`] wraps one [`HnswIndex`] behind a lifecycle:
//! create, initialize (fresh or from a model file), insert/search/remove,
//! persist, destroy. Searches never take an engine-wide lock. Inserts and
//! removes share a read lock that persist and train take exclusively, so a
//! saved model is a consistent snapshot and a retrained index never loses a
//! concurrent insert.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use caiss_vector::index::persistence::{self, ModelExpectation, ModelOptions};
use caiss_vector::{
    DistanceMetric, Embedding, ExternalId, HnswIndex, InsertOutcome, SearchParams, SearchResult,
};
use parking_lot::RwLock;
use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

use crate::cache::{CacheKey, CacheMetrics, SearchCache};
use crate::config::{EngineConfig, RunMode, SearchType};
use crate::error::{Error, Result};
use crate::executor::{Completion, InFlight, WorkerPool};
use crate::train::{self, TrainOptions, TrainReport};

/// File extension of model files.
pub const MODEL_EXTENSION: &str = "caiss";

/// Append the `.caiss` extension unless `path` already has it.
#[must_use]
pub fn with_model_extension(path: &Path) -> PathBuf {
    if path.extension().is_some_and(|ext| ext == MODEL_EXTENSION) {
        return path.to_path_buf();
    }
    let mut name = path.file_name().map(std::ffi::OsStr::to_os_string).unwrap_or_default();
    name.push(".");
    name.push(MODEL_EXTENSION);
    path.with_file_name(name)
}

/// One search result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hit {
    /// The caller's ID of the matched vector.
    pub external_id: ExternalId,
    /// Distance to the query; smaller is closer.
    pub distance: f32,
}

impl From<SearchResult> for Hit {
    fn from(result: SearchResult) -> Self {
        Self { external_id: result.external_id, distance: result.distance }
    }
}

/// Ordered search results.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchResponse {
    /// Hits, nearest first.
    pub hits: Vec<Hit>,
    /// The deadline expired and `hits` is the best frontier found by then.
    pub partial: bool,
}

impl SearchResponse {
    /// Render as a JSON result document tagged `ann_search` or `force_loop`.
    ///
    /// ```text
    /// {"type":"ann_search","size":1,"partial":false,"details":[{"external_id":7,"distance":0.01}]}
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if serialization fails.
    pub fn to_json(&self, search_type: SearchType) -> Result<String> {
        let document = ResultDocument {
            kind: search_type.result_tag(),
            size: self.hits.len(),
            partial: self.partial,
            details: &self.hits,
        };
        serde_json::to_string(&document)
            .map_err(|e| Error::internal(format!("cannot encode search result: {e}")))
    }
}

#[derive(Serialize)]
struct ResultDocument<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    size: usize,
    partial: bool,
    details: &'a [Hit],
}

/// Per-query search options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchOptions {
    /// Beam width; the index default when `None`. Never below `k`.
    pub ef: Option<usize>,
    /// Give up expanding after this long and return what was found.
    pub timeout: Option<Duration>,
}

impl SearchOptions {
    /// Set the beam width.
    #[must_use]
    pub const fn with_ef(mut self, ef: usize) -> Self {
        self.ef = Some(ef);
        self
    }

    /// Set the timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Point-in-time engine statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStats {
    /// Vector dimensionality.
    pub dimension: usize,
    /// Distance metric.
    pub metric: DistanceMetric,
    /// Live records.
    pub live: usize,
    /// Records including tombstones.
    pub stored: usize,
    /// Top graph layer.
    pub max_layer: usize,
    /// Whether vectors are normalized.
    pub normalize: bool,
}

/// An initialized index plus the settings it was loaded or built with.
#[derive(Debug)]
pub(crate) struct Loaded {
    pub(crate) index: HnswIndex,
    pub(crate) normalize: bool,
    pub(crate) model_path: Option<PathBuf>,
}

impl Loaded {
    /// Validate a caller vector and apply normalization.
    pub(crate) fn prepare(&self, vector: &[f32]) -> Result<Embedding> {
        let embedding = Embedding::with_dimension(vector, self.index.dimension())?;
        Ok(if self.normalize { embedding.normalize() } else { embedding })
    }
}

#[derive(Debug)]
enum State {
    Uninitialized,
    Ready(Arc<Loaded>),
    Destroyed,
}

/// A vector search engine instance.
#[derive(Debug)]
pub struct IndexEngine {
    config: EngineConfig,
    state: RwLock<State>,
    /// Shared by insert/remove, exclusive for persist/train.
    writers: RwLock<()>,
    workers: WorkerPool,
    cache: SearchCache,
    in_flight: Arc<InFlight>,
}

impl IndexEngine {
    /// Create an uninitialized engine.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `config` is invalid and
    /// [`Error::ResourceExhausted`] if the worker pool cannot start.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            workers: WorkerPool::new(config.management, config.max_threads)?,
            cache: SearchCache::new(config.cache_capacity),
            state: RwLock::new(State::Uninitialized),
            writers: RwLock::new(()),
            in_flight: InFlight::new(),
            config,
        })
    }

    /// The engine configuration.
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Whether `initialize` has succeeded and `destroy` has not run.
    pub fn is_initialized(&self) -> bool {
        matches!(*self.state.read(), State::Ready(_))
    }

    /// The search cache counters.
    pub const fn cache_metrics(&self) -> &CacheMetrics {
        self.cache.metrics()
    }

    fn loaded(&self) -> Result<Arc<Loaded>> {
        match &*self.state.read() {
            State::Ready(loaded) => Ok(Arc::clone(loaded)),
            State::Uninitialized => Err(Error::config("engine is not initialized")),
            State::Destroyed => Err(Error::config("engine has been destroyed")),
        }
    }

    /// Set the metric and dimensionality, and load `model_path` if given.
    ///
    /// The `.caiss` extension is appended to `model_path` when missing. A failed
    /// call leaves the engine uninitialized.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`]: zero dimension, an engine that is already initialized
    ///   or destroyed, a model whose dimension or metric differs, or a model path
    ///   given with a custom metric
    /// - [`Error::ModelLoad`]: the model file cannot be read
    /// - [`Error::Format`]: the model file is corrupt or of an unsupported version
    pub fn initialize(
        &self,
        mode: RunMode,
        metric: DistanceMetric,
        dimension: usize,
        model_path: Option<&Path>,
    ) -> Result<()> {
        let _guard = self.in_flight.enter();
        let RunMode::Process = mode;
        if dimension == 0 {
            return Err(Error::config("dimension must be positive"));
        }
        if metric.is_custom() && model_path.is_some() {
            return Err(Error::config("models cannot be loaded with a custom distance"));
        }

        let mut state = self.state.write();
        match *state {
            State::Uninitialized => {}
            State::Ready(_) => {
                return Err(Error::config("engine is already initialized; destroy and recreate it"))
            }
            State::Destroyed => return Err(Error::config("engine has been destroyed")),
        }

        let loaded = match model_path {
            Some(path) => self.load_model(&with_model_extension(path), metric, dimension)?,
            None => Loaded {
                index: HnswIndex::new(dimension, metric, self.config.hnsw.clone())?
                    .with_capacity_limit(self.config.max_elements),
                normalize: self.config.normalize,
                model_path: None,
            },
        };
        info!(
            dimension,
            metric = ?metric,
            records = loaded.index.len(),
            model = ?loaded.model_path,
            "engine initialized"
        );
        *state = State::Ready(Arc::new(loaded));
        Ok(())
    }

    fn load_model(&self, path: &Path, metric: DistanceMetric, dimension: usize) -> Result<Loaded> {
        let expect = ModelExpectation { dimension, metric: Some(metric) };
        let model = persistence::load(path, &expect).map_err(|e| match e {
            caiss_vector::VectorError::Io(io) => {
                Error::ModelLoad(format!("cannot read {}: {io}", path.display()))
            }
            other => Error::from(other),
        })?;
        if model.header.algorithm != self.config.algorithm.code() {
            return Err(Error::config("model algorithm differs from the engine's"));
        }
        Ok(Loaded {
            index: model.index.with_capacity_limit(self.config.max_elements),
            normalize: model.header.options.normalize,
            model_path: Some(path.to_path_buf()),
        })
    }

    /// Insert `vector` under `external_id`.
    ///
    /// # Errors
    ///
    /// - [`Error::DimensionMismatch`]: wrong vector length; nothing is modified
    /// - [`Error::InvalidInput`]: a non-finite component
    /// - [`Error::ResourceExhausted`]: `max_elements` reached
    pub fn insert(&self, vector: &[f32], external_id: ExternalId) -> Result<InsertOutcome> {
        let _guard = self.in_flight.enter();
        let _writer = self.writers.read();
        let loaded = self.loaded()?;
        let embedding = loaded.prepare(vector)?;
        let outcome = loaded.index.insert(external_id, embedding, self.config.insert_mode)?;
        if outcome.is_stored() {
            self.cache.clear();
        }
        Ok(outcome)
    }

    /// Insert many vectors in parallel on the worker pool.
    ///
    /// Returns the number of stored (not discarded) records. On error the first
    /// failure is returned; records inserted before it stay.
    ///
    /// # Errors
    ///
    /// See [`IndexEngine::insert`].
    pub fn insert_batch(&self, items: Vec<(ExternalId, Vec<f32>)>) -> Result<usize> {
        let _guard = self.in_flight.enter();
        let _writer = self.writers.read();
        let loaded = self.loaded()?;
        let mode = self.config.insert_mode;

        let result = self.workers.install(|| {
            items
                .into_par_iter()
                .map(|(id, vector)| -> Result<usize> {
                    let embedding = loaded.prepare(&vector)?;
                    Ok(usize::from(loaded.index.insert(id, embedding, mode)?.is_stored()))
                })
                .try_reduce(|| 0, |a, b| Ok(a + b))
        });
        self.cache.clear();
        result
    }

    /// Search with a query vector.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] for a wrong-length query.
    pub fn search(
        &self,
        query: &[f32],
        search_type: SearchType,
        k: usize,
        options: &SearchOptions,
    ) -> Result<SearchResponse> {
        let _guard = self.in_flight.enter();
        let loaded = self.loaded()?;
        let query = loaded.prepare(query)?;
        Self::run_search(&loaded, query.as_slice(), search_type, k, options)
    }

    /// Search with the stored vector of `external_id` as the query.
    ///
    /// The record itself is not excluded and normally ranks first. Results are
    /// cached until the next mutation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the ID is unknown or removed.
    pub fn search_by_id(
        &self,
        external_id: &ExternalId,
        search_type: SearchType,
        k: usize,
        options: &SearchOptions,
    ) -> Result<SearchResponse> {
        let _guard = self.in_flight.enter();
        let loaded = self.loaded()?;

        let key = CacheKey {
            external_id: external_id.clone(),
            search_type,
            k,
            ef: Self::effective_ef(&loaded, k, options),
        };
        let generation = self.cache.generation();
        if let Some(response) = self.cache.get(&key) {
            return Ok(response);
        }

        let record = loaded.index.record_of(external_id)?;
        let response = Self::run_search(&loaded, record.vector(), search_type, k, options)?;
        if !response.partial {
            self.cache.insert(key, response.clone(), generation);
        }
        Ok(response)
    }

    fn effective_ef(loaded: &Loaded, k: usize, options: &SearchOptions) -> usize {
        options.ef.unwrap_or(loaded.index.config().ef_search).max(k)
    }

    fn run_search(
        loaded: &Loaded,
        query: &[f32],
        search_type: SearchType,
        k: usize,
        options: &SearchOptions,
    ) -> Result<SearchResponse> {
        if k == 0 {
            return Ok(SearchResponse::default());
        }
        match search_type {
            SearchType::Exact => {
                let results = loaded.index.exact_search(query, k)?;
                Ok(SearchResponse { hits: results.into_iter().map(Hit::from).collect(), partial: false })
            }
            SearchType::Approximate => {
                let mut params = SearchParams::new(k).with_ef(Self::effective_ef(loaded, k, options));
                if let Some(timeout) = options.timeout {
                    params = params.with_deadline(Instant::now() + timeout);
                }
                let outcome = loaded.index.search(query, &params)?;
                Ok(SearchResponse {
                    hits: outcome.results.into_iter().map(Hit::from).collect(),
                    partial: outcome.partial,
                })
            }
        }
    }

    /// Tombstone the record bound to `external_id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the ID is unknown or already removed.
    pub fn remove(&self, external_id: &ExternalId) -> Result<()> {
        let _guard = self.in_flight.enter();
        let _writer = self.writers.read();
        let loaded = self.loaded()?;
        loaded.index.remove(external_id)?;
        self.cache.clear();
        Ok(())
    }

    /// Save the index to `path`, or to the model path given at initialize.
    ///
    /// Returns the path written, with the `.caiss` extension applied.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when neither path is available or the index uses
    /// a custom distance, and [`Error::ModelLoad`] when the file cannot be written.
    pub fn persist(&self, path: Option<&Path>) -> Result<PathBuf> {
        let _guard = self.in_flight.enter();
        let _writer = self.writers.write();
        let loaded = self.loaded()?;
        let target = match path {
            Some(path) => with_model_extension(path),
            None => loaded
                .model_path
                .clone()
                .ok_or_else(|| Error::config("no model path to persist to"))?,
        };
        Self::save(&loaded, &target)?;
        Ok(target)
    }

    fn save(loaded: &Loaded, path: &Path) -> Result<()> {
        persistence::save(&loaded.index, path, ModelOptions { normalize: loaded.normalize })
            .map_err(|e| match e {
                caiss_vector::VectorError::Io(io) => {
                    Error::ModelLoad(format!("cannot write {}: {io}", path.display()))
                }
                other => Error::from(other),
            })
    }

    /// Rebuild the index from a JSON-lines file, raising the graph parameters
    /// until the measured precision reaches the target.
    ///
    /// The trained index replaces the current one and is saved to
    /// `options.model_path` or, failing that, the model path given at initialize.
    /// Inserts and removes wait while training runs; searches keep using the old
    /// index until the swap.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ModelLoad`] or [`Error::Format`] for an unreadable or
    /// malformed data file, [`Error::Config`] for bad options.
    pub fn train(&self, data_path: &Path, options: &TrainOptions) -> Result<TrainReport> {
        let _guard = self.in_flight.enter();
        let _writer = self.writers.write();
        let loaded = self.loaded()?;
        options.validate()?;

        let normalize = options.normalize.unwrap_or(loaded.normalize);
        let data = train::read_training_data(
            data_path,
            loaded.index.dimension(),
            normalize,
            options.max_records,
        )?;
        let base = loaded.index.config().clone();
        let (index, report) = self.workers.install(|| {
            train::train_index(
                &data,
                loaded.index.metric(),
                base,
                self.config.insert_mode,
                self.config.max_elements,
                options,
            )
        })?;

        let trained = Loaded {
            index,
            normalize,
            model_path: options
                .model_path
                .as_deref()
                .map(with_model_extension)
                .or_else(|| loaded.model_path.clone()),
        };
        if let Some(path) = &trained.model_path {
            Self::save(&trained, path)?;
        }

        {
            let mut state = self.state.write();
            if !matches!(*state, State::Ready(_)) {
                return Err(Error::config("engine has been destroyed"));
            }
            *state = State::Ready(Arc::new(trained));
        }
        self.cache.clear();
        Ok(report)
    }

    /// Current statistics.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the engine is not initialized.
    pub fn stats(&self) -> Result<EngineStats> {
        let loaded = self.loaded()?;
        let index = &loaded.index;
        Ok(EngineStats {
            dimension: index.dimension(),
            metric: index.metric(),
            live: index.len(),
            stored: index.store().len(),
            max_layer: index.graph().max_layer(),
            normalize: loaded.normalize,
        })
    }

    /// Queue an insert (async mode) or run it now (sync mode).
    pub fn submit_insert(
        self: &Arc<Self>,
        vector: Vec<f32>,
        external_id: ExternalId,
    ) -> Completion<InsertOutcome> {
        let guard = self.in_flight.enter();
        let engine = Arc::clone(self);
        self.workers.submit(move || {
            let _guard = guard;
            engine.insert(&vector, external_id)
        })
    }

    /// Queue a search (async mode) or run it now (sync mode).
    pub fn submit_search(
        self: &Arc<Self>,
        query: Vec<f32>,
        search_type: SearchType,
        k: usize,
        options: SearchOptions,
    ) -> Completion<SearchResponse> {
        let guard = self.in_flight.enter();
        let engine = Arc::clone(self);
        self.workers.submit(move || {
            let _guard = guard;
            engine.search(&query, search_type, k, &options)
        })
    }

    /// Queue a search by stored ID (async mode) or run it now (sync mode).
    pub fn submit_search_by_id(
        self: &Arc<Self>,
        external_id: ExternalId,
        search_type: SearchType,
        k: usize,
        options: SearchOptions,
    ) -> Completion<SearchResponse> {
        let guard = self.in_flight.enter();
        let engine = Arc::clone(self);
        self.workers.submit(move || {
            let _guard = guard;
            engine.search_by_id(&external_id, search_type, k, &options)
        })
    }

    /// Wait for in-flight and queued operations, optionally persist, and release
    /// the index. Every later call fails.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if already destroyed, or the persist error when
    /// `persist_on_destroy` is set and saving fails. The engine is destroyed
    /// either way.
    pub fn destroy(&self) -> Result<()> {
        let previous = std::mem::replace(&mut *self.state.write(), State::Destroyed);
        if matches!(previous, State::Destroyed) {
            return Err(Error::config("engine has been destroyed"));
        }
        self.in_flight.drain();
        self.cache.clear();

        let mut result = Ok(());
        if let State::Ready(loaded) = previous {
            if self.config.persist_on_destroy {
                if let Some(path) = &loaded.model_path {
                    result = Self::save(&loaded, path);
                }
            }
        }
        info!("engine destroyed");
        result
    }
}
