//! Index tuning from a training corpus.
//!
//! The corpus is a JSON-lines file, one record per line:
//!
//! ```text
//! {"index": 17, "node": [0.12, -0.5, ...]}
//! {"index": "water", "node": [0.33, 0.01, ...]}
//! ```
//!
//! Each epoch builds a fresh index and measures its precision: a sampled record
//! is a hit when the farthest distance among the approximate top `fast_rank`
//! equals the farthest among the exact top `real_rank`. Below target, the next
//! epoch doubles both beam widths and raises `M` by 4.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use caiss_vector::{
    DistanceMetric, Embedding, ExternalId, HnswConfig, HnswIndex, InsertMode, SearchParams,
};
use rayon::prelude::*;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{Error, Result};

/// Largest `M` the tuner will grow to.
pub const MAX_TUNED_M: usize = 64;

const DISTANCE_TOLERANCE: f32 = 1e-5;

/// Options for [`IndexEngine::train`](crate::IndexEngine::train).
#[derive(Debug, Clone, PartialEq)]
pub struct TrainOptions {
    /// Required fraction of sampled hits, in `(0, 1]`.
    pub precision: f32,
    /// Approximate search depth compared per sample.
    pub fast_rank: usize,
    /// Exact search depth compared per sample.
    pub real_rank: usize,
    /// Records sampled for precision, taken from the start of the corpus.
    pub sample_size: usize,
    /// Maximum number of build-and-measure rounds.
    pub max_epochs: usize,
    /// Read at most this many records.
    pub max_records: Option<usize>,
    /// Override the engine's normalization for the trained index.
    pub normalize: Option<bool>,
    /// Save the trained model here instead of the initialize path.
    pub model_path: Option<PathBuf>,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            precision: 0.95,
            fast_rank: 5,
            real_rank: 5,
            sample_size: 1000,
            max_epochs: 5,
            max_records: None,
            normalize: None,
            model_path: None,
        }
    }
}

impl TrainOptions {
    /// Set the precision target.
    #[must_use]
    pub const fn with_precision(mut self, precision: f32) -> Self {
        self.precision = precision;
        self
    }

    /// Set the compared ranks.
    #[must_use]
    pub const fn with_ranks(mut self, fast_rank: usize, real_rank: usize) -> Self {
        self.fast_rank = fast_rank;
        self.real_rank = real_rank;
        self
    }

    /// Set the number of epochs.
    #[must_use]
    pub const fn with_max_epochs(mut self, epochs: usize) -> Self {
        self.max_epochs = epochs;
        self
    }

    /// Set the output model path.
    #[must_use]
    pub fn with_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = Some(path.into());
        self
    }

    /// Validate the options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first bad option.
    pub fn validate(&self) -> Result<()> {
        if !(self.precision > 0.0 && self.precision <= 1.0) {
            return Err(Error::config(format!("precision must be in (0, 1], got {}", self.precision)));
        }
        if self.fast_rank == 0 || self.real_rank == 0 {
            return Err(Error::config("fast_rank and real_rank must be positive"));
        }
        if self.sample_size == 0 {
            return Err(Error::config("sample_size must be positive"));
        }
        if self.max_epochs == 0 {
            return Err(Error::config("max_epochs must be positive"));
        }
        if self.max_records == Some(0) {
            return Err(Error::config("max_records must be positive"));
        }
        Ok(())
    }
}

/// Outcome of a training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainReport {
    /// Epochs run.
    pub epochs: usize,
    /// Precision measured in the last epoch.
    pub precision: f32,
    /// Records read from the corpus.
    pub records: usize,
    /// Whether the target was reached.
    pub converged: bool,
    /// Graph parameters of the final index.
    pub config: HnswConfig,
}

#[derive(Deserialize)]
struct TrainRecord {
    index: ExternalId,
    node: Vec<f32>,
}

/// Read a JSON-lines training corpus. Blank lines are skipped.
///
/// # Errors
///
/// Returns [`Error::ModelLoad`] if the file cannot be read, [`Error::Format`] for
/// a malformed line, and [`Error::DimensionMismatch`] for a wrong-length vector.
pub fn read_training_data(
    path: &Path,
    dimension: usize,
    normalize: bool,
    max_records: Option<usize>,
) -> Result<Vec<(ExternalId, Embedding)>> {
    let file = File::open(path)
        .map_err(|e| Error::ModelLoad(format!("cannot read {}: {e}", path.display())))?;
    let limit = max_records.unwrap_or(usize::MAX);

    let mut records = Vec::new();
    for (number, line) in BufReader::new(file).lines().enumerate() {
        if records.len() >= limit {
            break;
        }
        let line = line.map_err(|e| Error::ModelLoad(format!("{}: {e}", path.display())))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: TrainRecord = serde_json::from_str(&line)
            .map_err(|e| Error::Format(format!("{}:{}: {e}", path.display(), number + 1)))?;
        let embedding = Embedding::with_dimension(&record.node, dimension)?;
        records.push((record.index, if normalize { embedding.normalize() } else { embedding }));
    }

    if records.is_empty() {
        return Err(Error::config(format!("training data {} is empty", path.display())));
    }
    info!(path = %path.display(), records = records.len(), "training data loaded");
    Ok(records)
}

/// Parameters for the epoch after one that missed its target.
#[must_use]
pub fn grow_config(config: &HnswConfig) -> HnswConfig {
    let m = (config.m + 4).min(MAX_TUNED_M).max(config.m);
    let mut next = HnswConfig::new(m)
        .with_m_max0(2 * m)
        .with_ef_construction(config.ef_construction.saturating_mul(2))
        .with_ef_search(config.ef_search.saturating_mul(2))
        .with_selection(config.selection);
    if let Some(seed) = config.seed {
        next = next.with_seed(seed);
    }
    next
}

/// A seeded config inserts in corpus order so that the graph is reproducible;
/// otherwise the records are inserted in parallel.
fn build_index(
    data: &[(ExternalId, Embedding)],
    metric: DistanceMetric,
    config: HnswConfig,
    mode: InsertMode,
    capacity: Option<usize>,
) -> Result<HnswIndex> {
    let dimension = data.first().map_or(0, |(_, e)| e.dimension());
    let seeded = config.seed.is_some();
    let index = HnswIndex::new(dimension, metric, config)?.with_capacity_limit(capacity);
    let insert = |(id, embedding): &(ExternalId, Embedding)| -> Result<()> {
        index.insert(id.clone(), embedding.clone(), mode)?;
        Ok(())
    };
    if seeded {
        data.iter().try_for_each(insert)?;
    } else {
        data.par_iter().try_for_each(insert)?;
    }
    Ok(index)
}

/// Fraction of sampled records whose approximate and exact farthest distances agree.
///
/// # Errors
///
/// Propagates search errors.
#[allow(clippy::cast_precision_loss)]
pub fn measure_precision(
    index: &HnswIndex,
    data: &[(ExternalId, Embedding)],
    options: &TrainOptions,
) -> Result<f32> {
    let samples = &data[..data.len().min(options.sample_size)];
    let params = SearchParams::new(options.fast_rank);

    let hits = samples
        .par_iter()
        .map(|(_, embedding)| -> Result<usize> {
            let fast = index.search(embedding.as_slice(), &params)?.results;
            let real = index.exact_search(embedding.as_slice(), options.real_rank)?;
            let hit = match (fast.last(), real.last()) {
                (Some(f), Some(r)) => (f.distance - r.distance).abs() < DISTANCE_TOLERANCE,
                _ => false,
            };
            Ok(usize::from(hit))
        })
        .try_reduce(|| 0, |a, b| Ok(a + b))?;

    Ok(hits as f32 / samples.len() as f32)
}

/// Build indexes until the precision target is met or the epochs run out.
///
/// Call inside a worker pool to bound the parallelism. Every candidate index
/// holds at most `capacity` records.
///
/// # Errors
///
/// Returns [`Error::ResourceExhausted`] if the corpus exceeds `capacity`, and
/// propagates other build and search errors.
pub fn train_index(
    data: &[(ExternalId, Embedding)],
    metric: DistanceMetric,
    base: HnswConfig,
    mode: InsertMode,
    capacity: Option<usize>,
    options: &TrainOptions,
) -> Result<(HnswIndex, TrainReport)> {
    let mut config = base;
    let mut epoch = 0;
    loop {
        epoch += 1;
        let index = build_index(data, metric, config.clone(), mode, capacity)?;
        let precision = measure_precision(&index, data, options)?;
        info!(
            epoch,
            max_epochs = options.max_epochs,
            precision,
            m = config.m,
            ef_construction = config.ef_construction,
            ef_search = config.ef_search,
            "training epoch finished"
        );

        let converged = precision >= options.precision;
        if converged || epoch >= options.max_epochs {
            if !converged {
                warn!(
                    precision,
                    target = options.precision,
                    "training stopped below the precision target"
                );
            }
            let report =
                TrainReport { epochs: epoch, precision, records: data.len(), converged, config };
            return Ok((index, report));
        }
        config = grow_config(&config);
    }
}
