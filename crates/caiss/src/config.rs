//! Engine configuration.
//!
//! [`EngineConfig`] is fixed when a handle is created. The integer-coded enums
//! here mirror the codes accepted at the handle boundary; every one of them is
//! validated by `TryFrom<u32>` so that an unknown code fails at `init`.
//!
//! # Example Configuration
//!
//! ```toml
//! management = "async"
//! max_threads = 4
//! insert_mode = "overwrite"
//! normalize = true
//! max_elements = 1000000
//! cache_capacity = 512
//! persist_on_destroy = false
//!
//! [hnsw]
//! m = 16
//! m_max0 = 32
//! ef_construction = 200
//! ef_search = 50
//! selection = "nearest"
//! seed = 42
//! ```

use std::path::Path;

use caiss_vector::{DistanceMetric, HnswConfig, InsertMode};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Upper bound for `max_threads`.
pub const MAX_THREADS_LIMIT: usize = 256;

/// Index algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmKind {
    /// Hierarchical navigable small world graph.
    #[default]
    Hnsw,
}

impl AlgorithmKind {
    /// The on-disk algorithm code.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Hnsw => caiss_vector::index::persistence::ALGORITHM_HNSW,
        }
    }
}

impl TryFrom<u32> for AlgorithmKind {
    type Error = Error;

    fn try_from(code: u32) -> Result<Self> {
        match code {
            0 => Ok(Self::Hnsw),
            1 => Err(Error::config("flat algorithm is not supported")),
            _ => Err(Error::config(format!("unknown algorithm code {code}"))),
        }
    }
}

/// Distance metric as selected at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// Negative dot product.
    InnerProduct,
    /// Squared Euclidean distance.
    Euclidean,
    /// One minus cosine similarity.
    Cosine,
    /// Hamming distance over binary components.
    Hamming,
}

impl TryFrom<u32> for MetricKind {
    type Error = Error;

    fn try_from(code: u32) -> Result<Self> {
        match code {
            0 => Ok(Self::InnerProduct),
            1 => Ok(Self::Euclidean),
            2 => Ok(Self::Cosine),
            3 => Ok(Self::Hamming),
            _ => Err(Error::config(format!("unknown distance code {code}"))),
        }
    }
}

impl From<MetricKind> for DistanceMetric {
    fn from(kind: MetricKind) -> Self {
        match kind {
            MetricKind::InnerProduct => Self::InnerProduct,
            MetricKind::Euclidean => Self::Euclidean,
            MetricKind::Cosine => Self::Cosine,
            MetricKind::Hamming => Self::Hamming,
        }
    }
}

/// Where the engine runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// In the calling process.
    #[default]
    Process,
}

impl TryFrom<u32> for RunMode {
    type Error = Error;

    fn try_from(code: u32) -> Result<Self> {
        match code {
            0 => Ok(Self::Process),
            1 => Err(Error::config("networked mode is not supported")),
            _ => Err(Error::config(format!("unknown run mode code {code}"))),
        }
    }
}

/// How insert and search calls are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManagementMode {
    /// Calls run to completion on the caller's thread.
    #[default]
    Sync,
    /// Calls are queued on the engine's worker pool.
    Async,
}

impl TryFrom<u32> for ManagementMode {
    type Error = Error;

    fn try_from(code: u32) -> Result<Self> {
        match code {
            0 => Ok(Self::Sync),
            1 => Ok(Self::Async),
            _ => Err(Error::config(format!("unknown management code {code}"))),
        }
    }
}

/// Approximate graph search or a linear scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    /// HNSW graph search.
    #[default]
    Approximate,
    /// Brute-force scan over every live record.
    Exact,
}

impl SearchType {
    /// Tag naming this search type in JSON result documents.
    #[must_use]
    pub const fn result_tag(self) -> &'static str {
        match self {
            Self::Approximate => "ann_search",
            Self::Exact => "force_loop",
        }
    }
}

/// What a boundary search code asks for: the search type and whether the
/// query is a vector or the external ID of a stored vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchCode {
    /// Approximate or exact.
    pub search_type: SearchType,
    /// The query names a stored record instead of carrying a vector.
    pub by_id: bool,
}

impl TryFrom<u32> for SearchCode {
    type Error = Error;

    fn try_from(code: u32) -> Result<Self> {
        let (search_type, by_id) = match code {
            0 => (SearchType::Approximate, false),
            1 => (SearchType::Approximate, true),
            2 => (SearchType::Exact, false),
            3 => (SearchType::Exact, true),
            _ => return Err(Error::config(format!("unknown search type code {code}"))),
        };
        Ok(Self { search_type, by_id })
    }
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Index algorithm.
    pub algorithm: AlgorithmKind,
    /// Sync or async scheduling.
    pub management: ManagementMode,
    /// Worker pool size for batch inserts, training and async calls.
    pub max_threads: usize,
    /// Graph parameters.
    pub hnsw: HnswConfig,
    /// Behavior when inserting an ID that is already present.
    pub insert_mode: InsertMode,
    /// L2-normalize vectors on insert and queries before search.
    pub normalize: bool,
    /// Limit on stored records, tombstoned included.
    pub max_elements: Option<usize>,
    /// Entries in the search-by-id result cache; 0 disables it.
    pub cache_capacity: usize,
    /// Save to the model path when the handle is destroyed.
    pub persist_on_destroy: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            algorithm: AlgorithmKind::Hnsw,
            management: ManagementMode::Sync,
            max_threads: 1,
            hnsw: HnswConfig::default(),
            insert_mode: InsertMode::Overwrite,
            normalize: false,
            max_elements: None,
            cache_capacity: 256,
            persist_on_destroy: false,
        }
    }
}

impl EngineConfig {
    /// Create a configuration with the given thread count and management mode.
    #[must_use]
    pub fn new(max_threads: usize, management: ManagementMode) -> Self {
        Self { max_threads, management, ..Self::default() }
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read, parsed, or validated.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] on a parse or validation failure.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| Error::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Set the graph parameters.
    #[must_use]
    pub fn with_hnsw(mut self, hnsw: HnswConfig) -> Self {
        self.hnsw = hnsw;
        self
    }

    /// Set the insert mode.
    #[must_use]
    pub const fn with_insert_mode(mut self, mode: InsertMode) -> Self {
        self.insert_mode = mode;
        self
    }

    /// Enable or disable normalization.
    #[must_use]
    pub const fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    /// Limit the number of stored records.
    #[must_use]
    pub const fn with_max_elements(mut self, max: Option<usize>) -> Self {
        self.max_elements = max;
        self
    }

    /// Set the result cache capacity.
    #[must_use]
    pub const fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Save on destroy.
    #[must_use]
    pub const fn with_persist_on_destroy(mut self, persist: bool) -> Self {
        self.persist_on_destroy = persist;
        self
    }

    /// Validate configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_THREADS_LIMIT).contains(&self.max_threads) {
            return Err(Error::config(format!(
                "max_threads must be in 1..={MAX_THREADS_LIMIT}, got {}",
                self.max_threads
            )));
        }
        if self.max_elements == Some(0) {
            return Err(Error::config("max_elements must be positive"));
        }
        self.hnsw.validate()?;
        Ok(())
    }
}
