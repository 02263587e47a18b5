//! HNSW index configuration.

use serde::{Deserialize, Serialize};

use crate::error::VectorError;

/// Highest layer a node may be assigned, regardless of the level draw.
pub const MAX_LEVEL_CAP: usize = 16;

/// How a node's neighbors are chosen from the construction frontier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeighborSelection {
    /// Take the M nearest candidates.
    #[default]
    Nearest,
    /// Keep a candidate only if it is closer to the new node than to every neighbor
    /// already kept, then top up with the nearest rejected ones.
    Diverse,
}

/// Configuration parameters for an HNSW index.
///
/// # Parameters
///
/// * `m` - Maximum number of connections per node in layers above 0.
///   Typical values: 16-64. Higher values give better recall but use more memory.
///
/// * `m_max0` - Maximum number of connections in layer 0 (the densest layer).
///   Typically set to `2 * m`.
///
/// * `ef_construction` - Beam width during index construction.
///   Typical values: 100-500.
///
/// * `ef_search` - Default beam width during search; can be overridden per query.
///
/// * `ml` - Level multiplier, typically `1 / ln(m)`. A node reaches layer `k` or above
///   with probability `exp(-k / ml)`.
///
/// * `seed` - Seed for the level generator. Two indexes built from the same seed and
///   the same insert sequence have identical graphs. `None` seeds from the clock.
///
/// When deserialized, a missing `m_max0` or `ml` is derived from the `m` that was
/// read, exactly as [`HnswConfig::new`] derives it; every other missing field
/// takes its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawHnswConfig")]
pub struct HnswConfig {
    /// Maximum number of connections per node (M parameter).
    pub m: usize,
    /// Maximum connections in layer 0 (typically 2 * M).
    pub m_max0: usize,
    /// Beam width for construction.
    pub ef_construction: usize,
    /// Default beam width for search.
    pub ef_search: usize,
    /// Level multiplier (1 / ln(M)).
    pub ml: f64,
    /// Neighbor selection rule used during construction.
    pub selection: NeighborSelection,
    /// Level generator seed.
    pub seed: Option<u64>,
}

impl HnswConfig {
    /// Create a new HNSW configuration with the specified M parameter.
    ///
    /// Other parameters are set to sensible defaults:
    /// - `m_max0` = 2 * m
    /// - `ef_construction` = 200
    /// - `ef_search` = 50
    /// - `ml` = 1 / ln(m)
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // m is typically small (16-64), so no precision loss
    pub fn new(m: usize) -> Self {
        let m = m.max(2); // Ensure at least 2 connections
        Self {
            m,
            m_max0: m * 2,
            ef_construction: 200,
            ef_search: 50,
            ml: 1.0 / (m as f64).ln(),
            selection: NeighborSelection::Nearest,
            seed: None,
        }
    }

    /// Set the beam width for construction.
    #[must_use]
    pub const fn with_ef_construction(mut self, ef: usize) -> Self {
        self.ef_construction = ef;
        self
    }

    /// Set the default beam width for search.
    #[must_use]
    pub const fn with_ef_search(mut self, ef: usize) -> Self {
        self.ef_search = ef;
        self
    }

    /// Set the maximum connections in layer 0.
    #[must_use]
    pub const fn with_m_max0(mut self, m_max0: usize) -> Self {
        self.m_max0 = m_max0;
        self
    }

    /// Set the neighbor selection rule.
    #[must_use]
    pub const fn with_selection(mut self, selection: NeighborSelection) -> Self {
        self.selection = selection;
        self
    }

    /// Fix the level generator seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Neighbor bound for `layer`.
    #[inline]
    #[must_use]
    pub const fn max_connections(&self, layer: usize) -> usize {
        if layer == 0 {
            self.m_max0
        } else {
            self.m
        }
    }

    /// Check the parameters for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`VectorError::InvalidConfig`] describing the first bad parameter.
    pub fn validate(&self) -> Result<(), VectorError> {
        if self.m < 2 {
            return Err(VectorError::InvalidConfig(format!("m must be at least 2, got {}", self.m)));
        }
        if self.m_max0 < self.m {
            return Err(VectorError::InvalidConfig(format!(
                "m_max0 ({}) must be at least m ({})",
                self.m_max0, self.m
            )));
        }
        if self.ef_construction == 0 || self.ef_search == 0 {
            return Err(VectorError::InvalidConfig("ef values must be positive".into()));
        }
        if !(self.ml.is_finite() && self.ml > 0.0) {
            return Err(VectorError::InvalidConfig(format!("ml must be positive, got {}", self.ml)));
        }
        for (name, value) in
            [("m", self.m), ("m_max0", self.m_max0), ("ef_construction", self.ef_construction)]
        {
            if u32::try_from(value).is_err() {
                return Err(VectorError::InvalidConfig(format!("{name} is too large: {value}")));
            }
        }
        Ok(())
    }
}

impl Default for HnswConfig {
    /// Uses M=16, which is a good balance between recall and speed.
    fn default() -> Self {
        Self::new(16)
    }
}

/// Serialized form of [`HnswConfig`] with every field optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawHnswConfig {
    m: Option<usize>,
    m_max0: Option<usize>,
    ef_construction: Option<usize>,
    ef_search: Option<usize>,
    ml: Option<f64>,
    selection: Option<NeighborSelection>,
    seed: Option<u64>,
}

impl From<RawHnswConfig> for HnswConfig {
    fn from(raw: RawHnswConfig) -> Self {
        // new() clamps m and derives m_max0 and ml from it
        let mut config = raw.m.map_or_else(Self::default, Self::new);
        if let Some(m_max0) = raw.m_max0 {
            config.m_max0 = m_max0;
        }
        if let Some(ef) = raw.ef_construction {
            config.ef_construction = ef;
        }
        if let Some(ef) = raw.ef_search {
            config.ef_search = ef;
        }
        if let Some(ml) = raw.ml {
            config.ml = ml;
        }
        if let Some(selection) = raw.selection {
            config.selection = selection;
        }
        config.seed = raw.seed;
        config
    }
}
