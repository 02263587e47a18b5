//! Distance functions for vector similarity.
//!
//! Every metric is expressed so that a smaller value means "closer": inner product is
//! negated, Euclidean is squared, cosine is `1 - similarity`, Hamming counts differing
//! bits. An index binds one metric at construction through [`DistanceKernel`] and never
//! branches on it again.
//!
//! [`DistanceMetric::Custom`] carries a caller-supplied [`DistanceFn`] that must follow
//! the same convention. It has no model-file code, so such an index lives in memory only.
//!
//! # Features
//!
//! - `simd` (default): `wide::f32x8` kernels
//! - `scalar`: force scalar implementations (useful for debugging)

#[cfg(all(feature = "simd", not(feature = "scalar")))]
mod simd;

#[cfg(any(feature = "scalar", not(feature = "simd")))]
mod scalar;

pub mod binary;

#[cfg(all(feature = "simd", not(feature = "scalar")))]
pub use simd::{
    cosine_distance, cosine_similarity, dot_product, euclidean_distance_squared, l2_norm,
    sum_of_squares,
};

#[cfg(any(feature = "scalar", not(feature = "simd")))]
pub use scalar::{
    cosine_distance, cosine_similarity, dot_product, euclidean_distance_squared, l2_norm,
    sum_of_squares,
};

use serde::{Deserialize, Serialize};

use crate::error::VectorError;

/// A distance function over two equal-length vectors.
pub type DistanceFn = fn(&[f32], &[f32]) -> f32;

/// A caller-supplied distance function.
///
/// Two values are equal when they wrap the same function address.
#[derive(Clone, Copy)]
pub struct CustomDistance(DistanceFn);

impl CustomDistance {
    /// Wrap `func`.
    #[must_use]
    pub const fn new(func: DistanceFn) -> Self {
        Self(func)
    }

    /// The wrapped function.
    #[must_use]
    pub const fn func(self) -> DistanceFn {
        self.0
    }

    fn address(self) -> usize {
        self.0 as usize
    }
}

impl PartialEq for CustomDistance {
    fn eq(&self, other: &Self) -> bool {
        self.address() == other.address()
    }
}

impl Eq for CustomDistance {}

impl std::hash::Hash for CustomDistance {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.address().hash(state);
    }
}

impl std::fmt::Debug for CustomDistance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CustomDistance({:#x})", self.address())
    }
}

/// Distance metric for comparing vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Negative dot product.
    InnerProduct,
    /// Squared Euclidean (L2) distance.
    Euclidean,
    /// Cosine distance (1 - cosine similarity).
    Cosine,
    /// Hamming distance over binary vectors (non-zero component = set bit).
    Hamming,
    /// A caller-supplied function; smaller must mean closer. Never serialized.
    #[serde(skip)]
    Custom(CustomDistance),
}

fn negative_dot_product(a: &[f32], b: &[f32]) -> f32 {
    -dot_product(a, b)
}

impl DistanceMetric {
    /// A metric backed by `func`.
    #[must_use]
    pub const fn custom(func: DistanceFn) -> Self {
        Self::Custom(CustomDistance::new(func))
    }

    /// Whether this metric is a caller-supplied function.
    #[must_use]
    pub const fn is_custom(self) -> bool {
        matches!(self, Self::Custom(_))
    }

    /// The kernel implementing this metric.
    #[must_use]
    pub fn kernel_fn(self) -> DistanceFn {
        match self {
            Self::InnerProduct => negative_dot_product,
            Self::Euclidean => euclidean_distance_squared,
            Self::Cosine => cosine_distance,
            Self::Hamming => binary::hamming_distance,
            Self::Custom(custom) => custom.func(),
        }
    }

    /// Calculate the distance between two vectors using this metric.
    #[inline]
    #[must_use]
    pub fn calculate(&self, a: &[f32], b: &[f32]) -> f32 {
        (self.kernel_fn())(a, b)
    }

    /// Stable one-byte code used in model files; `None` for [`DistanceMetric::Custom`].
    #[must_use]
    pub const fn code(self) -> Option<u8> {
        match self {
            Self::InnerProduct => Some(0),
            Self::Euclidean => Some(1),
            Self::Cosine => Some(2),
            Self::Hamming => Some(3),
            Self::Custom(_) => None,
        }
    }

    /// Inverse of [`DistanceMetric::code`].
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::InnerProduct),
            1 => Some(Self::Euclidean),
            2 => Some(Self::Cosine),
            3 => Some(Self::Hamming),
            _ => None,
        }
    }
}

/// A metric bound to a fixed dimensionality.
///
/// The function pointer is resolved once, so the hot path is a single indirect call.
#[derive(Clone, Copy)]
pub struct DistanceKernel {
    metric: DistanceMetric,
    dimension: usize,
    func: DistanceFn,
}

impl DistanceKernel {
    /// Bind `metric` for vectors of `dimension` components.
    #[must_use]
    pub fn new(metric: DistanceMetric, dimension: usize) -> Self {
        Self { metric, dimension, func: metric.kernel_fn() }
    }

    /// The bound metric.
    #[must_use]
    pub const fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// The bound dimensionality.
    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    /// Checked distance.
    ///
    /// # Errors
    ///
    /// Returns [`VectorError::DimensionMismatch`] if either vector's length differs from
    /// the bound dimension.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> Result<f32, VectorError> {
        for len in [a.len(), b.len()] {
            if len != self.dimension {
                return Err(VectorError::DimensionMismatch { expected: self.dimension, actual: len });
            }
        }
        Ok((self.func)(a, b))
    }

    /// Unchecked distance for vectors already validated against the dimension.
    #[inline]
    #[must_use]
    pub fn raw(&self, a: &[f32], b: &[f32]) -> f32 {
        (self.func)(a, b)
    }
}

impl std::fmt::Debug for DistanceKernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistanceKernel")
            .field("metric", &self.metric)
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}
