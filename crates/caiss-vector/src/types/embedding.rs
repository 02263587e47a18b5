//! Embedding type for vector storage.

use std::ops::Deref;

use crate::error::VectorError;

/// A vector embedding with value validation.
///
/// Embeddings are fixed-dimension vectors of f32 values. The data is stored as a
/// contiguous array for a SIMD-friendly memory layout and is never mutated after
/// construction.
///
/// # Example
///
/// ```
/// use caiss_vector::types::Embedding;
///
/// let embedding = Embedding::new(vec![1.0, 2.0, 3.0]).unwrap();
/// assert_eq!(embedding.dimension(), 3);
/// assert_eq!(embedding.as_slice(), &[1.0, 2.0, 3.0]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    data: Vec<f32>,
}

impl Embedding {
    /// Create a new embedding from a vector of f32 values.
    ///
    /// # Errors
    ///
    /// Returns an error if the vector is empty or contains NaN/Infinite values.
    pub fn new(data: Vec<f32>) -> Result<Self, VectorError> {
        if data.is_empty() {
            return Err(VectorError::InvalidDimension { expected: 1, actual: 0 });
        }

        for (i, &value) in data.iter().enumerate() {
            check_finite(i, value)?;
        }

        Ok(Self { data })
    }

    /// Create an embedding from a slice, checking it against an expected dimension first.
    ///
    /// # Errors
    ///
    /// Returns [`VectorError::DimensionMismatch`] if `values.len() != dimension`, or an
    /// error from [`Embedding::new`].
    pub fn with_dimension(values: &[f32], dimension: usize) -> Result<Self, VectorError> {
        if values.len() != dimension {
            return Err(VectorError::DimensionMismatch { expected: dimension, actual: values.len() });
        }
        Self::new(values.to_vec())
    }

    /// Create an embedding from raw bytes (little-endian f32 values).
    ///
    /// # Errors
    ///
    /// Returns an error if the byte length is not a multiple of 4, is empty, or decodes
    /// to a non-finite value.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, VectorError> {
        if bytes.is_empty() {
            return Err(VectorError::InvalidDimension { expected: 1, actual: 0 });
        }

        if bytes.len() % 4 != 0 {
            return Err(VectorError::format(format!(
                "byte length {} is not a multiple of 4",
                bytes.len()
            )));
        }

        let mut data = Vec::with_capacity(bytes.len() / 4);
        for chunk in bytes.chunks_exact(4) {
            let bytes_array: [u8; 4] = chunk
                .try_into()
                .map_err(|_| VectorError::format("failed to read f32 bytes"))?;
            let value = f32::from_le_bytes(bytes_array);
            check_finite(data.len(), value)?;
            data.push(value);
        }

        Ok(Self { data })
    }

    /// Get the dimension of the embedding.
    #[inline]
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.data.len()
    }

    /// Get the embedding data as a slice.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Convert the embedding to raw bytes (little-endian f32 values).
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.data.len() * 4);
        for &value in &self.data {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes
    }

    /// Consume the embedding and return the underlying vector.
    #[inline]
    #[must_use]
    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    /// Normalize the embedding to unit length (L2 norm = 1).
    ///
    /// A zero-length embedding is returned unchanged.
    #[must_use]
    pub fn normalize(&self) -> Self {
        let norm = self.l2_norm();
        if norm == 0.0 {
            return self.clone();
        }
        Self { data: self.data.iter().map(|x| x / norm).collect() }
    }

    /// Calculate the L2 (Euclidean) norm of the embedding.
    #[inline]
    #[must_use]
    pub fn l2_norm(&self) -> f32 {
        crate::distance::l2_norm(&self.data)
    }
}

fn check_finite(index: usize, value: f32) -> Result<(), VectorError> {
    if value.is_finite() {
        return Ok(());
    }
    Err(VectorError::InvalidValue {
        index,
        value,
        reason: if value.is_nan() {
            "NaN values are not allowed"
        } else {
            "Infinite values are not allowed"
        },
    })
}

impl Deref for Embedding {
    type Target = [f32];

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl AsRef<[f32]> for Embedding {
    #[inline]
    fn as_ref(&self) -> &[f32] {
        &self.data
    }
}
