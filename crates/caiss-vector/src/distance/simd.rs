//! SIMD distance kernels using the `wide` crate.
//!
//! `wide` picks the best available instruction set at compile time (SSE/AVX on x86,
//! NEON on ARM, SIMD128 on wasm) and falls back to scalar code elsewhere. Every
//! function processes 8 floats per iteration with an `f32x8` accumulator and a
//! scalar tail for the remainder.

use wide::f32x8;

/// Number of f32 elements processed per SIMD iteration.
const SIMD_WIDTH: usize = 8;

/// Returns a zero array if conversion fails, which cannot happen with correct loop bounds.
#[inline]
fn slice_to_simd_array(slice: &[f32]) -> [f32; SIMD_WIDTH] {
    slice.try_into().unwrap_or([0.0; SIMD_WIDTH])
}

#[inline]
fn horizontal_sum(v: f32x8) -> f32 {
    let arr: [f32; 8] = v.to_array();
    arr.iter().sum()
}

/// Squared Euclidean (L2) distance between two vectors.
///
/// # Panics
///
/// Debug-panics if vectors have different lengths.
#[inline]
#[must_use]
pub fn euclidean_distance_squared(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "vectors must have same dimension");

    let len = a.len();
    let simd_len = len - (len % SIMD_WIDTH);

    let mut sum = f32x8::ZERO;
    for i in (0..simd_len).step_by(SIMD_WIDTH) {
        let va = f32x8::new(slice_to_simd_array(&a[i..i + SIMD_WIDTH]));
        let vb = f32x8::new(slice_to_simd_array(&b[i..i + SIMD_WIDTH]));
        let diff = va - vb;
        sum += diff * diff;
    }

    let mut result = horizontal_sum(sum);
    for i in simd_len..len {
        let diff = a[i] - b[i];
        result += diff * diff;
    }

    result
}

/// Dot product of two vectors.
///
/// # Panics
///
/// Debug-panics if vectors have different lengths.
#[inline]
#[must_use]
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "vectors must have same dimension");

    let len = a.len();
    let simd_len = len - (len % SIMD_WIDTH);

    let mut sum = f32x8::ZERO;
    for i in (0..simd_len).step_by(SIMD_WIDTH) {
        let va = f32x8::new(slice_to_simd_array(&a[i..i + SIMD_WIDTH]));
        let vb = f32x8::new(slice_to_simd_array(&b[i..i + SIMD_WIDTH]));
        sum += va * vb;
    }

    let mut result = horizontal_sum(sum);
    for i in simd_len..len {
        result += a[i] * b[i];
    }

    result
}

/// Sum of squares (squared L2 norm) of a vector.
#[inline]
#[must_use]
pub fn sum_of_squares(v: &[f32]) -> f32 {
    let len = v.len();
    let simd_len = len - (len % SIMD_WIDTH);

    let mut sum = f32x8::ZERO;
    for i in (0..simd_len).step_by(SIMD_WIDTH) {
        let vv = f32x8::new(slice_to_simd_array(&v[i..i + SIMD_WIDTH]));
        sum += vv * vv;
    }

    let mut result = horizontal_sum(sum);
    for x in &v[simd_len..] {
        result += x * x;
    }

    result
}

/// L2 norm (magnitude) of a vector.
#[inline]
#[must_use]
pub fn l2_norm(v: &[f32]) -> f32 {
    sum_of_squares(v).sqrt()
}

/// Cosine similarity in [-1, 1].
///
/// Returns 0.0 if either vector has zero magnitude.
///
/// # Panics
///
/// Debug-panics if vectors have different lengths.
#[inline]
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "vectors must have same dimension");

    let len = a.len();
    let simd_len = len - (len % SIMD_WIDTH);

    let mut dot_sum = f32x8::ZERO;
    let mut norm_a_sum = f32x8::ZERO;
    let mut norm_b_sum = f32x8::ZERO;

    // Dot product and both norms in one pass
    for i in (0..simd_len).step_by(SIMD_WIDTH) {
        let va = f32x8::new(slice_to_simd_array(&a[i..i + SIMD_WIDTH]));
        let vb = f32x8::new(slice_to_simd_array(&b[i..i + SIMD_WIDTH]));

        dot_sum += va * vb;
        norm_a_sum += va * va;
        norm_b_sum += vb * vb;
    }

    let mut dot = horizontal_sum(dot_sum);
    let mut norm_a_sq = horizontal_sum(norm_a_sum);
    let mut norm_b_sq = horizontal_sum(norm_b_sum);

    for i in simd_len..len {
        dot += a[i] * b[i];
        norm_a_sq += a[i] * a[i];
        norm_b_sq += b[i] * b[i];
    }

    let norm_product = (norm_a_sq * norm_b_sq).sqrt();
    if norm_product == 0.0 {
        return 0.0;
    }

    dot / norm_product
}

/// Cosine distance, `1 - cosine_similarity`, in [0, 2].
///
/// A zero-magnitude input yields the sentinel 1.0.
///
/// # Panics
///
/// Debug-panics if vectors have different lengths.
#[inline]
#[must_use]
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}
