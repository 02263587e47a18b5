//! Hamming distance over binary vectors.
//!
//! A binary vector is carried in the same `f32` slots as dense vectors: a component is
//! a set bit when it is non-zero. Components are packed 64 at a time into `u64` words
//! and compared with XOR + popcount, which `u64::count_ones()` lowers to the hardware
//! instruction (POPCNT on x86, CNT on ARM) when available.

const WORD_BITS: usize = 64;

/// Pack up to 64 components into one word, bit `i` set when `chunk[i] != 0.0`.
#[inline]
fn pack_word(chunk: &[f32]) -> u64 {
    chunk
        .iter()
        .enumerate()
        .fold(0u64, |word, (bit, &x)| if x == 0.0 { word } else { word | (1u64 << bit) })
}

/// Pack a binary vector into `ceil(len / 64)` words.
#[must_use]
pub fn pack_bits(v: &[f32]) -> Vec<u64> {
    v.chunks(WORD_BITS).map(pack_word).collect()
}

/// Hamming distance between two bit-packed vectors.
///
/// # Panics
///
/// Debug-panics if slices have different lengths.
#[inline]
#[must_use]
pub fn hamming_distance_packed(a: &[u64], b: &[u64]) -> u32 {
    debug_assert_eq!(a.len(), b.len(), "bit vectors must have same length");
    a.iter().zip(b.iter()).map(|(&x, &y)| (x ^ y).count_ones()).sum()
}

/// Hamming distance between two binary vectors stored as `f32` components.
///
/// Packs word by word without allocating.
///
/// # Panics
///
/// Debug-panics if vectors have different lengths.
#[inline]
#[must_use]
#[allow(clippy::cast_precision_loss)] // bit counts stay far below 2^24
pub fn hamming_distance(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "vectors must have same dimension");
    let bits: u32 = a
        .chunks(WORD_BITS)
        .zip(b.chunks(WORD_BITS))
        .map(|(x, y)| (pack_word(x) ^ pack_word(y)).count_ones())
        .sum();
    bits as f32
}
