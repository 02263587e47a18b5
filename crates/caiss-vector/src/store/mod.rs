//! Vector storage.
//!
//! [`VectorStore`] is an append-only arena of [`VectorRecord`]s addressed by dense
//! internal indices. Indices are never reused: removal only sets a tombstone, so the
//! neighbor references held by graph nodes stay valid for the life of the store.

mod vector_store;

pub use vector_store::{VectorRecord, VectorStore};
