//! Core types for vector storage.
//!
//! - [`Embedding`] - A validated dense vector embedding
//! - [`ExternalId`] - The caller-facing identifier attached to each stored vector

mod embedding;
mod external_id;

pub use embedding::Embedding;
pub use external_id::ExternalId;
