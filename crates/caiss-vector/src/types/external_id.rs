//! Caller-facing record identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The identifier a caller attaches to a stored vector.
///
/// Either a 64-bit integer or a string key (a word, a document name). Internal
/// indices are never exposed; every search result carries the external ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExternalId {
    /// Numeric identifier.
    Int(u64),
    /// String key.
    Key(String),
}

impl ExternalId {
    /// Tag written to model files for this variant.
    pub(crate) const fn tag(&self) -> u8 {
        match self {
            Self::Int(_) => 0,
            Self::Key(_) => 1,
        }
    }
}

impl From<u64> for ExternalId {
    fn from(id: u64) -> Self {
        Self::Int(id)
    }
}

impl From<&str> for ExternalId {
    fn from(key: &str) -> Self {
        Self::Key(key.to_owned())
    }
}

impl From<String> for ExternalId {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(id) => write!(f, "{id}"),
            Self::Key(key) => f.write_str(key),
        }
    }
}
