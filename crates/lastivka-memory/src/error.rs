//! Errors surfaced by the write path of the memory store.
//!
//! Reads never fail: a missing or malformed file degrades to an empty store.

use std::path::PathBuf;

/// Failure while persisting or exporting memory.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("failed to {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode memory store: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to replace {path} atomically: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl MemoryError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, MemoryError>;
