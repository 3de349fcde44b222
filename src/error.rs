//! Errors raised while syncing a localization tree.
//!
//! Per-value provider failures are absorbed by the merge engine; what reaches
//! a caller as a [`SyncError`] is a whole file or the whole run failing.

use crate::mt::MtError;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cache error: {0}")]
    Cache(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("translation error: {0}")]
    Translation(#[from] MtError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        SyncError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        SyncError::Config(message.into())
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
