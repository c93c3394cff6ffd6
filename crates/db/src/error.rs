use std::time::Duration;

use thiserror::Error;

/// Failures talking to the document store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed document: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Backend(#[from] mongodb::error::Error),
}
