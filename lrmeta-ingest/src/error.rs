//! Error types for lrmeta-ingest
//!
//! Only run-level failures are errors. Problems with a single record are
//! collected as warnings in the [`NormalizeReport`](crate::NormalizeReport).

use std::path::PathBuf;
use thiserror::Error;

/// Run-level normalizer failure
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// Metadata store missing or unreadable
    #[error("Metadata store unavailable at {0}: {1}")]
    StoreUnavailable(PathBuf, String),

    /// Output directory or file could not be written
    #[error("Failed to write output {0}: {1}")]
    Output(PathBuf, String),

    /// lrmeta-common error
    #[error("Common error: {0}")]
    Common(#[from] lrmeta_common::Error),
}

/// Result type for normalizer operations
pub type NormalizeResult<T> = Result<T, NormalizeError>;
