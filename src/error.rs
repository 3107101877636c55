use thiserror::Error;

use crate::algorithm::AlgorithmError;
use crate::torrent::TorrentError;

/// Errors that abort a run or surface from the library entry points.
///
/// Per-item failures (unreadable files, rename failures) have their own
/// error types in [`crate::pipeline`] and [`crate::embed`] and are normally
/// logged and skipped by the runner instead of being converted into this.
#[derive(Error, Debug)]
pub enum HashpassError {
    /// Algorithm mask conversion failure.
    #[error("algorithm error: {0}")]
    Algorithm(#[from] AlgorithmError),

    /// The digest engine could not build a context for the requested set.
    #[error("failed to initialize digest context for [{0}]")]
    EngineInit(String),

    /// Torrent generation or save failure.
    #[error("torrent error: {0}")]
    Torrent(#[from] TorrentError),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Propagated I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Catch all for unexpected internal problems.
    #[error("internal error: {0}")]
    Internal(String),
}

impl HashpassError {
    /// Whether the error means the run cannot make forward progress.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            HashpassError::Algorithm(AlgorithmError::CapacityExceeded { .. })
                | HashpassError::EngineInit(_)
                | HashpassError::Internal(_)
        )
    }
}
