//! Error taxonomy for the characterization core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced synchronously to callers of the orchestration core.
///
/// Faults inside a single job never show up here; they are recovered
/// locally and reported as an `error` result for that parameter.
#[derive(Debug, Error)]
pub enum Error {
    /// The named parameter does not exist in the loaded datasheet.
    #[error("unknown parameter: {0}")]
    NotFound(String),

    /// A previous dispatch has not been joined yet.
    #[error("a characterization run is already in progress")]
    AlreadyRunning,

    /// Run directory preparation or cleanup failed.
    #[error("run directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
