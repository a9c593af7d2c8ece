//! # Scan Error Types
//!
//! All errors that can occur while validating or running a scan.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur in the scanning engine.
#[derive(Error, Debug)]
pub enum ScanError {
    /// A seed token is not a signed 64-bit integer.
    #[error("invalid seed {token:?}: expected a signed 64-bit integer")]
    InvalidSeed {
        /// The offending text.
        token: String,
    },

    /// The seed list contains nothing to scan.
    #[error("seed list is empty")]
    EmptySeedList,

    /// The range end lies before its start.
    #[error("invalid seed range: end {end} is before start {start}")]
    InvalidRange {
        /// First seed of the range.
        start: i64,
        /// Last seed of the range.
        end: i64,
    },

    /// A request field is outside its allowed domain.
    #[error("invalid scan request: {0}")]
    InvalidRequest(String),

    /// The output destination cannot be created or written.
    #[error("cannot access output path {}: {source}", path.display())]
    OutputPath {
        /// The destination that was rejected.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// A result could not be written; the scan was aborted.
    #[error(transparent)]
    Sink(#[from] SinkError),

    /// A worker thread could not be started or died unexpectedly.
    #[error("worker pool failure: {0}")]
    Pool(String),
}

/// Errors raised by the result sink.
#[derive(Error, Debug)]
pub enum SinkError {
    /// Appending or flushing a result line failed.
    #[error("failed to write seed {seed} to the result stream: {source}")]
    Write {
        /// The seed that could not be recorded.
        seed: i64,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
}

/// Result type for scan operations.
pub type ScanResult<T> = Result<T, ScanError>;
