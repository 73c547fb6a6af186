//! Cache Error Hierarchy
//!
//! Defines the error types surfaced by the compute engine, the table-driven
//! flusher and the snapshot backends.

use std::time::Duration;

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Value computation failures seen by a caller of the engine
    #[error(transparent)]
    Compute(#[from] ComputeError),

    /// Override control plane failures
    #[error(transparent)]
    Flusher(#[from] FlusherError),

    /// Snapshot backend failures
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// Configuration loading or validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Unrecoverable failures
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComputeError {
    /// The producer returned an error (or panicked) and no snapshot was served
    #[error("Producer for key {key} failed: {reason}")]
    ProducerFailure { key: String, reason: String },

    /// The caller's timeout elapsed and no snapshot exists for the key
    #[error("No snapshot available for key {key} after waiting {waited:?}")]
    SnapshotUnavailable { key: String, waited: Duration },
}

#[derive(Debug, thiserror::Error)]
pub enum FlusherError {
    /// Record set fetch failed for this poll cycle
    #[error("Record source query failed: {0}")]
    SourceQueryFailure(String),

    /// Blob fetch for a direct-value record failed
    #[error("Failed to fetch direct value blob for {key}: {reason}")]
    BlobFetchFailure { key: String, reason: String },

    /// Override blob could not be decoded
    #[error("Malformed direct value for {key}: {reason}")]
    DirectValueParseFailure { key: String, reason: String },

    /// A record column holds a value outside its schema
    #[error("Invalid override record field: {0}")]
    InvalidRecord(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// Disk I/O failures on file backed snapshots
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    /// Serialization failures for persisted snapshot records
    #[error(transparent)]
    BincodeError(#[from] bincode::Error),

    /// Embedded database errors
    #[error(transparent)]
    DbError(#[from] sled::Error),

    /// Backend specific failure
    #[error("Snapshot backend error: {0}")]
    Backend(String),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Snapshot(SnapshotError::IoError(e))
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Snapshot(SnapshotError::BincodeError(e))
    }
}

impl From<sled::Error> for Error {
    fn from(e: sled::Error) -> Self {
        Error::Snapshot(SnapshotError::DbError(e))
    }
}
