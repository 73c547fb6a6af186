//! Durable last-good-value side channel.
//!
//! The compute engine writes a snapshot on every successful computation and
//! reads it only when a caller's timeout elapses before the producer finishes.
//! Snapshots are independent of the in-memory entry lifetime and, for the
//! file and sled backends, survive process restarts.

mod file_snapshot_store;
mod mem_snapshot_store;
mod sled_snapshot_store;
pub use file_snapshot_store::*;
pub use mem_snapshot_store::*;
pub use sled_snapshot_store::*;


use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde::Serialize;

use crate::utils::time::timestamp_millis;
use crate::Result;
use crate::SnapshotBackend;
use crate::SnapshotConfig;

/// Persisted form of a snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord<V> {
    pub key: String,
    pub value: V,
    /// Wall clock time of the write, in milliseconds since epoch
    pub written_at_ms: u64,
}

impl<V> SnapshotRecord<V> {
    pub fn new(
        key: &str,
        value: V,
    ) -> Self {
        Self {
            key: key.to_string(),
            value,
            written_at_ms: timestamp_millis(),
        }
    }
}

/// Backend-agnostic snapshot storage.
///
/// # Contract
/// - `save` is treated as fire-and-forget by the engine: errors are logged, never
///   propagated to the engine's caller
/// - `read` returns `Ok(None)` when no snapshot exists for the key
/// - `delete` of a missing key succeeds
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SnapshotStore<V>: Send + Sync + 'static
where
    V: Send + Sync + 'static,
{
    async fn save(
        &self,
        key: &str,
        value: V,
    ) -> Result<()>;

    async fn read(
        &self,
        key: &str,
    ) -> Result<Option<V>>;

    async fn delete(
        &self,
        key: &str,
    ) -> Result<()>;
}

/// Builds the snapshot backend selected by configuration.
pub fn build_snapshot_store<V>(config: &SnapshotConfig) -> Result<Arc<dyn SnapshotStore<V>>>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    let store: Arc<dyn SnapshotStore<V>> = match config.backend {
        SnapshotBackend::Memory => Arc::new(MemSnapshotStore::new()),
        SnapshotBackend::File => Arc::new(FileSnapshotStore::new(config.dir.clone())),
        SnapshotBackend::Sled => Arc::new(SledSnapshotStore::open(&config.dir)?),
    };
    Ok(store)
}
