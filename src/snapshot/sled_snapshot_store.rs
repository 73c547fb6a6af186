use std::marker::PhantomData;
use std::path::Path;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use tracing::info;

use super::SnapshotRecord;
use super::SnapshotStore;
use crate::constants::SNAPSHOT_TREE;
use crate::Result;

/// Snapshot store backed by an embedded sled database.
pub struct SledSnapshotStore<V> {
    db: sled::Db,
    tree: sled::Tree,
    _value: PhantomData<fn() -> V>,
}

impl<V> SledSnapshotStore<V> {
    pub fn open(path: &Path) -> Result<Self> {
        info!(?path, "opening sled snapshot store");
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    pub fn from_db(db: sled::Db) -> Result<Self> {
        let tree = db.open_tree(SNAPSHOT_TREE)?;
        Ok(Self {
            db,
            tree,
            _value: PhantomData,
        })
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Blocks until all pending writes are on disk
    pub async fn flush(&self) -> Result<()> {
        self.db.flush_async().await?;
        Ok(())
    }
}

#[async_trait]
impl<V> SnapshotStore<V> for SledSnapshotStore<V>
where
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn save(
        &self,
        key: &str,
        value: V,
    ) -> Result<()> {
        let record = SnapshotRecord::new(key, value);
        let bytes = bincode::serialize(&record)?;
        self.tree.insert(key.as_bytes(), bytes)?;
        debug!(key, "snapshot written to sled");
        Ok(())
    }

    async fn read(
        &self,
        key: &str,
    ) -> Result<Option<V>> {
        match self.tree.get(key.as_bytes())? {
            Some(bytes) => {
                let record: SnapshotRecord<V> = bincode::deserialize(&bytes)?;
                Ok(Some(record.value))
            }
            None => Ok(None),
        }
    }

    async fn delete(
        &self,
        key: &str,
    ) -> Result<()> {
        self.tree.remove(key.as_bytes())?;
        Ok(())
    }
}
