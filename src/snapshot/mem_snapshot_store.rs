use async_trait::async_trait;
use dashmap::DashMap;

use super::SnapshotRecord;
use super::SnapshotStore;
use crate::Result;

/// Process-local snapshot store. Does not survive restarts.
pub struct MemSnapshotStore<V> {
    records: DashMap<String, SnapshotRecord<V>>,
}

impl<V> MemSnapshotStore<V> {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Full record including the write timestamp
    pub fn record(
        &self,
        key: &str,
    ) -> Option<SnapshotRecord<V>>
    where
        V: Clone,
    {
        self.records.get(key).map(|r| r.value().clone())
    }
}

impl<V> Default for MemSnapshotStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<V> SnapshotStore<V> for MemSnapshotStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn save(
        &self,
        key: &str,
        value: V,
    ) -> Result<()> {
        self.records.insert(key.to_string(), SnapshotRecord::new(key, value));
        Ok(())
    }

    async fn read(
        &self,
        key: &str,
    ) -> Result<Option<V>> {
        Ok(self.records.get(key).map(|r| r.value.clone()))
    }

    async fn delete(
        &self,
        key: &str,
    ) -> Result<()> {
        self.records.remove(key);
        Ok(())
    }
}
