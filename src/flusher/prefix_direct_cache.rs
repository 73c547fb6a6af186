use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::OnceCell;
use tracing::debug;

use super::OverrideRecord;
use crate::Result;

/// Parsed blob of one prefix record, keyed by sub-key
pub type ParsedBlob<V> = Arc<HashMap<String, V>>;

pub struct PrefixDirectCacheEntry<V> {
    pub owner_key: String,
    /// Version of the owning record the blob was fetched for
    pub version: i64,
    parsed: OnceCell<ParsedBlob<V>>,
}

impl<V> PrefixDirectCacheEntry<V> {
    fn new(record: &OverrideRecord) -> Self {
        Self {
            owner_key: record.cache_key.clone(),
            version: record.value_version,
            parsed: OnceCell::new(),
        }
    }

    pub fn is_parsed(&self) -> bool {
        self.parsed.initialized()
    }
}

/// Memoized parse of prefix override blobs.
///
/// At most one fetch-and-parse runs per record key at a time; concurrent
/// callers wait for it. A failed parse is not memoized, the next access
/// retries.
pub struct PrefixDirectCache<V> {
    entries: DashMap<String, Arc<PrefixDirectCacheEntry<V>>>,
}

impl<V> PrefixDirectCache<V>
where
    V: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Parsed blob for `record`, running `load` if it is not memoized yet
    pub async fn get_or_parse<F, Fut>(
        &self,
        record: &OverrideRecord,
        load: F,
    ) -> Result<ParsedBlob<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<HashMap<String, V>>>,
    {
        let entry = self.slot(record);
        let parsed = entry
            .parsed
            .get_or_try_init(|| async move {
                debug!(key = %record.cache_key, version = record.value_version, "parsing prefix blob");
                load().await.map(Arc::new)
            })
            .await?;
        Ok(parsed.clone())
    }

    /// Evicts the memoized blob of `owner_key`; returns false if none was held
    pub fn invalidate(
        &self,
        owner_key: &str,
    ) -> bool {
        self.entries.remove(owner_key).is_some()
    }

    pub fn entry(
        &self,
        owner_key: &str,
    ) -> Option<Arc<PrefixDirectCacheEntry<V>>> {
        self.entries.get(owner_key).map(|e| e.value().clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry for the record's version. A newer version replaces the held
    /// entry. An older version gets a detached entry and leaves the map alone.
    fn slot(
        &self,
        record: &OverrideRecord,
    ) -> Arc<PrefixDirectCacheEntry<V>> {
        let mut slot = self
            .entries
            .entry(record.cache_key.clone())
            .or_insert_with(|| Arc::new(PrefixDirectCacheEntry::new(record)));
        if record.value_version > slot.version {
            *slot = Arc::new(PrefixDirectCacheEntry::new(record));
        } else if record.value_version < slot.version {
            debug!(
                key = %record.cache_key,
                version = record.value_version,
                live = slot.version,
                "stale prefix record, parsing without memoizing"
            );
            return Arc::new(PrefixDirectCacheEntry::new(record));
        }
        slot.value().clone()
    }
}

impl<V> Default for PrefixDirectCache<V>
where
    V: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
