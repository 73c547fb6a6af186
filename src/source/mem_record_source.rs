use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use super::RecordSource;
use crate::FlusherError;
use crate::OverrideRecord;
use crate::Result;

/// In-process override table.
///
/// Stands in for an operator administered table when embedding the cache or in
/// tests: edits become visible to the flusher on its next poll.
pub struct MemRecordSource {
    records: RwLock<Vec<OverrideRecord>>,
    failing: AtomicBool,
    queries: AtomicU64,
}

impl MemRecordSource {
    pub fn new(records: Vec<OverrideRecord>) -> Self {
        Self {
            records: RwLock::new(records),
            failing: AtomicBool::new(false),
            queries: AtomicU64::new(0),
        }
    }

    pub fn replace(
        &self,
        records: Vec<OverrideRecord>,
    ) {
        *self.records.write() = records;
    }

    /// Replaces the record with the same key in place, or appends it
    pub fn upsert(
        &self,
        record: OverrideRecord,
    ) {
        let mut records = self.records.write();
        match records.iter_mut().find(|r| r.cache_key == record.cache_key) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
    }

    pub fn remove(
        &self,
        cache_key: &str,
    ) -> Option<OverrideRecord> {
        let mut records = self.records.write();
        let pos = records.iter().position(|r| r.cache_key == cache_key)?;
        Some(records.remove(pos))
    }

    /// Increments the version of `cache_key`; returns the new version
    pub fn bump_version(
        &self,
        cache_key: &str,
    ) -> Option<i64> {
        let mut records = self.records.write();
        let record = records.iter_mut().find(|r| r.cache_key == cache_key)?;
        record.value_version += 1;
        debug!(cache_key, version = record.value_version, "bumped record version");
        Some(record.value_version)
    }

    /// Makes every following query fail until reset
    pub fn set_failing(
        &self,
        failing: bool,
    ) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn query_count(&self) -> u64 {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> Vec<OverrideRecord> {
        self.records.read().clone()
    }
}

impl Default for MemRecordSource {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl RecordSource for MemRecordSource {
    async fn query_all_records(&self) -> Result<Vec<OverrideRecord>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(FlusherError::SourceQueryFailure("record table unavailable".into()).into());
        }
        Ok(self.records.read().clone())
    }
}
