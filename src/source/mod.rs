//! Authoritative override record set.
//!
//! The flusher polls a [`RecordSource`] for the complete record list on every
//! cycle; the transport behind it (SQL table, config service, ...) is up to the
//! implementation.

mod mem_record_source;
pub use mem_record_source::*;


use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::OverrideRecord;
use crate::Result;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait RecordSource: Send + Sync + 'static {
    /// Complete current record list, in table order
    async fn query_all_records(&self) -> Result<Vec<OverrideRecord>>;

    /// Direct value blob of `record`.
    ///
    /// Default implementation returns the blob fetched along with the record.
    /// Sources that load large blobs lazily override this.
    async fn fetch_blob(
        &self,
        record: &OverrideRecord,
    ) -> Result<Option<Vec<u8>>> {
        Ok(record.direct_value.clone())
    }
}
