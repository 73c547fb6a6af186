//! Table-driven invalidation and direct-value override.
//!
//! An operator maintains a table of [`OverrideRecord`]s. The
//! [`TableFlusher`] polls it, keeps the latest complete list as the live
//! [`OverrideGeneration`], and flushes the engine entries covered by records
//! whose `value_version` changed or that disappeared. Records flagged as
//! direct serve their blob in place of the producer.

mod codec;
mod generation;
mod prefix_direct_cache;
mod record;
mod table_flusher;

pub use codec::*;
pub use generation::*;
pub use prefix_direct_cache::*;
pub use record::*;
pub use table_flusher::*;
