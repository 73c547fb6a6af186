//! # snapcache
//!
//! Method-level result cache with two cooperating parts:
//!
//! - a compute engine that runs at most one producer per key and bounds each
//!   caller's wait, serving the last persisted value (snapshot) when the
//!   producer is too slow;
//! - a table-driven flusher that polls an operator administered record set to
//!   invalidate entries, whole key families included, and to serve override
//!   values in place of the producer.
//!
//! ```ignore
//! let config = CacheConfig::new()?.validate()?;
//! let source: Arc<dyn RecordSource> = Arc::new(MemRecordSource::default());
//! let cache = CacheContext::<String>::from_config(config, Some(source))?;
//!
//! let value = cache
//!     .get(&CacheOption::new("svc.op.user_42"), || async { load_user(42).await })
//!     .await?;
//! ```

mod config;
mod constants;
mod context;
mod engine;
mod errors;
mod flusher;
mod metrics;
mod snapshot;
mod source;
pub mod utils;

pub use config::*;
pub use context::*;
pub use engine::*;
pub use errors::*;
pub use flusher::*;
pub use metrics::*;
pub use snapshot::*;
pub use source::*;
pub use utils::*;
