//! Compute-with-timeout-fallback engine.
//!
//! Owns one [`CacheEntry`] per key and runs at most one producer per key at a
//! time. Callers wait for the shared computation up to their own timeout and
//! fall back to the snapshot store when it elapses.

mod cache_entry;
mod compute_engine;
pub(crate) use cache_entry::*;
pub use compute_engine::*;

#[cfg(test)]
mod compute_engine_test;

#[cfg(test)]
use mockall::automock;

/// Observable state of a cache entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    Empty,
    Computing,
    Ready,
}

/// The view of the engine the flusher needs for invalidation.
#[cfg_attr(test, automock)]
pub trait CacheRegistry: Send + Sync + 'static {
    /// Keys the engine currently holds an entry for, in any state
    fn cached_keys(&self) -> Vec<String>;

    /// Resets the entry for `key` to empty; returns false if there was no entry
    fn flush_key(
        &self,
        key: &str,
    ) -> bool;
}
