//! Call-site wiring.
//!
//! A [`CacheContext`] bundles one compute engine with an optional override
//! flusher so a call site only names its key, timeout and producer through a
//! [`CacheOption`].

mod cache_context;
mod cache_option;
pub use cache_context::*;
pub use cache_option::*;
