use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::FutureExt;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::CacheEntry;
use super::CacheRegistry;
use super::Computation;
use super::ComputeOutcome;
use super::EntryState;
use super::EntryStatus;
use super::Lookup;
use crate::async_task::spawn_task;
use crate::metrics::CACHE_LOOKUPS;
use crate::metrics::PRODUCER_FAILURES;
use crate::metrics::SNAPSHOT_FALLBACKS;
use crate::ComputeError;
use crate::EngineConfig;
use crate::Result;
use crate::SnapshotMissPolicy;
use crate::SnapshotStore;

/// Error type a producer may fail with
pub type ProducerError = Box<dyn std::error::Error + Send + Sync>;

/// Per-key result cache with single-flight producers and snapshot fallback.
///
/// # Entry lifecycle
/// `Empty -> Computing -> Ready`, `Ready -(flush)-> Empty`,
/// `Computing -(failure)-> Empty`. A caller timing out does not change the
/// entry; the producer keeps running and its result lands for later callers.
pub struct ComputeEngine<V> {
    entries: Arc<DashMap<String, CacheEntry<V>>>,
    snapshot: Arc<dyn SnapshotStore<V>>,
    config: EngineConfig,
    next_ticket: AtomicU64,
}

impl<V> ComputeEngine<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(
        snapshot: Arc<dyn SnapshotStore<V>>,
        config: EngineConfig,
    ) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            snapshot,
            config,
            next_ticket: AtomicU64::new(1),
        }
    }

    /// Returns the cached value for `key`, or computes it with `producer`.
    ///
    /// Concurrent callers of an empty key share one producer execution. Each
    /// caller waits at most `timeout` before the snapshot store is consulted.
    pub async fn get<F, Fut>(
        &self,
        key: &str,
        producer: F,
        timeout: Duration,
    ) -> Result<V>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<V, ProducerError>> + Send + 'static,
    {
        let computation = match self.acquire(key, producer) {
            Lookup::Ready(value) => {
                debug!(key, "cache hit");
                CACHE_LOOKUPS.with_label_values(&["hit"]).inc();
                return Ok(value);
            }
            Lookup::InFlight(computation) => computation,
        };

        self.await_computation(key, computation, timeout).await
    }

    /// [`ComputeEngine::get`] with the configured default timeout
    pub async fn get_with_default_timeout<F, Fut>(
        &self,
        key: &str,
        producer: F,
    ) -> Result<V>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<V, ProducerError>> + Send + 'static,
    {
        self.get(key, producer, self.config.compute_timeout()).await
    }

    /// Resets the entry to empty so the next `get` recomputes.
    ///
    /// The snapshot store is left untouched. Returns false if no entry exists.
    pub fn flush(
        &self,
        key: &str,
    ) -> bool {
        match self.entries.get_mut(key) {
            Some(mut entry) => {
                debug!(key, "flush entry");
                entry.reset();
                true
            }
            None => false,
        }
    }

    /// Resets every entry; returns how many entries were touched
    pub fn flush_all(&self) -> usize {
        let mut flushed = 0;
        for mut entry in self.entries.iter_mut() {
            entry.reset();
            flushed += 1;
        }
        info!(flushed, "flushed all entries");
        flushed
    }

    /// Cached value without triggering a computation
    pub fn peek(
        &self,
        key: &str,
    ) -> Option<V> {
        self.entries.get(key).and_then(|entry| entry.ready_value().cloned())
    }

    pub fn status(
        &self,
        key: &str,
    ) -> Option<EntryStatus> {
        self.entries.get(key).map(|entry| entry.status())
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.key.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn snapshot_store(&self) -> &Arc<dyn SnapshotStore<V>> {
        &self.snapshot
    }

    /// Joins the entry's current state, starting a producer if it is empty.
    ///
    /// Runs under the entry's shard lock, so two callers can never both see
    /// the same key empty.
    fn acquire<F, Fut>(
        &self,
        key: &str,
        producer: F,
    ) -> Lookup<V>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<V, ProducerError>> + Send + 'static,
    {
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| CacheEntry::new(key));

        if let Some(lookup) = entry.lookup() {
            if let Lookup::InFlight(_) = lookup {
                debug!(key, "joining in-flight computation");
                CACHE_LOOKUPS.with_label_values(&["joined"]).inc();
            }
            return lookup;
        }

        debug!(key, "cache miss, starting producer");
        CACHE_LOOKUPS.with_label_values(&["miss"]).inc();
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let computation = self.spawn_computation(key, ticket, producer);
        entry.state = EntryState::Computing {
            ticket,
            computation: computation.clone(),
        };
        Lookup::InFlight(computation)
    }

    /// Runs the producer on its own task so it completes regardless of how
    /// many waiters give up on it.
    fn spawn_computation<F, Fut>(
        &self,
        key: &str,
        ticket: u64,
        producer: F,
    ) -> Computation<V>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<V, ProducerError>> + Send + 'static,
    {
        let entries = self.entries.clone();
        let snapshot = self.snapshot.clone();
        let key = key.to_string();

        let handle = tokio::spawn(async move {
            let outcome: ComputeOutcome<V> = match AssertUnwindSafe(async move { producer().await })
                .catch_unwind()
                .await
            {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => Err(e.to_string()),
                Err(_) => Err("producer panicked".to_string()),
            };

            let landed = entries
                .get_mut(&key)
                .map(|mut entry| entry.complete(ticket, &outcome))
                .unwrap_or(false);
            if !landed {
                debug!(key, ticket, "entry flushed while computing, result not cached");
            }

            match &outcome {
                Ok(value) => {
                    let value = value.clone();
                    let key = key.clone();
                    spawn_task(
                        "snapshot_save",
                        move || async move {
                            if let Err(e) = snapshot.save(&key, value).await {
                                warn!(key, "failed to save snapshot: {:?}", e);
                            }
                            Ok(())
                        },
                        None,
                    );
                }
                Err(reason) => {
                    error!(key, ticket, "producer failed: {}", reason);
                    PRODUCER_FAILURES.inc();
                }
            }

            outcome
        });

        async move {
            match handle.await {
                Ok(outcome) => outcome,
                Err(e) => Err(format!("producer task aborted: {e}")),
            }
        }
        .boxed()
        .shared()
    }

    async fn await_computation(
        &self,
        key: &str,
        computation: Computation<V>,
        timeout: Duration,
    ) -> Result<V> {
        if let Ok(outcome) = tokio::time::timeout(timeout, computation.clone()).await {
            return outcome.map_err(|reason| producer_failure(key, reason));
        }

        let snapshot = self.read_snapshot(key).await;

        // the producer may have landed while the snapshot was being read
        if let Some(Ok(value)) = computation.peek() {
            return Ok(value.clone());
        }

        if let Some(value) = snapshot {
            info!(key, ?timeout, "producer too slow, serving snapshot");
            SNAPSHOT_FALLBACKS.inc();
            return Ok(value);
        }

        match self.config.snapshot_miss_policy {
            SnapshotMissPolicy::KeepWaiting => {
                debug!(key, "no snapshot, waiting for producer");
                computation
                    .await
                    .map_err(|reason| producer_failure(key, reason))
            }
            SnapshotMissPolicy::Fail => Err(ComputeError::SnapshotUnavailable {
                key: key.to_string(),
                waited: timeout,
            }
            .into()),
        }
    }

    /// Read errors count as a missing snapshot
    async fn read_snapshot(
        &self,
        key: &str,
    ) -> Option<V> {
        match self.snapshot.read(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key, "failed to read snapshot: {:?}", e);
                None
            }
        }
    }
}

fn producer_failure(
    key: &str,
    reason: String,
) -> crate::Error {
    ComputeError::ProducerFailure {
        key: key.to_string(),
        reason,
    }
    .into()
}

impl<V> CacheRegistry for ComputeEngine<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn cached_keys(&self) -> Vec<String> {
        self.keys()
    }

    fn flush_key(
        &self,
        key: &str,
    ) -> bool {
        self.flush(key)
    }
}
