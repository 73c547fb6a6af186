use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::Mutex;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tokio::time::interval_at;
use tokio::time::Instant;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::DirectValueCodec;
use super::MatchMode;
use super::OverrideGeneration;
use super::OverrideRecord;
use super::PrefixDirectCache;
use crate::metrics::FLUSHED_KEYS;
use crate::metrics::FLUSHER_POLLS;
use crate::utils::key_match::sub_key_of;
use crate::utils::time::timestamp_millis;
use crate::CacheRegistry;
use crate::Error;
use crate::FlusherConfig;
use crate::FlusherError;
use crate::RecordSource;
use crate::Result;

/// What one poll cycle did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The polled list equals the live generation; nothing was touched
    Unchanged,
    /// A new generation went live
    Changed {
        /// Keys of old records that were removed or re-versioned
        changed_keys: Vec<String>,
        /// Engine entries that were flushed
        flushed_keys: Vec<String>,
    },
}

/// Table-driven invalidation and override control plane.
///
/// Polls a [`RecordSource`] on a fixed interval, swaps the live
/// [`OverrideGeneration`] when the record set changes, and flushes the engine
/// entries covered by removed or re-versioned records. Lookups against the
/// live generation never wait for a poll in progress.
///
/// The poll timer starts lazily: the first lookup runs one poll inline and
/// then schedules the periodic task. Concurrent first lookups share that
/// initial poll.
pub struct TableFlusher<V> {
    core: Arc<FlusherCore<V>>,
    config: FlusherConfig,
    started: OnceCell<()>,
    poll_task: parking_lot::Mutex<Option<JoinHandle<()>>>,
    shutdown: CancellationToken,
}

/// State shared between lookups and the periodic poll task
struct FlusherCore<V> {
    source: Arc<dyn RecordSource>,
    registry: Arc<dyn CacheRegistry>,
    codec: Arc<dyn DirectValueCodec<V>>,
    live: ArcSwap<OverrideGeneration>,
    prefix_cache: PrefixDirectCache<V>,
    /// Serializes poll cycles; readers never take it
    poll_lock: Mutex<()>,
    /// Millis of the last generation swap, 0 before the first one
    last_executed: AtomicU64,
}

impl<V> TableFlusher<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Fails if `config` does not validate, e.g. a zero poll interval.
    pub fn new(
        source: Arc<dyn RecordSource>,
        registry: Arc<dyn CacheRegistry>,
        codec: Arc<dyn DirectValueCodec<V>>,
        config: FlusherConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            core: Arc::new(FlusherCore {
                source,
                registry,
                codec,
                live: ArcSwap::from_pointee(OverrideGeneration::default()),
                prefix_cache: PrefixDirectCache::new(),
                poll_lock: Mutex::new(()),
                last_executed: AtomicU64::new(0),
            }),
            config,
            started: OnceCell::new(),
            poll_task: parking_lot::Mutex::new(None),
            shutdown: CancellationToken::new(),
        })
    }

    /// Record covering `key` in the live generation, starting the poller on
    /// first use. `None` means the key is not managed by the table.
    pub async fn match_key(
        &self,
        key: &str,
    ) -> Option<OverrideRecord> {
        self.ensure_started().await;
        self.core.live.load().find(key).cloned()
    }

    pub async fn is_key_enabled(
        &self,
        key: &str,
    ) -> bool {
        self.match_key(key).await.is_some()
    }

    /// Override value for `key`, if its record serves one.
    ///
    /// FULL records decode their whole blob. PREFIX records decode their blob
    /// once per version into a sub-key map and serve the entry for the part of
    /// `key` after the prefix and its separator.
    pub async fn direct_value(
        &self,
        key: &str,
    ) -> Result<Option<V>> {
        let record = match self.match_key(key).await {
            Some(record) if record.is_direct() => record,
            _ => return Ok(None),
        };

        match record.match_mode {
            MatchMode::Full => {
                let blob = match self.core.fetch_blob(&record).await? {
                    Some(blob) => blob,
                    None => return Ok(None),
                };
                self.core
                    .codec
                    .decode(&blob)
                    .map(Some)
                    .map_err(|reason| parse_failure(&record, reason))
            }
            MatchMode::Prefix => {
                let Some(sub_key) = sub_key_of(key, &record.cache_key) else {
                    debug!(key, "prefix record queried by its own key, no sub-key");
                    return Ok(None);
                };
                let core = &self.core;
                let parsed = core
                    .prefix_cache
                    .get_or_parse(&record, || core.load_prefix_blob(&record))
                    .await?;
                Ok(parsed.get(sub_key).cloned())
            }
        }
    }

    /// Runs one poll cycle now. Serialized with the periodic task.
    pub async fn poll_once(&self) -> Result<PollOutcome> {
        self.core.poll_once().await
    }

    /// Starts the poller without waiting for a lookup
    pub async fn start(&self) {
        self.ensure_started().await;
    }

    pub fn is_started(&self) -> bool {
        self.started.initialized()
    }

    /// Stops the periodic task and waits for it to exit
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let handle = self.poll_task.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("flusher poll task ended abnormally: {:?}", e);
            }
        }
    }

    /// The live generation
    pub fn generation(&self) -> Arc<OverrideGeneration> {
        self.core.live.load_full()
    }

    /// Wall clock millis of the last generation swap
    pub fn last_executed(&self) -> Option<u64> {
        match self.core.last_executed.load(Ordering::Acquire) {
            0 => None,
            millis => Some(millis),
        }
    }

    pub fn prefix_cache(&self) -> &PrefixDirectCache<V> {
        &self.core.prefix_cache
    }

    pub fn config(&self) -> &FlusherConfig {
        &self.config
    }

    async fn ensure_started(&self) {
        self.started
            .get_or_init(|| async {
                info!(interval = ?self.config.poll_interval(), "starting override table poller");
                if let Err(e) = self.core.poll_once().await {
                    warn!("initial override poll failed, retrying on next tick: {:?}", e);
                }
                self.spawn_poll_loop();
            })
            .await;
    }

    fn spawn_poll_loop(&self) {
        let core = self.core.clone();
        let token = self.shutdown.clone();
        let period = self.config.poll_interval();

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        info!("override table poller stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = core.poll_once().await {
                            warn!("override poll failed, keeping previous generation: {:?}", e);
                        }
                    }
                }
            }
        });

        *self.poll_task.lock() = Some(handle);
    }
}

impl<V> Drop for TableFlusher<V> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl<V> FlusherCore<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn poll_once(&self) -> Result<PollOutcome> {
        let _guard = self.poll_lock.lock().await;

        let polled = match self.source.query_all_records().await {
            Ok(records) => records,
            Err(e) => {
                FLUSHER_POLLS.with_label_values(&["failed"]).inc();
                return Err(match e {
                    Error::Flusher(FlusherError::SourceQueryFailure(_)) => e,
                    other => FlusherError::SourceQueryFailure(other.to_string()).into(),
                });
            }
        };

        let current = self.live.load_full();
        if current.same_records(&polled) {
            debug!(records = polled.len(), "override table unchanged");
            FLUSHER_POLLS.with_label_values(&["unchanged"]).inc();
            return Ok(PollOutcome::Unchanged);
        }

        let changed = current.changed_records(&polled);
        let records = polled.len();
        self.live.store(Arc::new(OverrideGeneration::new(polled)));
        self.last_executed.store(timestamp_millis(), Ordering::Release);

        let flushed_keys = self.invalidate(&changed);
        FLUSHER_POLLS.with_label_values(&["changed"]).inc();
        info!(
            records,
            changed = changed.len(),
            flushed = flushed_keys.len(),
            "override generation swapped"
        );

        Ok(PollOutcome::Changed {
            changed_keys: changed.into_iter().map(|r| r.cache_key).collect(),
            flushed_keys,
        })
    }

    /// Flushes every engine entry covered by a changed record and drops the
    /// memoized blobs of changed prefix records.
    fn invalidate(
        &self,
        changed: &[OverrideRecord],
    ) -> Vec<String> {
        if changed.is_empty() {
            return Vec::new();
        }

        let flushed: Vec<String> = self
            .registry
            .cached_keys()
            .into_iter()
            .filter(|key| changed.iter().any(|record| record.matches(key)))
            .collect();

        for key in &flushed {
            debug!(key, "flushing entry for changed override record");
            self.registry.flush_key(key);
        }

        for record in changed.iter().filter(|r| r.match_mode == MatchMode::Prefix) {
            self.prefix_cache.invalidate(&record.cache_key);
        }

        FLUSHED_KEYS.inc_by(flushed.len() as u64);
        flushed
    }

    async fn fetch_blob(
        &self,
        record: &OverrideRecord,
    ) -> Result<Option<Vec<u8>>> {
        self.source.fetch_blob(record).await.map_err(|e| {
            FlusherError::BlobFetchFailure {
                key: record.cache_key.clone(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    async fn load_prefix_blob(
        &self,
        record: &OverrideRecord,
    ) -> Result<HashMap<String, V>> {
        match self.fetch_blob(record).await? {
            Some(blob) => self
                .codec
                .decode_map(&blob)
                .map_err(|reason| parse_failure(record, reason)),
            None => Ok(HashMap::new()),
        }
    }
}

fn parse_failure(
    record: &OverrideRecord,
    reason: String,
) -> Error {
    warn!(key = %record.cache_key, "malformed direct value: {}", reason);
    FlusherError::DirectValueParseFailure {
        key: record.cache_key.clone(),
        reason,
    }
    .into()
}
