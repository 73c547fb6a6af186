use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use tracing::info;

use super::CacheOption;
use crate::build_snapshot_store;
use crate::CacheConfig;
use crate::ComputeEngine;
use crate::JsonCodec;
use crate::ProducerError;
use crate::RecordSource;
use crate::Result;
use crate::TableFlusher;

/// Entry point for cached calls.
///
/// Consults the override table first when a flusher is attached, then the
/// compute engine.
pub struct CacheContext<V> {
    engine: Arc<ComputeEngine<V>>,
    flusher: Option<Arc<TableFlusher<V>>>,
    config: CacheConfig,
}

impl<V> CacheContext<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(
        engine: Arc<ComputeEngine<V>>,
        config: CacheConfig,
    ) -> Self {
        Self {
            engine,
            flusher: None,
            config,
        }
    }

    /// Attaches an override flusher. It should invalidate `engine`.
    pub fn with_flusher(
        mut self,
        flusher: Arc<TableFlusher<V>>,
    ) -> Self {
        self.flusher = Some(flusher);
        self
    }

    /// Validates `config`, then builds the engine, its snapshot backend and,
    /// when a record source is given, a JSON override flusher.
    pub fn from_config(
        config: CacheConfig,
        source: Option<Arc<dyn RecordSource>>,
    ) -> Result<Self>
    where
        V: Serialize + DeserializeOwned,
    {
        let config = config.validate()?;
        let snapshot = build_snapshot_store::<V>(&config.snapshot)?;
        let engine = Arc::new(ComputeEngine::new(snapshot, config.engine.clone()));
        info!(backend = ?config.snapshot.backend, "cache context created");

        let context = Self::new(engine.clone(), config);
        Ok(match source {
            Some(source) => {
                let flusher =
                    TableFlusher::new(source, engine, Arc::new(JsonCodec), context.config.flusher.clone())?;
                context.with_flusher(Arc::new(flusher))
            }
            None => context,
        })
    }

    /// Direct override value for the option's key if one is configured,
    /// otherwise the engine's cached or computed value.
    pub async fn get<F, Fut>(
        &self,
        option: &CacheOption,
        producer: F,
    ) -> Result<V>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<V, ProducerError>> + Send + 'static,
    {
        let key = option.key();
        if let Some(flusher) = &self.flusher {
            if let Some(value) = flusher.direct_value(key).await? {
                debug!(key, "serving direct override value");
                return Ok(value);
            }
        }

        let timeout = option
            .timeout()
            .unwrap_or_else(|| self.config.engine.compute_timeout());
        self.engine.get(key, producer, timeout).await
    }

    pub fn flush(
        &self,
        key: &str,
    ) -> bool {
        self.engine.flush(key)
    }

    /// Stops the override poller, if any
    pub async fn shutdown(&self) {
        if let Some(flusher) = &self.flusher {
            flusher.shutdown().await;
        }
    }

    pub fn engine(&self) -> &Arc<ComputeEngine<V>> {
        &self.engine
    }

    pub fn flusher(&self) -> Option<&Arc<TableFlusher<V>>> {
        self.flusher.as_ref()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}
