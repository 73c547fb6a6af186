use lazy_static::lazy_static;
use prometheus::Encoder;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::Opts;
use prometheus::Registry;
use prometheus::TextEncoder;
use tracing::error;


lazy_static! {
    /// Engine lookups by outcome: `hit`, `miss`, `joined`
    pub static ref CACHE_LOOKUPS: IntCounterVec = IntCounterVec::new(
        Opts::new("snapcache_lookups", "Compute engine lookups by outcome"),
        &["outcome"]
    )
    .expect("metric can not be created");

    pub static ref SNAPSHOT_FALLBACKS: IntCounter = IntCounter::new(
        "snapcache_snapshot_fallbacks",
        "Callers served from the snapshot store after a timeout"
    )
    .expect("metric can not be created");

    pub static ref PRODUCER_FAILURES: IntCounter = IntCounter::new(
        "snapcache_producer_failures",
        "Producer executions that failed or panicked"
    )
    .expect("metric can not be created");

    /// Flusher polls by outcome: `unchanged`, `changed`, `failed`
    pub static ref FLUSHER_POLLS: IntCounterVec = IntCounterVec::new(
        Opts::new("snapcache_flusher_polls", "Flusher poll cycles by outcome"),
        &["outcome"]
    )
    .expect("metric can not be created");

    pub static ref FLUSHED_KEYS: IntCounter = IntCounter::new(
        "snapcache_flushed_keys",
        "Engine entries invalidated by the flusher"
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = {
        let registry = Registry::new();
        registry
            .register(Box::new(CACHE_LOOKUPS.clone()))
            .expect("collector can be registered");
        registry
            .register(Box::new(SNAPSHOT_FALLBACKS.clone()))
            .expect("collector can be registered");
        registry
            .register(Box::new(PRODUCER_FAILURES.clone()))
            .expect("collector can be registered");
        registry
            .register(Box::new(FLUSHER_POLLS.clone()))
            .expect("collector can be registered");
        registry
            .register(Box::new(FLUSHED_KEYS.clone()))
            .expect("collector can be registered");
        registry
    };
}

/// Renders every cache metric in the prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        error!("could not encode custom metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
