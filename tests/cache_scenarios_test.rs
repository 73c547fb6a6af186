use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use snapcache::CacheConfig;
use snapcache::CacheContext;
use snapcache::CacheOption;
use snapcache::EntryStatus;
use snapcache::MemRecordSource;
use snapcache::OverrideRecord;
use snapcache::PollOutcome;
use snapcache::ProducerError;
use snapcache::SnapshotBackend;
use snapcache::utils::key_match::is_prefix_of;
use tempfile::tempdir;

fn config(backend: SnapshotBackend) -> CacheConfig {
    let mut config = CacheConfig::default();
    config.snapshot.backend = backend;
    config.engine.compute_timeout_ms = 100;
    config.flusher.poll_interval_ms = 60_000;
    config
}

type Producer = BoxFuture<'static, Result<String, ProducerError>>;

fn counting(
    calls: &Arc<AtomicUsize>,
    value: &'static str,
    delay: Duration,
) -> impl FnOnce() -> Producer + Send + 'static {
    let calls = calls.clone();
    move || {
        Box::pin(async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            Ok(value.to_string())
        })
    }
}

#[tokio::test]
async fn hit_does_not_call_producer_again_and_flush_recomputes() {
    let cache = CacheContext::<String>::from_config(config(SnapshotBackend::Memory), None).unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let option = CacheOption::new("user.42");

    let first = cache.get(&option, counting(&calls, "v1", Duration::ZERO)).await.unwrap();
    let second = cache.get(&option, counting(&calls, "v2", Duration::ZERO)).await.unwrap();
    assert_eq!(first, "v1");
    assert_eq!(second, "v1");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    assert!(cache.flush("user.42"));
    let third = cache.get(&option, counting(&calls, "v3", Duration::ZERO)).await.unwrap();
    assert_eq!(third, "v3");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn slow_producer_serves_file_snapshot_then_fresh_value() {
    let dir = tempdir().unwrap();
    let mut config = config(SnapshotBackend::File);
    config.snapshot.dir = dir.path().to_path_buf();
    let calls = Arc::new(AtomicUsize::new(0));

    // a previous process left a snapshot behind
    {
        let cache = CacheContext::<String>::from_config(config.clone(), None).unwrap();
        cache
            .get(&CacheOption::new("report"), counting(&calls, "old", Duration::ZERO))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    let cache = CacheContext::<String>::from_config(config, None).unwrap();
    let option = CacheOption::new("report").with_timeout(Duration::from_millis(50));

    let started = std::time::Instant::now();
    let value = cache
        .get(&option, counting(&calls, "new", Duration::from_millis(400)))
        .await
        .unwrap();
    assert_eq!(value, "old");
    assert!(started.elapsed() < Duration::from_millis(300));

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(cache.engine().status("report"), Some(EntryStatus::Ready));
    let value = cache
        .get(&option, counting(&calls, "unused", Duration::ZERO))
        .await
        .unwrap();
    assert_eq!(value, "new");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn prefix_boundary_rule() {
    assert!(is_prefix_of("A.B", "A"));
    assert!(is_prefix_of("A_1", "A"));
    assert!(is_prefix_of("A", "A"));
    assert!(!is_prefix_of("AB", "A"));
    assert!(!is_prefix_of("A1", "A"));
}

#[tokio::test]
async fn unchanged_version_never_invalidates() {
    let source = Arc::new(MemRecordSource::new(vec![OverrideRecord::prefix("svc", 3)]));
    let cache = CacheContext::<String>::from_config(config(SnapshotBackend::Memory), Some(source)).unwrap();
    let flusher = cache.flusher().unwrap().clone();
    let calls = Arc::new(AtomicUsize::new(0));

    cache
        .get(&CacheOption::new("svc.a"), counting(&calls, "a", Duration::ZERO))
        .await
        .unwrap();
    for _ in 0..5 {
        assert_eq!(flusher.poll_once().await.unwrap(), PollOutcome::Unchanged);
    }
    assert_eq!(cache.engine().peek("svc.a").as_deref(), Some("a"));
    cache.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn thousand_concurrent_gets_run_one_producer() {
    let cache = Arc::new(CacheContext::<String>::from_config(config(SnapshotBackend::Memory), None).unwrap());
    let calls = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..1000 {
        let cache = cache.clone();
        let producer = counting(&calls, "shared", Duration::from_millis(50));
        handles.push(tokio::spawn(async move {
            cache
                .get(&CacheOption::new("hot").with_timeout(Duration::from_secs(5)), producer)
                .await
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), "shared");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn version_bump_flushes_family_but_not_lookalike() {
    let source = Arc::new(MemRecordSource::new(vec![OverrideRecord::prefix("svc.op", 1)]));
    let cache =
        CacheContext::<String>::from_config(config(SnapshotBackend::Memory), Some(source.clone())).unwrap();
    let calls = Arc::new(AtomicUsize::new(0));

    for key in ["svc.op", "svc.operation"] {
        cache
            .get(&CacheOption::new(key), counting(&calls, "cached", Duration::ZERO))
            .await
            .unwrap();
    }

    source.bump_version("svc.op");
    cache.flusher().unwrap().poll_once().await.unwrap();

    assert_eq!(cache.engine().status("svc.op"), Some(EntryStatus::Empty));
    assert_eq!(cache.engine().peek("svc.operation").as_deref(), Some("cached"));
    cache.shutdown().await;
}
