use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tracing_test::traced_test;

use super::*;
use crate::ComputeError;
use crate::EngineConfig;
use crate::Error;
use crate::MemSnapshotStore;
use crate::MockSnapshotStore;
use crate::SnapshotError;
use crate::SnapshotMissPolicy;
use crate::SnapshotStore;

const TIMEOUT: Duration = Duration::from_millis(100);

fn engine_with(
    store: Arc<MemSnapshotStore<i64>>,
    policy: SnapshotMissPolicy,
) -> ComputeEngine<i64> {
    ComputeEngine::new(
        store,
        EngineConfig {
            compute_timeout_ms: TIMEOUT.as_millis() as u64,
            snapshot_miss_policy: policy,
        },
    )
}

fn engine() -> (ComputeEngine<i64>, Arc<MemSnapshotStore<i64>>) {
    let store = Arc::new(MemSnapshotStore::new());
    (engine_with(store.clone(), SnapshotMissPolicy::KeepWaiting), store)
}

/// Producer that counts its invocations and answers `value` after `delay`
fn counted(
    calls: &Arc<AtomicUsize>,
    value: i64,
    delay: Duration,
) -> impl FnOnce() -> BoxFuture<'static, std::result::Result<i64, ProducerError>> + Send + 'static {
    let calls = calls.clone();
    move || {
        Box::pin(async move {
            calls.fetch_add(1, Ordering::SeqCst);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            Ok(value)
        })
    }
}

#[tokio::test]
#[traced_test]
async fn test_ready_entry_is_served_without_producer() {
    let (engine, _) = engine();
    let calls = Arc::new(AtomicUsize::new(0));

    assert_eq!(engine.get("k", counted(&calls, 1, Duration::ZERO), TIMEOUT).await.unwrap(), 1);
    assert_eq!(engine.get("k", counted(&calls, 2, Duration::ZERO), TIMEOUT).await.unwrap(), 1);

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(engine.status("k"), Some(EntryStatus::Ready));
}

#[tokio::test]
async fn test_flush_forces_recompute() {
    let (engine, _) = engine();
    let calls = Arc::new(AtomicUsize::new(0));

    engine.get("k", counted(&calls, 1, Duration::ZERO), TIMEOUT).await.unwrap();
    assert!(engine.flush("k"));
    assert_eq!(engine.status("k"), Some(EntryStatus::Empty));
    assert!(!engine.flush("never-seen"));

    assert_eq!(engine.get("k", counted(&calls, 2, Duration::ZERO), TIMEOUT).await.unwrap(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
#[traced_test]
async fn test_slow_producer_falls_back_to_snapshot() {
    let (engine, store) = engine();
    store.save("k", 1).await.unwrap();
    let calls = Arc::new(AtomicUsize::new(0));

    let value = engine
        .get("k", counted(&calls, 2, Duration::from_millis(500)), TIMEOUT)
        .await
        .unwrap();
    assert_eq!(value, 1);
    // the caller gave up, the producer did not
    assert_eq!(engine.status("k"), Some(EntryStatus::Computing));

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(engine.status("k"), Some(EntryStatus::Ready));
    assert_eq!(engine.get("k", counted(&calls, 3, Duration::ZERO), TIMEOUT).await.unwrap(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(store.read("k").await.unwrap(), Some(2));
}

#[tokio::test(start_paused = true)]
async fn test_joined_callers_honor_their_own_timeouts() {
    let (engine, store) = engine();
    let engine = Arc::new(engine);
    store.save("k", 1).await.unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let started = tokio::time::Instant::now();

    let impatient = {
        let engine = engine.clone();
        let producer = counted(&calls, 2, Duration::from_millis(300));
        tokio::spawn(async move {
            let value = engine.get("k", producer, TIMEOUT).await;
            (value, started.elapsed())
        })
    };
    let patient = {
        let engine = engine.clone();
        let producer = counted(&calls, 3, Duration::ZERO);
        tokio::spawn(async move {
            let value = engine.get("k", producer, Duration::from_secs(1)).await;
            (value, started.elapsed())
        })
    };

    let (value, waited) = impatient.await.unwrap();
    assert_eq!(value.unwrap(), 1);
    assert!(waited < Duration::from_millis(300));

    let (value, waited) = patient.await.unwrap();
    assert_eq!(value.unwrap(), 2);
    assert!(waited >= Duration::from_millis(300));

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(engine.peek("k"), Some(2));
}

#[tokio::test(start_paused = true)]
async fn test_keep_waiting_without_snapshot() {
    let (engine, _) = engine();
    let calls = Arc::new(AtomicUsize::new(0));

    let value = engine
        .get("k", counted(&calls, 5, Duration::from_millis(300)), TIMEOUT)
        .await
        .unwrap();
    assert_eq!(value, 5);
}

#[tokio::test(start_paused = true)]
async fn test_fail_policy_without_snapshot() {
    let store = Arc::new(MemSnapshotStore::new());
    let engine = engine_with(store, SnapshotMissPolicy::Fail);
    let calls = Arc::new(AtomicUsize::new(0));

    let result = engine
        .get("k", counted(&calls, 5, Duration::from_millis(300)), TIMEOUT)
        .await;
    match result {
        Err(Error::Compute(ComputeError::SnapshotUnavailable { key, waited })) => {
            assert_eq!(key, "k");
            assert_eq!(waited, TIMEOUT);
        }
        other => panic!("unexpected result: {other:?}"),
    }

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(engine.peek("k"), Some(5));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_callers_share_one_producer() {
    let (engine, _) = engine();
    let engine = Arc::new(engine);
    let calls = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::with_capacity(1000);
    for _ in 0..1000 {
        let engine = engine.clone();
        let producer = counted(&calls, 9, Duration::from_millis(50));
        handles.push(tokio::spawn(async move {
            engine.get("hot", producer, Duration::from_secs(5)).await
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), 9);
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
#[traced_test]
async fn test_producer_failure_resets_entry() {
    let (engine, store) = engine();

    let result = engine
        .get(
            "k",
            || async { Err::<i64, ProducerError>("backend unavailable".into()) },
            TIMEOUT,
        )
        .await;
    match result {
        Err(Error::Compute(ComputeError::ProducerFailure { key, reason })) => {
            assert_eq!(key, "k");
            assert_eq!(reason, "backend unavailable");
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(engine.status("k"), Some(EntryStatus::Empty));
    assert!(store.is_empty());

    assert_eq!(engine.get("k", || async { Ok(4) }, TIMEOUT).await.unwrap(), 4);
}

#[tokio::test]
async fn test_panicking_producer_is_a_failure() {
    let (engine, _) = engine();

    let result = engine
        .get(
            "k",
            || async {
                if true {
                    panic!("producer bug");
                }
                Ok(0)
            },
            TIMEOUT,
        )
        .await;
    assert!(matches!(
        result,
        Err(Error::Compute(ComputeError::ProducerFailure { ref reason, .. })) if reason.contains("panicked")
    ));
    assert_eq!(engine.status("k"), Some(EntryStatus::Empty));
}

#[tokio::test(start_paused = true)]
async fn test_flush_during_computation_discards_result() {
    let (engine, _) = engine();
    let engine = Arc::new(engine);
    let calls = Arc::new(AtomicUsize::new(0));

    let waiter = {
        let engine = engine.clone();
        let producer = counted(&calls, 1, Duration::from_millis(200));
        tokio::spawn(async move { engine.get("k", producer, Duration::from_secs(1)).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(engine.status("k"), Some(EntryStatus::Computing));

    assert!(engine.flush("k"));
    // the waiter still receives the value it was waiting for
    assert_eq!(waiter.await.unwrap().unwrap(), 1);
    assert_eq!(engine.status("k"), Some(EntryStatus::Empty));
    assert_eq!(engine.peek("k"), None);

    assert_eq!(engine.get("k", counted(&calls, 2, Duration::ZERO), TIMEOUT).await.unwrap(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_success_is_persisted_to_snapshot() {
    let (engine, store) = engine();

    engine.get("k", || async { Ok(11) }, TIMEOUT).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1)).await;

    let record = store.record("k").unwrap();
    assert_eq!(record.value, 11);
    assert_eq!(record.key, "k");
}

#[tokio::test(start_paused = true)]
#[traced_test]
async fn test_snapshot_read_error_counts_as_missing() {
    let mut store = MockSnapshotStore::<i64>::new();
    store
        .expect_read()
        .times(1)
        .returning(|_| Err(SnapshotError::Backend("disk gone".to_string()).into()));
    store.expect_save().returning(|_, _| Ok(()));

    let engine = ComputeEngine::new(Arc::new(store), EngineConfig::default());
    let calls = Arc::new(AtomicUsize::new(0));

    let value = engine
        .get("k", counted(&calls, 3, Duration::from_millis(300)), TIMEOUT)
        .await
        .unwrap();
    assert_eq!(value, 3);
    assert!(logs_contain("failed to read snapshot"));
}

#[tokio::test]
async fn test_flush_all_keys_and_peek() {
    let (engine, _) = engine();
    assert!(engine.is_empty());

    for (key, value) in [("a", 1), ("b", 2)] {
        engine.get(key, move || async move { Ok(value) }, TIMEOUT).await.unwrap();
    }
    let mut keys = engine.keys();
    keys.sort();
    assert_eq!(keys, vec!["a", "b"]);
    assert_eq!(engine.peek("a"), Some(1));
    assert_eq!(engine.peek("missing"), None);

    assert_eq!(engine.flush_all(), 2);
    assert_eq!(engine.len(), 2);
    assert_eq!(engine.peek("a"), None);
    assert_eq!(engine.peek("b"), None);
}

#[tokio::test]
async fn test_default_timeout_comes_from_config() {
    let (engine, _) = engine();
    assert_eq!(engine.config().compute_timeout(), TIMEOUT);
    assert_eq!(engine.get_with_default_timeout("k", || async { Ok(8) }).await.unwrap(), 8);
}

#[test]
fn test_registry_view_matches_engine() {
    let (engine, _) = engine();
    let registry: &dyn CacheRegistry = &engine;
    assert!(registry.cached_keys().is_empty());
    assert!(!registry.flush_key("k"));
}
