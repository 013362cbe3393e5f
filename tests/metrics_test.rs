//! Tests for metrics integration.
//!
//! Uses `metrics_util::debugging::DebuggingRecorder` to capture and assert
//! on emitted metrics without needing a real exporter.

use std::sync::Arc;

use metrics_util::MetricKind;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};

use cubecache::telemetry;
use cubecache::{CachePool, ResultLimit, SmartCache, Tracked, TupleBuffer};

// ============================================================================
// Snapshot type alias for readability
// ============================================================================

type SnapshotVec = Vec<(
    metrics_util::CompositeKey,
    Option<metrics::Unit>,
    Option<metrics::SharedString>,
    DebugValue,
)>;

// ============================================================================
// Helpers
// ============================================================================

/// Sum all counter values matching a given metric name.
fn counter_total(snapshot: &SnapshotVec, name: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| key.kind() == MetricKind::Counter && key.key().name() == name)
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

/// Sum counter values for a metric name carrying a specific label.
fn labelled_counter(snapshot: &SnapshotVec, name: &str, label: &str, value: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| {
            key.kind() == MetricKind::Counter
                && key.key().name() == name
                && key
                    .key()
                    .labels()
                    .any(|l| l.key() == label && l.value() == value)
        })
        .map(|(_, _, _, v)| match v {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

/// Last value of a gauge.
fn gauge_value(snapshot: &SnapshotVec, name: &str) -> Option<f64> {
    snapshot
        .iter()
        .find(|(key, _, _, _)| key.kind() == MetricKind::Gauge && key.key().name() == name)
        .and_then(|(_, _, _, value)| match value {
            DebugValue::Gauge(v) => Some(v.into_inner()),
            _ => None,
        })
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn pool_records_evictions_and_costs() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        let mut pool = CachePool::new(5);
        let a = Arc::new(Tracked::new("a", 4));
        let b = Arc::new(Tracked::new("b", 4));
        let c = Arc::new(Tracked::new("c", 1));
        pool.pin(&a);
        pool.pin(&b);
        pool.unpin(&a); // 8 > 5, lazy eviction of a
        pool.register(&c, 0);
        pool.flush(); // c
    });

    let snapshot = snapshotter.snapshot().into_vec();

    assert_eq!(
        labelled_counter(&snapshot, telemetry::POOL_EVICTIONS_TOTAL, "reason", "lazy"),
        1
    );
    assert_eq!(
        labelled_counter(&snapshot, telemetry::POOL_EVICTIONS_TOTAL, "reason", "flush"),
        1
    );
    assert_eq!(gauge_value(&snapshot, telemetry::POOL_TOTAL_COST), Some(4.0));
    assert_eq!(gauge_value(&snapshot, telemetry::POOL_PINNED_COST), Some(4.0));
}

#[test]
fn smart_cache_records_hits_and_misses() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        let cache: SmartCache<u32, u32> = SmartCache::strong();
        cache.get(&1);
        cache.put(1, 10);
        cache.get(&1);
        cache.get(&1);
    });

    let snapshot = snapshotter.snapshot().into_vec();

    assert_eq!(
        labelled_counter(
            &snapshot,
            telemetry::SMART_CACHE_HITS_TOTAL,
            "strategy",
            "strong"
        ),
        2
    );
    assert_eq!(
        counter_total(&snapshot, telemetry::SMART_CACHE_MISSES_TOTAL),
        1
    );
}

#[test]
fn result_limit_trip_is_counted() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    let result = metrics::with_local_recorder(&recorder, || {
        let mut buf = TupleBuffer::with_limit(1, 1, ResultLimit::new(1))?;
        buf.add_tuple(&[0u8])?;
        buf.add_tuple(&[1u8])
    });
    assert!(result.is_err());

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(
        counter_total(&snapshot, telemetry::RESULT_LIMIT_EXCEEDED_TOTAL),
        1
    );
}

#[test]
fn metrics_are_noop_without_recorder() {
    // Verify no panics when no recorder is installed.
    let mut pool = CachePool::new(0);
    let a = Arc::new(Tracked::new((), 1));
    pool.pin(&a);
    pool.unpin(&a);
    assert!(pool.is_empty());
}
