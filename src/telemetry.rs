//! Telemetry metric name constants.
//!
//! Centralised metric names for cubecache operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `cubecache_`. Counters end in `_total`,
//! gauges are named after the quantity they track.
//!
//! # Common labels
//!
//! - `reason` — why a pool entry was evicted: "lazy" or "flush"
//! - `strategy` — smart cache backing strategy: "strong" or "soft"
//! - `mode` — how an executor job ran: "queued" or "inline"

/// Total cache pool evictions.
///
/// Labels: `reason` ("lazy" | "flush").
pub const POOL_EVICTIONS_TOTAL: &str = "cubecache_pool_evictions_total";

/// Sum of the costs of all registered pool entries.
pub const POOL_TOTAL_COST: &str = "cubecache_pool_total_cost";

/// Sum of the costs of pinned pool entries.
pub const POOL_PINNED_COST: &str = "cubecache_pool_pinned_cost";

/// Total smart cache hits.
///
/// Labels: `strategy`.
pub const SMART_CACHE_HITS_TOTAL: &str = "cubecache_smart_cache_hits_total";

/// Total smart cache misses.
///
/// Labels: `strategy`.
pub const SMART_CACHE_MISSES_TOTAL: &str = "cubecache_smart_cache_misses_total";

/// Total tuple buffer appends rejected by the result limit.
pub const RESULT_LIMIT_EXCEEDED_TOTAL: &str = "cubecache_result_limit_exceeded_total";

/// Total jobs accepted by the caller-runs executor.
///
/// Labels: `mode` ("queued" | "inline").
pub const EXECUTOR_JOBS_TOTAL: &str = "cubecache_executor_jobs_total";
