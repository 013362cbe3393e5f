//! cubecache - resource-bounded caches and buffers for OLAP evaluators
//!
//! An embeddable multidimensional query engine has to keep its derived,
//! expensive-to-recompute structures bounded in memory while serving many
//! analytical queries at once. This crate provides the pieces an evaluator
//! builds that on:
//!
//! - [`CachePool`] — cost/score-based pinning pool with lazy eviction.
//! - [`SmartCache`] — thread-safe memoization facade over a strong or a
//!   soft (reclaimable) backing strategy.
//! - [`TupleBuffer`] — columnar tuple list that fails loudly once a result
//!   grows past the configured [`ResultLimit`].
//! - [`CallerRunsExecutor`] — single-worker queue that makes callers run
//!   work themselves when saturated.
//!
//! All of them are handed out by an [`Engine`], which owns the settings.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use cubecache::{Engine, Tracked, fingerprint};
//!
//! fn main() -> cubecache::Result<()> {
//!     let engine = Engine::builder()
//!         .max_pool_cost(1_000)
//!         .result_limit(10_000)
//!         .build()?;
//!
//!     // Cost-accounted artifacts stay resident while pinned.
//!     let mut pool = engine.cache_pool();
//!     let segment = Arc::new(Tracked::new(vec![1.0_f64; 64], 64));
//!     pool.pin(&segment);
//!     pool.unpin(&segment);
//!
//!     // Memoize per-fragment computations by fingerprint.
//!     let cache = engine.smart_cache::<u64, Arc<Vec<f64>>>();
//!     let key = fingerprint(&("Sales", "[Time].[2024]"));
//!     let totals = cache.get_or_insert_with(key, || Arc::new(vec![42.0]));
//!     assert_eq!(totals[0], 42.0);
//!
//!     // Materialize a result under the engine's limit.
//!     let mut tuples = engine.tuple_buffer(2, 16)?;
//!     tuples.add_tuple(&["[Store].[USA]", "[Time].[2024]"])?;
//!     assert_eq!(tuples.len(), 1);
//!     Ok(())
//! }
//! ```

pub mod buffer;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod pool;
pub mod smart;
pub mod telemetry;

// Re-export main types at crate root
pub use buffer::{ResultLimit, TupleBuffer};
pub use config::EngineConfig;
pub use engine::{Engine, EngineBuilder};
pub use error::{CubeError, Result};
pub use executor::{CallerRunsExecutor, Submission};
pub use pool::{CachePool, Cacheable, Tracked};
pub use smart::{
    CacheStrategy, SmartCache, SoftConfig, SoftStrategy, StrategyKind, StrongStrategy,
    fingerprint,
};

/// Package version from Cargo.toml.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");
