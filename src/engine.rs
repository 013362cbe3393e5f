//! Engine context: the explicit owner of every resource setting.
//!
//! Nothing in this crate reads ambient global state. An [`Engine`] carries
//! the pool budget, the shared [`ResultLimit`], the smart cache strategy and
//! the executor queue size, and hands out components wired to them.

use std::hash::Hash;

use tracing::debug;

use crate::buffer::{ResultLimit, TupleBuffer};
use crate::config::EngineConfig;
use crate::executor::{CallerRunsExecutor, DEFAULT_QUEUE_CAPACITY};
use crate::pool::{CachePool, Cacheable};
use crate::smart::{SmartCache, StrategyKind};
use crate::{CubeError, Result};

/// Resource context for one embedded evaluator.
#[derive(Debug, Clone)]
pub struct Engine {
    max_pool_cost: u64,
    result_limit: ResultLimit,
    strategy: StrategyKind,
    executor_queue_capacity: usize,
}

impl Engine {
    /// Create a new builder for configuring the engine.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Engine configured from a loaded [`EngineConfig`].
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        EngineBuilder::from_config(config).build()
    }

    /// A fresh, empty cache pool with the engine's cost budget.
    ///
    /// Pools are not synchronized; create one per worker or guard it.
    pub fn cache_pool<C: Cacheable + ?Sized>(&self) -> CachePool<C> {
        CachePool::new(self.max_pool_cost)
    }

    /// A fresh smart cache using the engine's strategy.
    pub fn smart_cache<K, V>(&self) -> SmartCache<K, V>
    where
        K: Hash + Eq + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        SmartCache::from_kind(&self.strategy)
    }

    /// A tuple buffer bound to the engine's result limit.
    pub fn tuple_buffer<M: Clone>(
        &self,
        arity: usize,
        initial_capacity: usize,
    ) -> Result<TupleBuffer<M>> {
        TupleBuffer::with_limit(arity, initial_capacity, self.result_limit.clone())
    }

    /// Start a caller-runs executor with the engine's queue size.
    pub fn executor(&self) -> Result<CallerRunsExecutor> {
        CallerRunsExecutor::new(self.executor_queue_capacity)
    }

    /// Handle to the shared result limit; `set` on it affects every buffer
    /// this engine has created.
    pub fn result_limit(&self) -> &ResultLimit {
        &self.result_limit
    }

    pub fn max_pool_cost(&self) -> u64 {
        self.max_pool_cost
    }

    pub fn strategy(&self) -> &StrategyKind {
        &self.strategy
    }

    pub fn executor_queue_capacity(&self) -> usize {
        self.executor_queue_capacity
    }
}

/// Builder for [`Engine`].
#[derive(Debug, Clone)]
pub struct EngineBuilder {
    max_pool_cost: u64,
    result_limit: ResultLimit,
    strategy: StrategyKind,
    executor_queue_capacity: usize,
}

impl EngineBuilder {
    pub fn new() -> Self {
        let defaults = EngineConfig::default();
        Self {
            max_pool_cost: defaults.pool.max_cost,
            result_limit: ResultLimit::unbounded(),
            strategy: StrategyKind::default(),
            executor_queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    /// Start from the values in `config`.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            max_pool_cost: config.pool.max_cost,
            result_limit: ResultLimit::new(config.limits.result_limit),
            strategy: config.cache.strategy_kind(),
            executor_queue_capacity: config.executor.queue_capacity,
        }
    }

    /// Total pool cost above which unpinning triggers eviction.
    pub fn max_pool_cost(mut self, max_cost: u64) -> Self {
        self.max_pool_cost = max_cost;
        self
    }

    /// Maximum tuples per materialized result; 0 or negative disables it.
    pub fn result_limit(mut self, limit: i64) -> Self {
        self.result_limit = ResultLimit::new(limit);
        self
    }

    /// Share an existing limit handle, e.g. with another engine.
    pub fn shared_result_limit(mut self, limit: ResultLimit) -> Self {
        self.result_limit = limit;
        self
    }

    /// Backing strategy for smart caches.
    pub fn cache_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = strategy;
        self
    }

    /// Jobs the executor queues before callers run them inline.
    pub fn executor_queue_capacity(mut self, capacity: usize) -> Self {
        self.executor_queue_capacity = capacity;
        self
    }

    /// Build the engine.
    pub fn build(self) -> Result<Engine> {
        if self.executor_queue_capacity == 0 {
            return Err(CubeError::Configuration(
                "executor queue capacity must be positive".to_string(),
            ));
        }
        if let StrategyKind::Soft(soft) = &self.strategy {
            if soft.max_entries == 0 {
                return Err(CubeError::Configuration(
                    "soft cache max_entries must be positive".to_string(),
                ));
            }
        }

        debug!(
            max_pool_cost = self.max_pool_cost,
            result_limit = self.result_limit.get(),
            queue_capacity = self.executor_queue_capacity,
            "built engine"
        );
        Ok(Engine {
            max_pool_cost: self.max_pool_cost,
            result_limit: self.result_limit,
            strategy: self.strategy,
            executor_queue_capacity: self.executor_queue_capacity,
        })
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
