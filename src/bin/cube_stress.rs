//! cube-stress — synthetic workload for the cubecache resource subsystem.
//!
//! Pins and releases cost-accounted segments, memoizes fragment results and
//! materializes tuple buffers on the caller-runs executor, then reports what
//! the pool, cache and result limit did.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use clap::Parser;
use tracing::{info, warn};

use cubecache::{Engine, EngineConfig, Submission, Tracked, fingerprint};

/// Drive the cache pool, smart cache and tuple buffers with a synthetic load.
#[derive(Parser)]
#[command(name = "cube-stress")]
#[command(version = cubecache::PKG_VERSION)]
#[command(about = "Synthetic workload for the cubecache resource subsystem")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Segments to register in the cache pool.
    #[arg(long, default_value_t = 1_000)]
    segments: usize,

    /// Segments kept pinned at any one time.
    #[arg(long, default_value_t = 8)]
    window: usize,

    /// Smart cache lookups to perform.
    #[arg(long, default_value_t = 1_000)]
    lookups: usize,

    /// Distinct fragment computations to memoize.
    #[arg(long, default_value_t = 97)]
    fragments: u64,

    /// Result phases to run on the executor.
    #[arg(long, default_value_t = 16)]
    phases: usize,

    /// Tuples materialized per phase.
    #[arg(long, default_value_t = 10_000)]
    tuples: usize,

    /// Override the configured result limit.
    #[arg(long, env = "CUBECACHE_RESULT_LIMIT")]
    result_limit: Option<i64>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = EngineConfig::load_or_default(args.config.as_deref())?;
    if let Some(limit) = args.result_limit {
        config.limits.result_limit = limit;
    }
    let engine = Engine::from_config(&config)?;

    info!(
        version = cubecache::PKG_VERSION,
        max_pool_cost = engine.max_pool_cost(),
        result_limit = engine.result_limit().get(),
        "cube-stress starting"
    );

    run_pool(&engine, args.segments, args.window.max(1));
    run_smart_cache(&engine, args.lookups, args.fragments.max(1));
    run_phases(&engine, args.phases, args.tuples)?;

    Ok(())
}

fn run_pool(engine: &Engine, segments: usize, window: usize) -> usize {
    let mut pool = engine.cache_pool();
    let mut pinned: VecDeque<Arc<Tracked<usize>>> = VecDeque::with_capacity(window + 1);

    for i in 0..segments {
        let segment = Arc::new(Tracked::new(i, 1 + (i as u64 % 17) * 4096));
        pool.pin(&segment);
        pinned.push_back(segment);
        if pinned.len() > window {
            if let Some(oldest) = pinned.pop_front() {
                pool.unpin(&oldest);
            }
        }
    }
    let resident = pool.len();
    for segment in pinned.drain(..) {
        pool.unpin(&segment);
    }
    let flushed = pool.flush();

    info!(
        segments,
        resident_before_release = resident,
        flushed,
        total_cost = pool.total_cost(),
        pinned_cost = pool.pinned_cost(),
        "cache pool run complete"
    );
    flushed
}

fn run_smart_cache(engine: &Engine, lookups: usize, fragments: u64) -> usize {
    let cache = engine.smart_cache::<u64, Arc<Vec<u64>>>();
    let computed = AtomicUsize::new(0);

    for i in 0..lookups as u64 {
        let fragment = i % fragments;
        let key = fingerprint(&("fragment", fragment));
        cache.get_or_insert_with(key, || {
            computed.fetch_add(1, Ordering::Relaxed);
            Arc::new((0..64).map(|v| v * fragment).collect())
        });
    }

    info!(
        strategy = cache.strategy_name(),
        lookups,
        computed = computed.load(Ordering::Relaxed),
        resident = cache.len(),
        "smart cache run complete"
    );
    computed.into_inner()
}

fn run_phases(engine: &Engine, phases: usize, tuples: usize) -> cubecache::Result<()> {
    let mut executor = engine.executor()?;
    let completed = Arc::new(AtomicUsize::new(0));
    let rejected = Arc::new(AtomicUsize::new(0));
    let mut inline = 0usize;

    for phase in 0..phases {
        let engine = engine.clone();
        let completed = Arc::clone(&completed);
        let rejected = Arc::clone(&rejected);
        let submission = executor.submit(move || {
            match materialize(&engine, phase, tuples) {
                Ok(()) => completed.fetch_add(1, Ordering::Relaxed),
                Err(e) => {
                    warn!(phase, error = %e, "result phase aborted");
                    rejected.fetch_add(1, Ordering::Relaxed)
                }
            };
        })?;
        if submission == Submission::RanInline {
            inline += 1;
        }
    }
    executor.shutdown();

    info!(
        phases,
        completed = completed.load(Ordering::Relaxed),
        rejected = rejected.load(Ordering::Relaxed),
        ran_inline = inline,
        "result phases complete"
    );
    Ok(())
}

fn materialize(engine: &Engine, phase: usize, tuples: usize) -> cubecache::Result<()> {
    let mut buffer = engine.tuple_buffer(2, 64)?;
    for i in 0..tuples {
        buffer.add_tuple(&[phase, i])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_are_independent_of_segments() {
        let args =
            Args::try_parse_from(["cube-stress", "--segments", "5", "--lookups", "40"]).unwrap();
        assert_eq!(args.segments, 5);
        assert_eq!(args.lookups, 40);
    }

    #[test]
    fn smart_cache_computes_each_fragment_once() {
        let engine = Engine::builder().build().unwrap();
        assert_eq!(run_smart_cache(&engine, 40, 7), 7);
        assert_eq!(run_smart_cache(&engine, 3, 7), 3);
    }

    #[test]
    fn pool_run_releases_every_window_segment() {
        let engine = Engine::builder().max_pool_cost(u64::MAX).build().unwrap();
        assert_eq!(run_pool(&engine, 20, 4), 20);
    }
}
