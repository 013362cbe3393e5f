//! Property tests for [`CachePool`] cost accounting.
//!
//! Random sequences of register/pin/unpin/flush against a handful of
//! segments; the cost invariants must hold after every single call.

use std::sync::Arc;

use cubecache::{CachePool, Cacheable, Tracked};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Register(usize, usize),
    Pin(usize),
    Unpin(usize),
    Flush,
}

const OBJECTS: usize = 6;

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..OBJECTS, 0usize..3).prop_map(|(i, pins)| Op::Register(i, pins)),
        (0..OBJECTS).prop_map(Op::Pin),
        (0..OBJECTS).prop_map(Op::Unpin),
        Just(Op::Flush),
    ]
}

fn recount(pool: &CachePool<Tracked<usize>>) -> (u64, u64) {
    let mut total = 0;
    let mut pinned = 0;
    for object in pool.iter() {
        let cost = object.cost();
        total += cost;
        if pool.pin_count_of(object).unwrap_or(0) > 0 {
            pinned += cost;
        }
    }
    (total, pinned)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Property: pinned cost never exceeds total cost, and both match a
    /// recount of the registered entries after every call.
    #[test]
    fn prop_cost_accounting_holds(
        costs in prop::collection::vec(1u64..20, OBJECTS),
        max_cost in 0u64..60,
        ops in prop::collection::vec(op_strategy(), 1..80),
    ) {
        let objects: Vec<_> = costs
            .iter()
            .enumerate()
            .map(|(i, &c)| Arc::new(Tracked::new(i, c)))
            .collect();
        let mut pool = CachePool::new(max_cost);

        for op in ops {
            match op {
                Op::Register(i, pins) => {
                    pool.register(&objects[i], pins);
                }
                Op::Pin(i) => {
                    pool.pin(&objects[i]);
                }
                Op::Unpin(i) => {
                    pool.unpin(&objects[i]);
                }
                Op::Flush => {
                    pool.flush();
                }
            }

            prop_assert!(pool.pinned_cost() <= pool.total_cost());
            let (total, pinned) = recount(&pool);
            prop_assert_eq!(pool.total_cost(), total);
            prop_assert_eq!(pool.pinned_cost(), pinned);
        }
    }

    /// Property: after flush every remaining entry is pinned and the total
    /// equals the pinned cost from just before the flush.
    #[test]
    fn prop_flush_leaves_only_pinned(
        costs in prop::collection::vec(1u64..20, OBJECTS),
        ops in prop::collection::vec(op_strategy(), 0..40),
    ) {
        let objects: Vec<_> = costs
            .iter()
            .enumerate()
            .map(|(i, &c)| Arc::new(Tracked::new(i, c)))
            .collect();
        // Large budget so only flush removes anything.
        let mut pool = CachePool::new(u64::MAX);

        for op in ops {
            match op {
                Op::Register(i, pins) => { pool.register(&objects[i], pins); }
                Op::Pin(i) => { pool.pin(&objects[i]); }
                Op::Unpin(i) => { pool.unpin(&objects[i]); }
                Op::Flush => {}
            }
        }

        let pinned_before = pool.pinned_cost();
        pool.flush();
        prop_assert_eq!(pool.total_cost(), pinned_before);
        for object in pool.iter() {
            prop_assert!(pool.pin_count_of(object).unwrap_or(0) > 0);
        }
    }

    /// Property: releasing an entry's last pin while over budget strictly
    /// lowers the total cost (the released entry itself is a candidate).
    #[test]
    fn prop_last_unpin_over_budget_shrinks_total(
        costs in prop::collection::vec(1u64..20, OBJECTS),
        max_cost in 0u64..30,
        ops in prop::collection::vec(op_strategy(), 1..80),
    ) {
        let objects: Vec<_> = costs
            .iter()
            .enumerate()
            .map(|(i, &c)| Arc::new(Tracked::new(i, c)))
            .collect();
        let mut pool = CachePool::new(max_cost);

        for op in ops {
            match op {
                Op::Unpin(i) => {
                    let before = pool.total_cost();
                    let was_last_pin = pool.pin_count_of(&objects[i]) == Some(1);
                    pool.unpin(&objects[i]);
                    if was_last_pin && before > max_cost {
                        prop_assert!(pool.total_cost() < before);
                    }
                }
                Op::Register(i, pins) => { pool.register(&objects[i], pins); }
                Op::Pin(i) => { pool.pin(&objects[i]); }
                Op::Flush => { pool.flush(); }
            }
        }
    }
}
