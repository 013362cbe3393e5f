//! Adjustable result-size limit shared by tuple buffers.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Maximum number of tuples a result may grow to.
///
/// A cheap, cloneable handle: every clone reads and writes the same value,
/// so raising or lowering the limit affects all buffers created from it at
/// their next growth check. Zero or negative disables the check.
#[derive(Debug, Clone, Default)]
pub struct ResultLimit {
    value: Arc<AtomicI64>,
}

impl ResultLimit {
    /// A limit of `limit` tuples. Zero or negative means unbounded.
    pub fn new(limit: i64) -> Self {
        Self {
            value: Arc::new(AtomicI64::new(limit)),
        }
    }

    /// A limit that never trips.
    pub fn unbounded() -> Self {
        Self::new(0)
    }

    /// Current limit.
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }

    /// Change the limit for every holder of this handle.
    pub fn set(&self, limit: i64) {
        self.value.store(limit, Ordering::Relaxed);
    }

    /// Whether the check is active.
    pub fn is_enabled(&self) -> bool {
        self.get() > 0
    }

    /// Whether a result of `size` tuples would exceed the limit.
    pub fn exceeded_by(&self, size: usize) -> Option<i64> {
        let limit = self.get();
        (limit > 0 && size as u64 > limit as u64).then_some(limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_and_negative_disable() {
        assert!(!ResultLimit::new(0).is_enabled());
        assert!(!ResultLimit::new(-5).is_enabled());
        assert_eq!(ResultLimit::new(-5).exceeded_by(usize::MAX), None);
    }

    #[test]
    fn clones_share_value() {
        let limit = ResultLimit::new(10);
        let other = limit.clone();
        other.set(3);
        assert_eq!(limit.get(), 3);
        assert_eq!(limit.exceeded_by(4), Some(3));
        assert_eq!(limit.exceeded_by(3), None);
    }
}
