//! Bounded, columnar tuple storage for result materialization.
//!
//! A [`TupleBuffer`] holds fixed-arity tuples in one vector per column.
//! Columns grow geometrically (capacity doubles), so appends cost amortized
//! constant time and the number of reallocations is logarithmic in the
//! number of tuples.
//!
//! Once a buffer holds more tuples than its initial capacity, every append
//! checks the [`ResultLimit`] it was built with. Exceeding a positive limit
//! fails with [`CubeError::ResourceLimitExceeded`]; the phase building the
//! result must abandon it. The limit is never turned into silent truncation.

mod limit;

pub use limit::ResultLimit;

use tracing::{trace, warn};

use crate::telemetry;
use crate::{CubeError, Result};

/// Ordered, index-addressable list of fixed-arity tuples.
///
/// Not synchronized: owned by the single phase accumulating a result.
#[derive(Debug, Clone)]
pub struct TupleBuffer<M> {
    columns: Vec<Vec<M>>,
    initial_capacity: usize,
    capacity: usize,
    len: usize,
    limit: ResultLimit,
}

impl<M: Clone> TupleBuffer<M> {
    /// Create a buffer with no result limit.
    ///
    /// Both `arity` and `initial_capacity` must be positive.
    pub fn new(arity: usize, initial_capacity: usize) -> Result<Self> {
        Self::with_limit(arity, initial_capacity, ResultLimit::unbounded())
    }

    /// Create a buffer that enforces `limit` beyond its initial capacity.
    pub fn with_limit(arity: usize, initial_capacity: usize, limit: ResultLimit) -> Result<Self> {
        if arity == 0 {
            return Err(CubeError::InvalidInput(
                "tuple arity must be positive".to_string(),
            ));
        }
        if initial_capacity == 0 {
            return Err(CubeError::InvalidInput(
                "initial capacity must be positive".to_string(),
            ));
        }

        let mut columns = Vec::new();
        columns
            .try_reserve_exact(arity)
            .map_err(|e| CubeError::InvalidInput(format!("arity {arity} cannot be allocated: {e}")))?;
        for _ in 0..arity {
            let mut column = Vec::new();
            column.try_reserve_exact(initial_capacity).map_err(|e| {
                CubeError::InvalidInput(format!(
                    "initial capacity {initial_capacity} cannot be allocated: {e}"
                ))
            })?;
            columns.push(column);
        }
        Ok(Self {
            columns,
            initial_capacity,
            capacity: initial_capacity,
            len: 0,
            limit,
        })
    }

    /// Append one tuple.
    ///
    /// # Errors
    ///
    /// - [`CubeError::ArityMismatch`] if `members.len()` differs from the arity.
    /// - [`CubeError::ResourceLimitExceeded`] if the buffer is past its initial
    ///   capacity and the new size exceeds the configured limit, or if the
    ///   storage cannot grow any further. Discard the buffer after this error.
    pub fn add_tuple(&mut self, members: &[M]) -> Result<()> {
        if members.len() != self.columns.len() {
            return Err(CubeError::ArityMismatch {
                expected: self.columns.len(),
                actual: members.len(),
            });
        }

        let new_len = self.len + 1;
        if new_len > self.initial_capacity {
            if let Some(limit) = self.limit.exceeded_by(new_len) {
                warn!(size = new_len, limit, "tuple buffer exceeded result limit");
                metrics::counter!(telemetry::RESULT_LIMIT_EXCEEDED_TOTAL).increment(1);
                return Err(CubeError::ResourceLimitExceeded {
                    size: new_len,
                    limit,
                });
            }
        }
        if new_len > self.capacity {
            self.grow(new_len)?;
        }

        for (column, member) in self.columns.iter_mut().zip(members) {
            column.push(member.clone());
        }
        self.len = new_len;
        Ok(())
    }

    /// The tuple at `index`.
    pub fn get(&self, index: usize) -> Result<Vec<M>> {
        self.check_index(index)?;
        Ok(self.columns.iter().map(|c| c[index].clone()).collect())
    }

    /// A single member of the tuple at `index`.
    pub fn member(&self, index: usize, column: usize) -> Result<&M> {
        self.check_index(index)?;
        self.columns
            .get(column)
            .map(|c| &c[index])
            .ok_or(CubeError::IndexOutOfRange {
                index: column,
                len: self.columns.len(),
            })
    }

    /// All members in one column, in tuple order.
    pub fn column(&self, column: usize) -> Option<&[M]> {
        self.columns.get(column).map(Vec::as_slice)
    }

    /// Tuples in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = Vec<M>> + '_ {
        (0..self.len).map(move |i| self.columns.iter().map(|c| c[i].clone()).collect())
    }

    /// Number of tuples appended.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Members per tuple.
    pub fn arity(&self) -> usize {
        self.columns.len()
    }

    /// Tuples the buffer can hold before the next reallocation.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.len {
            return Err(CubeError::IndexOutOfRange {
                index,
                len: self.len,
            });
        }
        Ok(())
    }

    fn grow(&mut self, min_capacity: usize) -> Result<()> {
        let new_capacity = self.capacity.saturating_mul(2).max(min_capacity);
        for column in &mut self.columns {
            if let Err(e) = column.try_reserve_exact(new_capacity - column.len()) {
                warn!(
                    size = min_capacity,
                    capacity = self.capacity,
                    error = %e,
                    "tuple buffer cannot grow"
                );
                return Err(CubeError::ResourceLimitExceeded {
                    size: min_capacity,
                    limit: i64::try_from(self.capacity).unwrap_or(i64::MAX),
                });
            }
        }
        trace!(
            from = self.capacity,
            to = new_capacity,
            arity = self.columns.len(),
            "grew tuple buffer"
        );
        self.capacity = new_capacity;
        Ok(())
    }
}
