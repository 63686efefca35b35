//! Batch accumulation
//!
//! Buffers canonical records up to a fixed capacity. The accumulator never
//! holds more than `capacity` records: the caller must flush the batch
//! returned by [`BatchAccumulator::push`] before pushing again.

use crate::models::CanonicalRecord;

/// Capacity-bounded buffer of canonical records.
#[derive(Debug)]
pub struct BatchAccumulator {
    records: Vec<CanonicalRecord>,
    capacity: usize,
}

impl BatchAccumulator {
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity > 0, "batch capacity must be non-zero");
        Self {
            records: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Append one record. Returns the full batch, drained atomically, when
    /// the capacity is reached.
    pub fn push(&mut self, record: CanonicalRecord) -> Option<Vec<CanonicalRecord>> {
        self.records.push(record);
        if self.records.len() >= self.capacity {
            let batch = std::mem::replace(&mut self.records, Vec::with_capacity(self.capacity));
            Some(batch)
        } else {
            None
        }
    }

    /// Drain whatever remains at end-of-stream. The final batch may be
    /// smaller than the capacity; an empty accumulator yields nothing.
    pub fn finish(self) -> Option<Vec<CanonicalRecord>> {
        if self.records.is_empty() {
            None
        } else {
            Some(self.records)
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldValue;

    fn record(n: i16) -> CanonicalRecord {
        CanonicalRecord::new(vec![FieldValue::Flag(n)])
    }

    #[test]
    fn test_push_drains_exactly_at_capacity() {
        let mut accumulator = BatchAccumulator::new(3);

        assert!(accumulator.push(record(1)).is_none());
        assert!(accumulator.push(record(2)).is_none());

        let batch = accumulator.push(record(3)).expect("batch at capacity");
        assert_eq!(batch.len(), 3);
        assert!(accumulator.is_empty());
    }

    #[test]
    fn test_size_never_exceeds_capacity() {
        let mut accumulator = BatchAccumulator::new(2);
        for i in 0..10 {
            assert!(accumulator.len() < 2);
            accumulator.push(record(i));
        }
    }

    #[test]
    fn test_finish_returns_partial_batch() {
        let mut accumulator = BatchAccumulator::new(10);
        accumulator.push(record(1));
        accumulator.push(record(2));

        let remainder = accumulator.finish().expect("partial batch");
        assert_eq!(remainder.len(), 2);
    }

    #[test]
    fn test_finish_on_empty_accumulator_yields_nothing() {
        let accumulator = BatchAccumulator::new(10);
        assert!(accumulator.finish().is_none());
    }

    #[test]
    fn test_batches_preserve_arrival_order() {
        let mut accumulator = BatchAccumulator::new(3);
        accumulator.push(record(1));
        accumulator.push(record(2));
        let batch = accumulator.push(record(3)).unwrap();

        let flags: Vec<_> = batch
            .iter()
            .map(|r| match r.get(0) {
                Some(FieldValue::Flag(n)) => *n,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(flags, vec![1, 2, 3]);
    }
}
