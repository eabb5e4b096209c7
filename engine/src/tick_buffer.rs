use std::collections::VecDeque;
use std::ops::{Bound, RangeBounds};

use corelib::models::Tick;

/// Fixed-capacity ring of recent ticks for one symbol.
///
/// Ticks are kept in arrival order, which the pipeline guarantees is
/// non-decreasing in `ts`. When full, the oldest tick is evicted and its
/// timestamp is remembered so callers can tell whether a time window they
/// are about to read is still complete.
#[derive(Debug)]
pub struct TickBuffer {
    ticks: VecDeque<Tick>,
    capacity: usize,
    /// Timestamp of the most recently evicted tick.
    evicted_through: Option<i64>,
}

impl TickBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            ticks: VecDeque::with_capacity(capacity),
            capacity,
            evicted_through: None,
        }
    }

    /// Appends a tick, evicting (and returning) the oldest one if full.
    pub fn push(&mut self, tick: Tick) -> Option<Tick> {
        let evicted = if self.ticks.len() == self.capacity {
            let old = self.ticks.pop_front();
            if let Some(t) = &old {
                self.evicted_through = Some(t.ts);
            }
            old
        } else {
            None
        };

        self.ticks.push_back(tick);
        evicted
    }

    /// Ticks whose timestamp falls inside `range`, oldest first.
    pub fn window<R: RangeBounds<i64>>(&self, range: R) -> impl Iterator<Item = &Tick> {
        let start = match range.start_bound() {
            Bound::Included(&lo) => self.ticks.partition_point(|t| t.ts < lo),
            Bound::Excluded(&lo) => self.ticks.partition_point(|t| t.ts <= lo),
            Bound::Unbounded => 0,
        };
        let end = match range.end_bound() {
            Bound::Included(&hi) => self.ticks.partition_point(|t| t.ts <= hi),
            Bound::Excluded(&hi) => self.ticks.partition_point(|t| t.ts < hi),
            Bound::Unbounded => self.ticks.len(),
        };

        self.ticks.range(start..end.max(start))
    }

    /// True if an evicted tick had `ts > after`, i.e. the buffer no longer
    /// holds everything from `after` (exclusive) onwards.
    pub fn evicted_after(&self, after: i64) -> bool {
        self.evicted_through.is_some_and(|ts| ts > after)
    }

    pub fn evicted_through(&self) -> Option<i64> {
        self.evicted_through
    }

    pub fn latest(&self) -> Option<&Tick> {
        self.ticks.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tick> + '_ {
        self.ticks.iter()
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
