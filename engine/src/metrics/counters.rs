use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Minimal counters for operational visibility.
///
/// Cloning shares the underlying atomics, so one set can be handed to every
/// pipeline worker and read once at the end of a run.
#[derive(Clone, Default, Debug)]
pub struct Counters {
    pub ticks: Arc<AtomicU64>,
    pub out_of_order: Arc<AtomicU64>,

    pub candidates: Arc<AtomicU64>,
    pub suppressed_refractory: Arc<AtomicU64>,

    // pending resolutions
    pub confirmed: Arc<AtomicU64>,
    pub rejected: Arc<AtomicU64>,
    pub undecidable: Arc<AtomicU64>,
    pub evicted: Arc<AtomicU64>,
    pub unresolved_at_end: Arc<AtomicU64>,

    pub sink_errors: Arc<AtomicU64>,
}

/// Plain copy of [`Counters`] at one instant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CountersSnapshot {
    pub ticks: u64,
    pub out_of_order: u64,
    pub candidates: u64,
    pub suppressed_refractory: u64,
    pub confirmed: u64,
    pub rejected: u64,
    pub undecidable: u64,
    pub evicted: u64,
    pub unresolved_at_end: u64,
    pub sink_errors: u64,
}

pub(crate) fn incr(c: &AtomicU64) {
    c.fetch_add(1, Ordering::Relaxed);
}

impl Counters {
    pub fn snapshot(&self) -> CountersSnapshot {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        CountersSnapshot {
            ticks: get(&self.ticks),
            out_of_order: get(&self.out_of_order),
            candidates: get(&self.candidates),
            suppressed_refractory: get(&self.suppressed_refractory),
            confirmed: get(&self.confirmed),
            rejected: get(&self.rejected),
            undecidable: get(&self.undecidable),
            evicted: get(&self.evicted),
            unresolved_at_end: get(&self.unresolved_at_end),
            sink_errors: get(&self.sink_errors),
        }
    }
}
