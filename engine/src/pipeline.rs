//! OnsetPipeline
//!
//! Drives every symbol's state machine over a single ordered tick stream:
//!
//! ```text
//! NORMAL ──candidate──▶ PENDING_CONFIRM ──confirmed──▶ REFRACTORY ──▶ NORMAL
//!                              └──────rejected / undecidable──────────▶ NORMAL
//! ```
//!
//! Per tick, in order:
//!   1. Reject out-of-order ticks (`ts` below the symbol's last `ts`).
//!   2. Append to the symbol's tick buffer.
//!   3. If the symbol's pending confirmation is due (`ts >= ready_at_ts`),
//!      evaluate it. A confirmation is emitted to the sink and opens the
//!      refractory window at the onset timestamp.
//!   4. With nothing pending and the refractory clock allowing it, run the
//!      candidate gate. A candidate becomes the symbol's pending confirmation.
//!
//! Confirmation is deferred by state, never by blocking: a pending item is
//! just a record with `ready_at_ts`, looked at again on each later tick of its
//! symbol. A pending item whose window never fills stays unresolved and is
//! reported by [`OnsetPipeline::finish`].
//!
//! Symbols never share state. Per-symbol data sits in dense vectors indexed
//! through a [`SymbolTable`].

use std::ops::Bound;

use common::logger::symbol_span;
use corelib::models::{Candidate, ConfirmedOnset, Indicator, Tick};
use tracing::{debug, info, warn};

use crate::arena::{SymbolId, SymbolTable};
use crate::config::OnsetConfig;
use crate::confirm::{ConfirmDetector, Confirmation, Rejection, mean};
use crate::error::{SinkError, TickError, Undecidable};
use crate::gate::CandidateGate;
use crate::metrics::counters::{Counters, incr};
use crate::refractory::RefractoryManager;
use crate::sink::OnsetSink;
use crate::tick_buffer::TickBuffer;

/// A candidate waiting for its confirm window to fill.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingConfirmation {
    pub candidate: Candidate,
    pub ready_at_ts: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymbolState {
    Normal,
    PendingConfirm,
    Refractory,
}

/// How a pending confirmation ended.
#[derive(Clone, Debug, PartialEq)]
pub enum Resolution {
    Confirmed(ConfirmedOnset),
    Rejected {
        candidate: Candidate,
        rejection: Rejection,
    },
    Undecidable {
        candidate: Candidate,
        reason: Undecidable,
    },
}

/// What one ingested tick caused.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickOutcome {
    /// Pending confirmation resolved on this tick.
    pub resolution: Option<Resolution>,
    /// Candidate raised by this tick.
    pub candidate: Option<Candidate>,
    /// Gate skipped because the symbol is in its refractory window.
    pub suppressed: bool,
}

impl TickOutcome {
    pub fn confirmed(&self) -> Option<&ConfirmedOnset> {
        match &self.resolution {
            Some(Resolution::Confirmed(onset)) => Some(onset),
            _ => None,
        }
    }
}

struct SymbolSlot {
    buffer: TickBuffer,
    last_ts: Option<i64>,
    pending: Option<PendingConfirmation>,
}

pub struct OnsetPipeline<S> {
    cfg: OnsetConfig,
    gate: CandidateGate,
    detector: ConfirmDetector,
    refractory: RefractoryManager,
    symbols: SymbolTable,
    slots: Vec<SymbolSlot>,
    sink: S,
    counters: Counters,
}

impl<S: OnsetSink> OnsetPipeline<S> {
    /// `cfg` is expected to be validated already (see [`OnsetConfig::load`]).
    pub fn new(cfg: OnsetConfig, sink: S) -> Self {
        Self::with_counters(cfg, sink, Counters::default())
    }

    pub fn with_counters(cfg: OnsetConfig, sink: S, counters: Counters) -> Self {
        Self {
            gate: CandidateGate::from_config(&cfg),
            detector: ConfirmDetector::new(cfg.confirm.clone()),
            refractory: RefractoryManager::new(),
            symbols: SymbolTable::new(),
            slots: Vec::new(),
            sink,
            counters,
            cfg,
        }
    }

    /// Feeds one tick through the pipeline.
    ///
    /// `OutOfOrder` leaves all state untouched. `Sink` is returned after the
    /// tick has been fully applied: the onset counts as confirmed and the
    /// refractory window is open, only the write failed. The error carries
    /// the tick's [`TickOutcome`], including any candidate it raised.
    pub fn ingest(&mut self, tick: Tick) -> Result<TickOutcome, TickError> {
        let _span = symbol_span(&tick.symbol).entered();

        let id = self.slot_for(&tick.symbol);
        let ts = tick.ts;

        let slot = &mut self.slots[id.index()];
        if let Some(last_ts) = slot.last_ts.filter(|last| ts < *last) {
            incr(&self.counters.out_of_order);
            warn!(ts, last_ts, "out-of-order tick rejected");
            return Err(TickError::OutOfOrder {
                symbol: tick.symbol,
                ts,
                last_ts,
            });
        }

        incr(&self.counters.ticks);
        slot.last_ts = Some(ts);
        slot.buffer.push(tick);

        let mut outcome = TickOutcome::default();
        let mut sink_err = None;

        if let Some(pending) = slot.pending.take_if(|p| ts >= p.ready_at_ts) {
            let resolution = self.resolve(id, pending);
            if let Resolution::Confirmed(onset) = &resolution {
                if let Err(e) = self.sink.emit(onset) {
                    incr(&self.counters.sink_errors);
                    sink_err = Some((onset.ts, e));
                }
            }
            outcome.resolution = Some(resolution);
        }

        let slot = &mut self.slots[id.index()];
        if slot.pending.is_none() {
            if !self.refractory.allow(id, ts) {
                incr(&self.counters.suppressed_refractory);
                outcome.suppressed = true;
            } else if let Some(candidate) = self.gate_latest(id) {
                let ready_at_ts = self.detector.ready_at(&candidate);
                incr(&self.counters.candidates);
                debug!(
                    ts,
                    ready_at_ts,
                    axes = ?candidate.evidence.axes_satisfied,
                    "candidate raised"
                );

                self.slots[id.index()].pending = Some(PendingConfirmation {
                    candidate: candidate.clone(),
                    ready_at_ts,
                });
                outcome.candidate = Some(candidate);
            }
        }

        match sink_err {
            Some((onset_ts, source)) => Err(TickError::Sink {
                symbol: self.symbols.name(id).to_owned(),
                ts: onset_ts,
                source,
                outcome: Box::new(outcome),
            }),
            None => Ok(outcome),
        }
    }

    /// Ends the stream: drops every unresolved pending confirmation (never
    /// emitted) and flushes the sink. Returns the dropped candidates.
    pub fn finish(&mut self) -> Result<Vec<Candidate>, SinkError> {
        let mut unresolved = Vec::new();

        for id in self.symbols.ids() {
            if let Some(p) = self.slots[id.index()].pending.take() {
                incr(&self.counters.unresolved_at_end);
                info!(
                    symbol = %self.symbols.name(id),
                    candidate_ts = p.candidate.ts,
                    ready_at_ts = p.ready_at_ts,
                    "stream ended before confirm window filled; candidate dropped"
                );
                unresolved.push(p.candidate);
            }
        }

        self.sink.flush()?;
        Ok(unresolved)
    }

    pub fn state(&self, symbol: &str) -> Option<SymbolState> {
        let id = self.symbols.get(symbol)?;
        let slot = &self.slots[id.index()];

        if slot.pending.is_some() {
            return Some(SymbolState::PendingConfirm);
        }
        match slot.last_ts {
            Some(ts) if !self.refractory.allow(id, ts) => Some(SymbolState::Refractory),
            _ => Some(SymbolState::Normal),
        }
    }

    pub fn pending(&self, symbol: &str) -> Option<&PendingConfirmation> {
        let id = self.symbols.get(symbol)?;
        self.slots[id.index()].pending.as_ref()
    }

    pub fn refractory_until(&self, symbol: &str) -> Option<i64> {
        self.refractory.until(self.symbols.get(symbol)?)
    }

    pub fn buffered(&self, symbol: &str) -> usize {
        self.symbols
            .get(symbol)
            .map_or(0, |id| self.slots[id.index()].buffer.len())
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    fn slot_for(&mut self, symbol: &str) -> SymbolId {
        let (id, created) = self.symbols.intern(symbol);
        if created {
            self.slots.push(SymbolSlot {
                buffer: TickBuffer::new(self.cfg.buffer.capacity),
                last_ts: None,
                pending: None,
            });
            debug!(%id, capacity = self.cfg.buffer.capacity, "symbol slot created");
        }
        id
    }

    fn resolve(&mut self, id: SymbolId, pending: PendingConfirmation) -> Resolution {
        let slot = &self.slots[id.index()];
        let candidate = pending.candidate;

        match self.detector.evaluate(&candidate, &slot.buffer) {
            Confirmation::Confirmed(onset) => {
                self.refractory
                    .enter(id, onset.ts, self.cfg.refractory.duration_s);
                incr(&self.counters.confirmed);
                info!(
                    onset_ts = onset.ts,
                    onset_at = ?onset.datetime(),
                    axes = ?onset.evidence.axes_confirmed,
                    strength = onset.evidence.onset_strength,
                    persistent_count = onset.evidence.persistent_count,
                    "onset confirmed"
                );
                Resolution::Confirmed(onset)
            }
            Confirmation::Rejected(rejection) => {
                incr(&self.counters.rejected);
                debug!(
                    candidate_ts = candidate.ts,
                    reason = ?rejection.reason,
                    runs = ?rejection.axis_runs,
                    "candidate rejected"
                );
                Resolution::Rejected {
                    candidate,
                    rejection,
                }
            }
            Confirmation::Undecidable(reason) => {
                incr(&self.counters.undecidable);
                if reason == Undecidable::BufferEvicted {
                    incr(&self.counters.evicted);
                    warn!(
                        candidate_ts = candidate.ts,
                        capacity = slot.buffer.capacity(),
                        "buffer evicted evaluation window; candidate discarded"
                    );
                } else {
                    debug!(candidate_ts = candidate.ts, %reason, "candidate undecidable");
                }
                Resolution::Undecidable { candidate, reason }
            }
        }
    }

    /// Runs the gate on the symbol's newest tick, with the pre-window mean
    /// spread as the friction baseline.
    fn gate_latest(&self, id: SymbolId) -> Option<Candidate> {
        let buffer = &self.slots[id.index()].buffer;
        let tick = buffer.latest()?;

        let from = tick.ts.saturating_sub(self.cfg.confirm.pre_window_ms());
        let baseline_spread = mean(
            buffer
                .window((Bound::Excluded(from), Bound::Excluded(tick.ts)))
                .filter(|t| t.symbol == tick.symbol)
                .filter_map(|t| t.get(Indicator::Spread)),
        );

        self.gate.evaluate(tick, baseline_spread)
    }
}
