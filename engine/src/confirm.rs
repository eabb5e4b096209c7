//! Confirm Detector
//!
//! Decides whether a [`Candidate`] was a real onset by looking at what came
//! after it. The candidate is compared against two windows taken from the
//! symbol's tick buffer:
//!
//! ```text
//!   pre-window:      (ts - pre_window_s*1000, ts)
//!   confirm-window:  [ts + (exclude_cand_point ? 1 : 0), ts + window_s*1000]
//! ```
//!
//! The pre-window gives a per-indicator baseline (mean of finite samples).
//! Inside the confirm window each tick is tested per axis against that
//! baseline:
//!
//! - speed:         `ret_1s - base.ret_1s >= delta.ret_min`
//! - participation: `z_vol_1s - base.z_vol_1s >= delta.zvol_min`
//! - friction:      `base.spread - spread >= delta.spread_drop`
//!
//! An axis is confirmed when its longest run of consecutive satisfying ticks
//! reaches `persistent_n`. The onset is confirmed when at least
//! `confirm.min_axes` axes are, and, with `require_price_axis`, speed is one
//! of them.
//!
//! Both windows must be complete: an empty window, or a buffer that has
//! evicted ticks the pre-window needs, makes the candidate undecidable.
//! Only ticks of the candidate's own symbol are considered.

use std::ops::Bound;

use corelib::models::{
    Axis, AxisRuns, AxisSet, Baseline, Candidate, ConfirmedOnset, Indicator, OnsetEvidence, Tick,
};

use crate::config::{ConfirmConfig, DeltaThresholds};
use crate::error::Undecidable;
use crate::tick_buffer::TickBuffer;

/// Outcome of evaluating one pending candidate.
#[derive(Clone, Debug, PartialEq)]
pub enum Confirmation {
    Confirmed(ConfirmedOnset),
    Rejected(Rejection),
    Undecidable(Undecidable),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Rejection {
    pub axes_confirmed: AxisSet,
    pub axis_runs: AxisRuns,
    pub reason: RejectReason,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    TooFewAxes { confirmed: usize, required: usize },
    MissingPriceAxis,
}

/// Longest run of satisfying ticks for one axis: `len` ticks from `start`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Run {
    start: usize,
    len: usize,
}

#[derive(Clone, Debug)]
pub struct ConfirmDetector {
    cfg: ConfirmConfig,
}

impl ConfirmDetector {
    pub fn new(cfg: ConfirmConfig) -> Self {
        Self { cfg }
    }

    /// Timestamp from which the candidate may be evaluated.
    pub fn ready_at(&self, candidate: &Candidate) -> i64 {
        candidate.ts.saturating_add(self.cfg.window_ms())
    }

    /// Evaluates `candidate` against the ticks held in `buffer`.
    ///
    /// Must only be called once the buffer has seen a tick at or after
    /// [`ready_at`](Self::ready_at); earlier calls see a partial window.
    pub fn evaluate(&self, candidate: &Candidate, buffer: &TickBuffer) -> Confirmation {
        let ts = candidate.ts;
        let pre_start = ts.saturating_sub(self.cfg.pre_window_ms());

        if buffer.evicted_after(pre_start) {
            return Confirmation::Undecidable(Undecidable::BufferEvicted);
        }

        let same_symbol = |t: &&Tick| t.symbol == candidate.symbol;

        let pre: Vec<&Tick> = buffer
            .window((Bound::Excluded(pre_start), Bound::Excluded(ts)))
            .filter(same_symbol)
            .collect();
        if pre.is_empty() {
            return Confirmation::Undecidable(Undecidable::EmptyPreWindow);
        }

        let confirm_start = if self.cfg.exclude_cand_point {
            ts.saturating_add(1)
        } else {
            ts
        };
        let confirm_end = ts.saturating_add(self.cfg.window_ms());
        let confirm: Vec<&Tick> = buffer
            .window(confirm_start..=confirm_end)
            .filter(same_symbol)
            .collect();
        if confirm.is_empty() {
            return Confirmation::Undecidable(Undecidable::EmptyConfirmWindow);
        }

        let baseline = baseline(&pre);

        let mut runs = [Run::default(); 3];
        let mut axis_runs = AxisRuns::default();
        let mut confirmed = AxisSet::empty();
        for (i, axis) in Axis::ALL.into_iter().enumerate() {
            let run = longest_run(
                confirm
                    .iter()
                    .map(|t| satisfies(axis, t, &baseline, &self.cfg.delta)),
            );
            runs[i] = run;
            axis_runs.set(axis, run.len);
            if run.len >= self.cfg.persistent_n {
                confirmed.insert(axis);
            }
        }

        if confirmed.len() < self.cfg.min_axes {
            return Confirmation::Rejected(Rejection {
                axes_confirmed: confirmed,
                axis_runs,
                reason: RejectReason::TooFewAxes {
                    confirmed: confirmed.len(),
                    required: self.cfg.min_axes,
                },
            });
        }
        if self.cfg.require_price_axis && !confirmed.contains(Axis::Speed) {
            return Confirmation::Rejected(Rejection {
                axes_confirmed: confirmed,
                axis_runs,
                reason: RejectReason::MissingPriceAxis,
            });
        }

        // Best run: longest among confirmed axes; ties keep the earlier axis.
        let best = Axis::ALL
            .into_iter()
            .enumerate()
            .filter(|(_, a)| confirmed.contains(*a))
            .map(|(i, _)| runs[i])
            .fold(Run::default(), |best, r| if r.len > best.len { r } else { best });

        let best_ticks = &confirm[best.start..best.start + best.len];

        Confirmation::Confirmed(ConfirmedOnset {
            symbol: candidate.symbol.clone(),
            ts,
            evidence: OnsetEvidence {
                axes_confirmed: confirmed,
                onset_strength: confirmed.fraction(),
                delta_ret: mean_delta(best_ticks, |t| {
                    Some(t.get(Indicator::Ret1s)? - baseline.ret_1s?)
                }),
                delta_zvol: mean_delta(best_ticks, |t| {
                    Some(t.get(Indicator::ZVol1s)? - baseline.z_vol_1s?)
                }),
                delta_spread: mean_delta(best_ticks, |t| {
                    Some(baseline.spread? - t.get(Indicator::Spread)?)
                }),
                persistent_count: best.len,
                axis_runs,
                baseline,
                pre_window_len: pre.len(),
                confirm_window_len: confirm.len(),
            },
        })
    }
}

/// Per-indicator mean over finite samples.
fn baseline(ticks: &[&Tick]) -> Baseline {
    Baseline {
        ret_1s: mean(ticks.iter().filter_map(|t| t.get(Indicator::Ret1s))),
        z_vol_1s: mean(ticks.iter().filter_map(|t| t.get(Indicator::ZVol1s))),
        spread: mean(ticks.iter().filter_map(|t| t.get(Indicator::Spread))),
    }
}

/// Mean of the samples, `None` when there are none.
pub(crate) fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

fn mean_delta(ticks: &[&Tick], delta: impl Fn(&Tick) -> Option<f64>) -> Option<f64> {
    mean(ticks.iter().filter_map(|t| delta(t)))
}

fn satisfies(axis: Axis, tick: &Tick, base: &Baseline, delta: &DeltaThresholds) -> bool {
    let diff = match axis {
        Axis::Speed => tick
            .get(Indicator::Ret1s)
            .zip(base.ret_1s)
            .map(|(v, b)| (v - b, delta.ret_min)),
        Axis::Participation => tick
            .get(Indicator::ZVol1s)
            .zip(base.z_vol_1s)
            .map(|(v, b)| (v - b, delta.zvol_min)),
        Axis::Friction => tick
            .get(Indicator::Spread)
            .zip(base.spread)
            .map(|(v, b)| (b - v, delta.spread_drop)),
    };

    diff.is_some_and(|(d, min)| d >= min)
}

/// First longest run of `true`.
fn longest_run(flags: impl Iterator<Item = bool>) -> Run {
    let mut best = Run::default();
    let mut current = Run::default();

    for (i, ok) in flags.enumerate() {
        if ok {
            if current.len == 0 {
                current.start = i;
            }
            current.len += 1;
            if current.len > best.len {
                best = current;
            }
        } else {
            current.len = 0;
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::fixture;
    use corelib::models::{CandidateEvidence, Indicators};

    const T0: i64 = 100_000;

    fn detector() -> ConfirmDetector {
        ConfirmDetector::new(fixture().confirm)
    }

    fn candidate(symbol: &str, ts: i64) -> Candidate {
        Candidate {
            symbol: symbol.into(),
            ts,
            evidence: CandidateEvidence {
                axes_satisfied: [Axis::Speed, Axis::Participation].into_iter().collect(),
                onset_score: 2.0 / 3.0,
                ret_1s: Some(0.003),
                z_vol_1s: Some(3.0),
                spread_ratio: None,
            },
        }
    }

    fn tick(symbol: &str, ts: i64, ret: f64, zvol: f64, spread: f64) -> Tick {
        Tick::new(
            symbol,
            ts,
            Indicators {
                ret_1s: Some(ret),
                z_vol_1s: Some(zvol),
                spread: Some(spread),
                ..Default::default()
            },
        )
    }

    fn flat(symbol: &str, ts: i64) -> Tick {
        tick(symbol, ts, 0.0, 0.0, 1.0)
    }

    fn hot(symbol: &str, ts: i64) -> Tick {
        tick(symbol, ts, 0.003, 3.0, 0.5)
    }

    /// Flat pre-window at 1 tick/s, then the candidate at T0, then `after`.
    fn buffer_with(after: impl IntoIterator<Item = Tick>) -> TickBuffer {
        let mut buf = TickBuffer::new(1_024);
        for s in (1..=9).rev() {
            buf.push(flat("BTC", T0 - s * 1_000));
        }
        buf.push(hot("BTC", T0));
        for t in after {
            buf.push(t);
        }
        buf
    }

    fn hot_run(from: i64, n: i64, step: i64) -> Vec<Tick> {
        (0..n).map(|i| hot("BTC", from + i * step)).collect()
    }

    #[test]
    fn ready_at_is_candidate_plus_window() {
        assert_eq!(detector().ready_at(&candidate("BTC", T0)), T0 + 10_000);
    }

    #[test]
    fn persistent_hot_run_confirms_all_axes() {
        let buf = buffer_with(hot_run(T0 + 1_000, 10, 1_000));

        let Confirmation::Confirmed(onset) = detector().evaluate(&candidate("BTC", T0), &buf)
        else {
            panic!("expected confirmation");
        };

        let ev = &onset.evidence;
        assert_eq!(onset.symbol, "BTC");
        assert_eq!(onset.ts, T0);
        assert_eq!(ev.axes_confirmed.len(), 3);
        assert_eq!(ev.onset_strength, 1.0);
        assert_eq!(ev.persistent_count, 10);
        assert_eq!(ev.pre_window_len, 9);
        assert_eq!(ev.confirm_window_len, 10);
        assert_eq!(ev.baseline.ret_1s, Some(0.0));
        assert!((ev.delta_ret.unwrap() - 0.003).abs() < 1e-12);
        assert!((ev.delta_zvol.unwrap() - 3.0).abs() < 1e-12);
        assert!((ev.delta_spread.unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn run_of_exactly_persistent_n_confirms_one_less_rejects() {
        let mut cfg = fixture().confirm;
        cfg.persistent_n = 22;
        cfg.window_s = 30.0;
        let det = ConfirmDetector::new(cfg);

        // 22 hot ticks bracketed by flat ticks inside the confirm window.
        let mut after = vec![flat("BTC", T0 + 500)];
        after.extend(hot_run(T0 + 1_000, 22, 1_000));
        after.push(flat("BTC", T0 + 23_000));
        let buf = buffer_with(after);
        assert!(matches!(
            det.evaluate(&candidate("BTC", T0), &buf),
            Confirmation::Confirmed(ref o) if o.evidence.persistent_count == 22
        ));

        let mut after = vec![flat("BTC", T0 + 500)];
        after.extend(hot_run(T0 + 1_000, 21, 1_000));
        after.push(flat("BTC", T0 + 22_000));
        let buf = buffer_with(after);
        match det.evaluate(&candidate("BTC", T0), &buf) {
            Confirmation::Rejected(r) => {
                assert_eq!(r.axis_runs.speed, 21);
                assert!(r.axes_confirmed.is_empty());
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn broken_runs_do_not_add_up() {
        // 4 + 4 hot ticks with a flat gap never reach persistent_n = 5.
        let mut after = hot_run(T0 + 1_000, 4, 500);
        after.push(flat("BTC", T0 + 3_000));
        after.extend(hot_run(T0 + 3_500, 4, 500));
        let buf = buffer_with(after);

        match detector().evaluate(&candidate("BTC", T0), &buf) {
            Confirmation::Rejected(r) => assert_eq!(r.axis_runs.speed, 4),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn price_axis_is_required_when_configured() {
        // Volume and spread persist, return stays flat.
        let after: Vec<Tick> = (1..=8)
            .map(|i| tick("BTC", T0 + i * 1_000, 0.0, 3.0, 0.5))
            .collect();
        let buf = buffer_with(after);

        match detector().evaluate(&candidate("BTC", T0), &buf) {
            Confirmation::Rejected(r) => {
                assert_eq!(r.reason, RejectReason::MissingPriceAxis);
                assert_eq!(r.axes_confirmed.len(), 2);
            }
            other => panic!("expected rejection, got {other:?}"),
        }

        let mut cfg = fixture().confirm;
        cfg.require_price_axis = false;
        let det = ConfirmDetector::new(cfg);
        match det.evaluate(&candidate("BTC", T0), &buf) {
            Confirmation::Confirmed(o) => {
                assert!(!o.evidence.axes_confirmed.contains(Axis::Speed));
                assert!((o.evidence.onset_strength - 2.0 / 3.0).abs() < 1e-12);
            }
            other => panic!("expected confirmation, got {other:?}"),
        }
    }

    #[test]
    fn too_few_axes_rejects() {
        let after: Vec<Tick> = (1..=8)
            .map(|i| tick("BTC", T0 + i * 1_000, 0.003, 0.0, 1.0))
            .collect();
        let buf = buffer_with(after);

        match detector().evaluate(&candidate("BTC", T0), &buf) {
            Confirmation::Rejected(r) => assert_eq!(
                r.reason,
                RejectReason::TooFewAxes {
                    confirmed: 1,
                    required: 2
                }
            ),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn empty_windows_are_undecidable() {
        let det = detector();

        let mut buf = TickBuffer::new(64);
        buf.push(hot("BTC", T0));
        buf.extend_hot(T0 + 1_000, 8);
        assert_eq!(
            det.evaluate(&candidate("BTC", T0), &buf),
            Confirmation::Undecidable(Undecidable::EmptyPreWindow)
        );

        let buf = buffer_with([hot("BTC", T0 + 11_000)]);
        assert_eq!(
            det.evaluate(&candidate("BTC", T0), &buf),
            Confirmation::Undecidable(Undecidable::EmptyConfirmWindow)
        );
    }

    #[test]
    fn pre_window_excludes_both_ends() {
        let mut buf = TickBuffer::new(64);
        // Exactly pre_window_s before the candidate: outside the open interval.
        buf.push(flat("BTC", T0 - 10_000));
        buf.push(hot("BTC", T0));
        buf.extend_hot(T0 + 1_000, 8);

        assert_eq!(
            detector().evaluate(&candidate("BTC", T0), &buf),
            Confirmation::Undecidable(Undecidable::EmptyPreWindow)
        );
    }

    #[test]
    fn candidate_point_inclusion_is_configurable() {
        // Candidate tick plus four hot followers: five only when included.
        let buf = buffer_with(hot_run(T0 + 1_000, 4, 1_000));

        assert!(matches!(
            detector().evaluate(&candidate("BTC", T0), &buf),
            Confirmation::Rejected(_)
        ));

        let mut cfg = fixture().confirm;
        cfg.exclude_cand_point = false;
        assert!(matches!(
            ConfirmDetector::new(cfg).evaluate(&candidate("BTC", T0), &buf),
            Confirmation::Confirmed(ref o) if o.evidence.persistent_count == 5
        ));
    }

    #[test]
    fn other_symbols_are_filtered_before_windowing() {
        // Interleaved ETH flat ticks would break every BTC run if counted.
        let mut after = Vec::new();
        for i in 1..=8 {
            after.push(hot("BTC", T0 + i * 1_000));
            after.push(flat("ETH", T0 + i * 1_000 + 1));
        }
        let buf = buffer_with(after);

        match detector().evaluate(&candidate("BTC", T0), &buf) {
            Confirmation::Confirmed(o) => {
                assert_eq!(o.evidence.persistent_count, 8);
                assert_eq!(o.evidence.confirm_window_len, 8);
            }
            other => panic!("expected confirmation, got {other:?}"),
        }
    }

    #[test]
    fn missing_values_break_runs() {
        let mut after = hot_run(T0 + 1_000, 3, 1_000);
        after.push(Tick::new("BTC", T0 + 4_000, Indicators::default()));
        after.extend(hot_run(T0 + 5_000, 3, 1_000));
        let buf = buffer_with(after);

        match detector().evaluate(&candidate("BTC", T0), &buf) {
            Confirmation::Rejected(r) => {
                assert_eq!(r.axis_runs, AxisRuns { speed: 3, participation: 3, friction: 3 });
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn evicted_pre_window_is_undecidable() {
        let mut buf = TickBuffer::new(12);
        for s in (1..=9).rev() {
            buf.push(flat("BTC", T0 - s * 1_000));
        }
        buf.push(hot("BTC", T0));
        // Five more ticks overflow the ring and push out T0-9000..=T0-7000.
        buf.extend_hot(T0 + 1_000, 5);

        assert_eq!(
            detector().evaluate(&candidate("BTC", T0), &buf),
            Confirmation::Undecidable(Undecidable::BufferEvicted)
        );
    }

    #[test]
    fn longest_run_keeps_first_of_equal_length() {
        let flags = [true, true, false, true, true, false, true];
        assert_eq!(longest_run(flags.into_iter()), Run { start: 0, len: 2 });
        assert_eq!(longest_run([false; 3].into_iter()), Run::default());
    }

    trait ExtendHot {
        fn extend_hot(&mut self, from: i64, n: i64);
    }

    impl ExtendHot for TickBuffer {
        fn extend_hot(&mut self, from: i64, n: i64) {
            for t in hot_run(from, n, 1_000) {
                self.push(t);
            }
        }
    }
}
