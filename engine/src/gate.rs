//! Candidate Gate
//!
//! Flags ticks that look like the start of a surge. Each tick is checked on
//! three independent axes:
//!
//! - **speed**: `ret_1s >= ret_1s_threshold`
//! - **participation**: `z_vol_1s >= z_vol_threshold`
//! - **friction**: `spread / baseline_spread <= spread_narrowing_pct`
//!
//! A tick becomes a [`Candidate`] when at least `min_axes_required` axes pass
//! at once. Both comparisons are inclusive at the boundary.
//!
//! ## Fail-safe on missing data
//! A missing or non-finite indicator fails its axis; so does a missing or
//! non-positive baseline spread. Nothing here returns an error: bad input can
//! only make a candidate less likely.
//!
//! ## Determinism
//! The gate holds no memory of prior ticks. The only history it sees is the
//! `baseline_spread` the caller passes in.

use corelib::models::{Axis, AxisSet, Candidate, CandidateEvidence, Indicator, Tick};

use crate::config::{GateThresholds, OnsetConfig};

#[derive(Clone, Debug)]
pub struct CandidateGate {
    thresholds: GateThresholds,
    min_axes_required: usize,
}

impl CandidateGate {
    pub fn new(thresholds: GateThresholds, min_axes_required: usize) -> Self {
        Self {
            thresholds,
            min_axes_required,
        }
    }

    pub fn from_config(cfg: &OnsetConfig) -> Self {
        Self::new(cfg.onset.clone(), cfg.detection.min_axes_required)
    }

    /// Returns a candidate iff enough axes pass at this tick.
    pub fn evaluate(&self, tick: &Tick, baseline_spread: Option<f64>) -> Option<Candidate> {
        let spread_ratio = spread_ratio(tick, baseline_spread);
        let axes = self.axes(tick, spread_ratio);

        if axes.len() < self.min_axes_required {
            return None;
        }

        Some(Candidate {
            symbol: tick.symbol.clone(),
            ts: tick.ts,
            evidence: CandidateEvidence {
                axes_satisfied: axes,
                onset_score: axes.fraction(),
                ret_1s: tick.get(Indicator::Ret1s),
                z_vol_1s: tick.get(Indicator::ZVol1s),
                spread_ratio,
            },
        })
    }

    /// The set of axes passing at this tick, independent of `min_axes_required`.
    pub fn satisfied_axes(&self, tick: &Tick, baseline_spread: Option<f64>) -> AxisSet {
        self.axes(tick, spread_ratio(tick, baseline_spread))
    }

    fn axes(&self, tick: &Tick, spread_ratio: Option<f64>) -> AxisSet {
        let t = &self.thresholds;
        let mut axes = AxisSet::empty();

        if tick
            .get(Indicator::Ret1s)
            .is_some_and(|r| r >= t.speed.ret_1s_threshold)
        {
            axes.insert(Axis::Speed);
        }

        if tick
            .get(Indicator::ZVol1s)
            .is_some_and(|z| z >= t.participation.z_vol_threshold)
        {
            axes.insert(Axis::Participation);
        }

        if spread_ratio.is_some_and(|r| r <= t.friction.spread_narrowing_pct) {
            axes.insert(Axis::Friction);
        }

        axes
    }
}

fn spread_ratio(tick: &Tick, baseline_spread: Option<f64>) -> Option<f64> {
    let spread = tick.get(Indicator::Spread)?;
    let baseline = baseline_spread.filter(|b| b.is_finite() && *b > 0.0)?;
    let ratio = spread / baseline;
    ratio.is_finite().then_some(ratio)
}
