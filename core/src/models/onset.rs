use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One of the three independent surge dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    /// Return over the last second.
    Speed,
    /// Volume z-score.
    Participation,
    /// Spread narrowing.
    Friction,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::Speed, Axis::Participation, Axis::Friction];

    fn bit(self) -> u8 {
        match self {
            Axis::Speed => 0b001,
            Axis::Participation => 0b010,
            Axis::Friction => 0b100,
        }
    }
}

/// Small fixed set of axes. Serialized as a list in [`Axis::ALL`] order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "Vec<Axis>", from = "Vec<Axis>")]
pub struct AxisSet(u8);

impl AxisSet {
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn insert(&mut self, axis: Axis) {
        self.0 |= axis.bit();
    }

    pub fn contains(&self, axis: Axis) -> bool {
        self.0 & axis.bit() != 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Axis> + '_ {
        Axis::ALL.into_iter().filter(|a| self.contains(*a))
    }

    /// Fraction of the three axes present: 0, 1/3, 2/3 or 1.
    pub fn fraction(&self) -> f64 {
        self.len() as f64 / Axis::ALL.len() as f64
    }
}

impl FromIterator<Axis> for AxisSet {
    fn from_iter<I: IntoIterator<Item = Axis>>(iter: I) -> Self {
        let mut set = AxisSet::empty();
        for axis in iter {
            set.insert(axis);
        }
        set
    }
}

impl From<AxisSet> for Vec<Axis> {
    fn from(set: AxisSet) -> Self {
        set.iter().collect()
    }
}

impl From<Vec<Axis>> for AxisSet {
    fn from(axes: Vec<Axis>) -> Self {
        axes.into_iter().collect()
    }
}

/// Evidence recorded by the candidate gate at the flagged tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateEvidence {
    pub axes_satisfied: AxisSet,
    /// `|axes_satisfied| / 3`.
    pub onset_score: f64,
    pub ret_1s: Option<f64>,
    pub z_vol_1s: Option<f64>,
    /// `spread / baseline_spread` when both were available.
    pub spread_ratio: Option<f64>,
}

/// A tick flagged as a possible onset, awaiting confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub symbol: String,
    pub ts: i64,
    pub evidence: CandidateEvidence,
}

/// Per-indicator means over the pre-window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub ret_1s: Option<f64>,
    pub z_vol_1s: Option<f64>,
    pub spread: Option<f64>,
}

/// Longest consecutive satisfying run per axis inside the confirm window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisRuns {
    pub speed: usize,
    pub participation: usize,
    pub friction: usize,
}

impl AxisRuns {
    pub fn set(&mut self, axis: Axis, len: usize) {
        match axis {
            Axis::Speed => self.speed = len,
            Axis::Participation => self.participation = len,
            Axis::Friction => self.friction = len,
        }
    }
}

/// Supporting evidence for a confirmed onset.
///
/// The deltas are averaged over the ticks of the best run: the longest run
/// among the confirmed axes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnsetEvidence {
    pub axes_confirmed: AxisSet,
    /// `|axes_confirmed| / 3`.
    pub onset_strength: f64,
    pub delta_ret: Option<f64>,
    pub delta_zvol: Option<f64>,
    pub delta_spread: Option<f64>,
    /// Longest run length over the confirmed axes.
    pub persistent_count: usize,
    pub axis_runs: AxisRuns,
    pub baseline: Baseline,
    pub pre_window_len: usize,
    pub confirm_window_len: usize,
}

/// Terminal detection record, keyed by `(symbol, ts)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmedOnset {
    pub symbol: String,
    /// Onset timestamp: the candidate tick, epoch milliseconds.
    pub ts: i64,
    pub evidence: OnsetEvidence,
}

impl ConfirmedOnset {
    pub fn key(&self) -> (&str, i64) {
        (&self.symbol, self.ts)
    }

    /// Wall-clock view of the onset timestamp, for logging.
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.ts)
    }
}
