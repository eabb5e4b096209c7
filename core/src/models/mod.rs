pub mod onset;
pub mod tick;

pub use onset::{
    Axis, AxisRuns, AxisSet, Baseline, Candidate, CandidateEvidence, ConfirmedOnset,
    OnsetEvidence,
};
pub use tick::{Indicator, Indicators, Tick};
