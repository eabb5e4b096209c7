//! Streaming surge-onset detection.
//!
//! Ticks flow through [`pipeline::OnsetPipeline`]: a cheap per-tick
//! [`gate::CandidateGate`] raises candidates, [`confirm::ConfirmDetector`]
//! checks them once their confirm window has filled, and
//! [`refractory::RefractoryManager`] suppresses re-triggers after a
//! confirmation. [`dispatcher::run_sharded`] spreads symbols over tokio tasks.

pub mod arena;
pub mod config;
pub mod confirm;
pub mod dispatcher;
pub mod error;
pub mod gate;
pub mod metrics;
pub mod pipeline;
pub mod refractory;
pub mod sink;
pub mod tick_buffer;

pub use config::OnsetConfig;
pub use error::{ConfigError, DispatchError, SinkError, TickError, Undecidable};
pub use pipeline::{OnsetPipeline, Resolution, TickOutcome};
pub use sink::{JsonlSink, MemorySink, OnsetSink, SharedSink};
