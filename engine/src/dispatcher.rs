//! Sharded dispatch
//!
//! Fans one tick stream out to `workers` pipeline tasks. A symbol always lands
//! on the same worker (`hash(symbol) % workers`), so its ticks keep their order
//! and its state never leaves that worker. The sink is the only thing workers
//! share, behind a [`SharedSink`].

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use corelib::models::{Candidate, Tick};
use serde::Serialize;
use tokio::sync::mpsc::{self, Receiver};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::config::OnsetConfig;
use crate::error::{DispatchError, SinkError, TickError};
use crate::metrics::counters::{Counters, CountersSnapshot};
use crate::pipeline::OnsetPipeline;
use crate::sink::{OnsetSink, SharedSink};

/// Per-worker queue depth.
const WORKER_QUEUE: usize = 1_024;

/// Aggregate of one finished run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub workers: usize,
    pub counters: CountersSnapshot,
    /// Candidates still waiting for their confirm window when input closed.
    pub unresolved: Vec<Candidate>,
}

/// Worker index for `symbol`. Stable for the lifetime of the binary.
pub fn shard_for(symbol: &str, workers: usize) -> usize {
    let mut h = DefaultHasher::new();
    symbol.hash(&mut h);
    (h.finish() % workers.max(1) as u64) as usize
}

/// Runs ticks from `rx` through `workers` pipelines until the channel closes,
/// then drains every worker and returns the run summary.
pub async fn run_sharded<S>(
    cfg: OnsetConfig,
    workers: usize,
    mut rx: Receiver<Tick>,
    sink: SharedSink<S>,
) -> Result<RunSummary, DispatchError>
where
    S: OnsetSink + Send + 'static,
{
    let workers = workers.max(1);
    let counters = Counters::default();

    let mut senders = Vec::with_capacity(workers);
    let mut handles = Vec::with_capacity(workers);
    for worker in 0..workers {
        let (tx, worker_rx) = mpsc::channel(WORKER_QUEUE);
        senders.push(tx);
        handles.push(spawn_worker(
            worker,
            cfg.clone(),
            worker_rx,
            sink.clone(),
            counters.clone(),
        ));
    }
    info!(workers, "dispatcher started");

    while let Some(tick) = rx.recv().await {
        let shard = shard_for(&tick.symbol, workers);
        if senders[shard].send(tick).await.is_err() {
            // Only happens if the worker died; its join result reports why.
            warn!(worker = shard, "worker queue closed; stopping dispatch");
            break;
        }
    }
    drop(senders);

    let mut unresolved = Vec::new();
    for (worker, handle) in handles.into_iter().enumerate() {
        let dropped = handle
            .await
            .map_err(|source| DispatchError::Worker { worker, source })?
            .map_err(|source| DispatchError::Flush { worker, source })?;
        unresolved.extend(dropped);
    }

    let summary = RunSummary {
        workers,
        counters: counters.snapshot(),
        unresolved,
    };
    info!(
        ticks = summary.counters.ticks,
        candidates = summary.counters.candidates,
        confirmed = summary.counters.confirmed,
        unresolved = summary.unresolved.len(),
        "dispatcher drained"
    );

    Ok(summary)
}

fn spawn_worker<S>(
    worker: usize,
    cfg: OnsetConfig,
    mut rx: Receiver<Tick>,
    sink: SharedSink<S>,
    counters: Counters,
) -> JoinHandle<Result<Vec<Candidate>, SinkError>>
where
    S: OnsetSink + Send + 'static,
{
    tokio::spawn(
        async move {
            let mut pipeline = OnsetPipeline::with_counters(cfg, sink, counters);
            debug!("worker running");

            while let Some(tick) = rx.recv().await {
                match pipeline.ingest(tick) {
                    Ok(_) => {}
                    // Already logged by the pipeline.
                    Err(TickError::OutOfOrder { .. }) => {}
                    Err(e @ TickError::Sink { .. }) => error!(error = %e, "onset not written"),
                }
            }

            pipeline.finish()
        }
        .instrument(info_span!("worker", worker)),
    )
}
