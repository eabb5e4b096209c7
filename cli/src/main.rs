pub mod cli;
pub mod input;

use std::fs::File;
use std::io::{self, BufWriter, Write};

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufRead, BufReader};
use tokio::sync::mpsc;
use tracing::Instrument;

use cli::Cli;
use common::logger::{RunId, init_logger, run_span};
use engine::dispatcher::run_sharded;
use engine::{JsonlSink, OnsetConfig, OnsetSink, SharedSink};

/// Ticks buffered between the reader and the dispatcher.
const INPUT_QUEUE: usize = 4_096;

type Output = Box<dyn Write + Send>;

fn open_output(cli: &Cli) -> anyhow::Result<Output> {
    Ok(match &cli.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create output {}", path.display()))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(BufWriter::new(io::stdout())),
    })
}

async fn open_input(cli: &Cli) -> anyhow::Result<Box<dyn AsyncBufRead + Unpin + Send>> {
    if cli.reads_stdin() {
        return Ok(Box::new(BufReader::new(tokio::io::stdin())));
    }

    let file = tokio::fs::File::open(&cli.input)
        .await
        .with_context(|| format!("failed to open input {}", cli.input))?;
    Ok(Box::new(BufReader::new(file)))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let cfg = OnsetConfig::load(&cli.config)
        .with_context(|| format!("invalid config {}", cli.config.display()))?;

    let sink = SharedSink::new(JsonlSink::new(open_output(&cli)?));
    let reader = open_input(&cli).await?;

    let (tx, rx) = mpsc::channel(INPUT_QUEUE);
    let feeder = tokio::spawn(input::feed(reader, tx).in_current_span());

    let summary = run_sharded(cfg, cli.workers, rx, sink.clone()).await?;
    let stats = feeder.await.context("input task failed")??;

    sink.with(|s| s.flush()).context("failed to flush onset output")?;

    tracing::info!(
        lines = stats.lines,
        malformed = stats.malformed,
        counters = %serde_json::to_string(&summary.counters)?,
        unresolved = summary.unresolved.len(),
        "run complete"
    );

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let is_production = std::env::var("APP_ENV").unwrap_or_default() == "production";
    init_logger("onset", cli.json_logs || is_production);

    let run_id = RunId::default();
    let span = run_span("onset", &run_id);
    span.record("workers", cli.workers);

    tracing::info!(parent: &span, "Starting onset detector...");

    run(cli).instrument(span).await
}
