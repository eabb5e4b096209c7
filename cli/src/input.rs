use corelib::models::Tick;
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc::Sender;
use tracing::{debug, warn};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub lines: u64,
    pub ticks: u64,
    pub malformed: u64,
}

/// Parses JSON lines from `reader` and forwards every tick to `tx`.
///
/// Blank lines are ignored. Malformed lines are logged and skipped; the stream
/// keeps going. Stops early if the receiving side is gone.
pub async fn feed<R>(reader: R, tx: Sender<Tick>) -> std::io::Result<IngestStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = IngestStats::default();
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        stats.lines += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let tick: Tick = match serde_json::from_str(line) {
            Ok(t) => t,
            Err(e) => {
                stats.malformed += 1;
                warn!(line = stats.lines, error = %e, "skipping malformed tick");
                continue;
            }
        };

        if tx.send(tick).await.is_err() {
            debug!(line = stats.lines, "tick receiver closed; input stops");
            break;
        }
        stats.ticks += 1;
    }

    Ok(stats)
}
