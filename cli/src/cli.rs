use std::path::PathBuf;

use clap::Parser;

/// Replays indicator ticks (JSON lines) through the onset detector and writes
/// confirmed onsets as JSON lines.
#[derive(Debug, Parser)]
#[clap(name = "onset", version)]
pub struct Cli {
    /// Detector configuration (TOML)
    #[clap(long, env = "ONSET_CONFIG")]
    pub config: PathBuf,

    /// Tick input, one JSON object per line; `-` reads stdin
    #[clap(long, default_value = "-")]
    pub input: String,

    /// Where confirmed onsets go; stdout when omitted
    #[clap(long)]
    pub output: Option<PathBuf>,

    /// Pipeline workers; symbols are sharded across them
    #[clap(long, default_value_t = 1)]
    pub workers: usize,

    /// Emit logs as JSON (also enabled by APP_ENV=production)
    #[clap(long)]
    pub json_logs: bool,
}

impl Cli {
    pub fn reads_stdin(&self) -> bool {
        self.input == "-"
    }
}
