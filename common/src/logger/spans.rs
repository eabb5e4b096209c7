use tracing::{Span, field};

use super::RunId;

/// Root span for a detection run.
pub fn run_span(name: &'static str, run_id: &RunId) -> Span {
    tracing::info_span!(
        "run",
        name = %name,
        run_id = %run_id.as_str(),
        workers = field::Empty
    )
}

/// Child span scoping the logs of one symbol's state machine.
pub fn symbol_span(symbol: &str) -> Span {
    tracing::debug_span!("symbol", symbol = %symbol)
}
