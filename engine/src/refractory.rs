use tracing::debug;

use crate::arena::SymbolId;
use crate::config::secs_to_ms;

/// Per-symbol cooldown clock.
///
/// After a confirmation the symbol is suppressed while `ts < refractory_until`.
/// There is a single window per symbol: entering again overwrites it, periods
/// never stack.
#[derive(Debug, Default)]
pub struct RefractoryManager {
    until: Vec<Option<i64>>,
}

impl RefractoryManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only admission check. `false` iff `ts < refractory_until`.
    pub fn allow(&self, symbol: SymbolId, ts: i64) -> bool {
        match self.until(symbol) {
            Some(until) => ts >= until,
            None => true,
        }
    }

    /// Opens (or replaces) the symbol's window: `refractory_until = ts + duration`.
    ///
    /// Only called on a successful confirmation.
    pub fn enter(&mut self, symbol: SymbolId, ts: i64, duration_s: f64) {
        let idx = symbol.index();
        if self.until.len() <= idx {
            self.until.resize(idx + 1, None);
        }

        let until = ts.saturating_add(secs_to_ms(duration_s));
        let previous = self.until[idx].replace(until);

        debug!(
            %symbol,
            ts,
            until,
            previous = ?previous,
            "refractory window entered"
        );
    }

    pub fn until(&self, symbol: SymbolId) -> Option<i64> {
        self.until.get(symbol.index()).copied().flatten()
    }
}
