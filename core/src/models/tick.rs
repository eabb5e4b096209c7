use serde::{Deserialize, Serialize};

/// Indicators the detector reads through [`Indicators::get`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Indicator {
    Ret1s,
    ZVol1s,
    Spread,
}

/// Indicator vector computed upstream from raw quotes.
///
/// Every field is optional: the feature stage may not have enough data to
/// produce a value yet. A non-finite value (NaN, ±inf) is treated the same as
/// an absent one by [`Indicators::get`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Indicators {
    pub ret_1s: Option<f64>,
    pub accel_1s: Option<f64>,
    pub z_vol_1s: Option<f64>,
    pub ticks_per_sec: Option<f64>,
    pub spread: Option<f64>,
    pub microprice_slope: Option<f64>,
}

impl Indicators {
    /// Returns the indicator value if it is present and finite.
    pub fn get(&self, indicator: Indicator) -> Option<f64> {
        let raw = match indicator {
            Indicator::Ret1s => self.ret_1s,
            Indicator::ZVol1s => self.z_vol_1s,
            Indicator::Spread => self.spread,
        };

        raw.filter(|v| v.is_finite())
    }
}

/// One indicator-bearing market tick.
///
/// Wire shape is flat: `{"ts": .., "symbol": "..", "ret_1s": .., ...}`.
/// Unknown fields are ignored; `null` reads as a missing indicator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub symbol: String,
    /// Epoch milliseconds.
    pub ts: i64,
    #[serde(flatten)]
    pub indicators: Indicators,
}

impl Tick {
    pub fn new(symbol: impl Into<String>, ts: i64, indicators: Indicators) -> Self {
        Self {
            symbol: symbol.into(),
            ts,
            indicators,
        }
    }

    pub fn get(&self, indicator: Indicator) -> Option<f64> {
        self.indicators.get(indicator)
    }
}
