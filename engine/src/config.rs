//! Detection configuration.
//!
//! Loaded from a TOML file whose sections mirror the dotted keys the detector
//! is tuned with (`onset.speed.ret_1s_threshold`, `confirm.delta.ret_min`, ...).
//! Every threshold is required; a missing or unknown key fails the load and
//! nothing is processed.

use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::error::ConfigError;

pub const DEFAULT_MIN_AXES_REQUIRED: usize = 2;
pub const DEFAULT_BUFFER_CAPACITY: usize = 4_096;

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OnsetConfig {
    pub onset: GateThresholds,
    #[serde(default)]
    pub detection: DetectionConfig,
    pub confirm: ConfirmConfig,
    pub refractory: RefractoryConfig,
    #[serde(default)]
    pub buffer: BufferConfig,
}

/// Per-axis candidate thresholds (`[onset.*]`).
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GateThresholds {
    pub speed: SpeedThreshold,
    pub participation: ParticipationThreshold,
    pub friction: FrictionThreshold,
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpeedThreshold {
    /// Speed axis passes when `ret_1s >= ret_1s_threshold`.
    pub ret_1s_threshold: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParticipationThreshold {
    /// Participation axis passes when `z_vol_1s >= z_vol_threshold`.
    pub z_vol_threshold: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FrictionThreshold {
    /// Friction axis passes when `spread / baseline_spread <= spread_narrowing_pct`.
    pub spread_narrowing_pct: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DetectionConfig {
    #[serde(default = "default_min_axes_required")]
    pub min_axes_required: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_axes_required: DEFAULT_MIN_AXES_REQUIRED,
        }
    }
}

fn default_min_axes_required() -> usize {
    DEFAULT_MIN_AXES_REQUIRED
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfirmConfig {
    /// Forward evaluation interval after the candidate, in seconds.
    pub window_s: f64,
    /// Trailing baseline interval before the candidate, in seconds.
    pub pre_window_s: f64,
    /// Minimum consecutive satisfying ticks for an axis to confirm.
    pub persistent_n: usize,
    /// Minimum confirmed axes for success.
    pub min_axes: usize,
    /// Success additionally requires the speed axis.
    pub require_price_axis: bool,
    /// Leave the candidate tick itself out of the confirm window.
    #[serde(default = "default_exclude_cand_point")]
    pub exclude_cand_point: bool,
    pub delta: DeltaThresholds,
}

fn default_exclude_cand_point() -> bool {
    true
}

impl ConfirmConfig {
    pub fn window_ms(&self) -> i64 {
        secs_to_ms(self.window_s)
    }

    pub fn pre_window_ms(&self) -> i64 {
        secs_to_ms(self.pre_window_s)
    }
}

/// Minimum improvement over the pre-window baseline (`[confirm.delta]`).
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeltaThresholds {
    pub ret_min: f64,
    pub zvol_min: f64,
    pub spread_drop: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RefractoryConfig {
    pub duration_s: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BufferConfig {
    /// Ticks retained per symbol. Must cover `pre_window_s + window_s` at
    /// the expected tick rate, otherwise pendings are discarded as evicted.
    pub capacity: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}

/// Seconds to whole milliseconds.
pub fn secs_to_ms(secs: f64) -> i64 {
    (secs * 1_000.0).round() as i64
}

impl OnsetConfig {
    /// Reads, parses and validates a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let cfg = Self::from_toml_str(&raw)?;

        info!(
            path = %path.display(),
            min_axes_required = cfg.detection.min_axes_required,
            window_s = cfg.confirm.window_s,
            pre_window_s = cfg.confirm.pre_window_s,
            persistent_n = cfg.confirm.persistent_n,
            refractory_s = cfg.refractory.duration_s,
            buffer_capacity = cfg.buffer.capacity,
            "onset config loaded"
        );

        Ok(cfg)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        finite(
            "onset.speed.ret_1s_threshold",
            self.onset.speed.ret_1s_threshold,
        )?;
        finite(
            "onset.participation.z_vol_threshold",
            self.onset.participation.z_vol_threshold,
        )?;
        positive(
            "onset.friction.spread_narrowing_pct",
            self.onset.friction.spread_narrowing_pct,
        )?;

        axis_count(
            "detection.min_axes_required",
            self.detection.min_axes_required,
        )?;

        positive("confirm.window_s", self.confirm.window_s)?;
        positive("confirm.pre_window_s", self.confirm.pre_window_s)?;
        if self.confirm.persistent_n == 0 {
            return Err(ConfigError::invalid(
                "confirm.persistent_n",
                "must be at least 1",
            ));
        }
        axis_count("confirm.min_axes", self.confirm.min_axes)?;
        finite("confirm.delta.ret_min", self.confirm.delta.ret_min)?;
        finite("confirm.delta.zvol_min", self.confirm.delta.zvol_min)?;
        finite("confirm.delta.spread_drop", self.confirm.delta.spread_drop)?;

        let duration = self.refractory.duration_s;
        if !duration.is_finite() || duration < 0.0 {
            return Err(ConfigError::invalid(
                "refractory.duration_s",
                format!("must be finite and >= 0, got {duration}"),
            ));
        }

        if self.buffer.capacity < 2 {
            return Err(ConfigError::invalid(
                "buffer.capacity",
                format!("must be at least 2, got {}", self.buffer.capacity),
            ));
        }

        Ok(())
    }
}

fn finite(key: &'static str, v: f64) -> Result<(), ConfigError> {
    if v.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::invalid(key, format!("must be finite, got {v}")))
    }
}

fn positive(key: &'static str, v: f64) -> Result<(), ConfigError> {
    if v.is_finite() && v > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(key, format!("must be > 0, got {v}")))
    }
}

fn axis_count(key: &'static str, n: usize) -> Result<(), ConfigError> {
    if (1..=3).contains(&n) {
        Ok(())
    } else {
        Err(ConfigError::invalid(key, format!("must be in 1..=3, got {n}")))
    }
}

/// Config used across unit tests: 10s windows, persistence of 5 ticks.
#[cfg(test)]
pub(crate) fn fixture() -> OnsetConfig {
    OnsetConfig {
        onset: GateThresholds {
            speed: SpeedThreshold {
                ret_1s_threshold: 0.002,
            },
            participation: ParticipationThreshold {
                z_vol_threshold: 2.0,
            },
            friction: FrictionThreshold {
                spread_narrowing_pct: 0.6,
            },
        },
        detection: DetectionConfig::default(),
        confirm: ConfirmConfig {
            window_s: 10.0,
            pre_window_s: 10.0,
            persistent_n: 5,
            min_axes: 2,
            require_price_axis: true,
            exclude_cand_point: true,
            delta: DeltaThresholds {
                ret_min: 0.001,
                zvol_min: 1.0,
                spread_drop: 0.1,
            },
        },
        refractory: RefractoryConfig { duration_s: 45.0 },
        buffer: BufferConfig::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
        [onset.speed]
        ret_1s_threshold = 0.002

        [onset.participation]
        z_vol_threshold = 2.0

        [onset.friction]
        spread_narrowing_pct = 0.6

        [detection]
        min_axes_required = 2

        [confirm]
        window_s = 30
        pre_window_s = 60
        persistent_n = 22
        min_axes = 2
        require_price_axis = true

        [confirm.delta]
        ret_min = 0.001
        zvol_min = 1.0
        spread_drop = 0.0

        [refractory]
        duration_s = 45
    "#;

    #[test]
    fn parses_full_config_with_defaults() {
        let cfg = OnsetConfig::from_toml_str(FULL).unwrap();

        assert_eq!(cfg.onset.speed.ret_1s_threshold, 0.002);
        assert_eq!(cfg.confirm.persistent_n, 22);
        assert!(cfg.confirm.exclude_cand_point);
        assert_eq!(cfg.confirm.window_ms(), 30_000);
        assert_eq!(cfg.confirm.pre_window_ms(), 60_000);
        assert_eq!(cfg.buffer.capacity, DEFAULT_BUFFER_CAPACITY);
    }

    #[test]
    fn detection_section_is_optional() {
        let raw = FULL.replace("[detection]\n        min_axes_required = 2", "");
        let cfg = OnsetConfig::from_toml_str(&raw).unwrap();
        assert_eq!(cfg.detection.min_axes_required, DEFAULT_MIN_AXES_REQUIRED);
    }

    #[test]
    fn missing_required_key_is_fatal() {
        let raw = FULL.replace("persistent_n = 22", "");
        let err = OnsetConfig::from_toml_str(&raw).unwrap_err();

        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("persistent_n"));
    }

    #[test]
    fn unknown_key_is_rejected() {
        let raw = FULL.replace("min_axes = 2", "min_axes = 2\nmin_axis = 3");
        assert!(matches!(
            OnsetConfig::from_toml_str(&raw),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn out_of_range_values_fail_validation() {
        let cases = [
            ("min_axes = 2", "min_axes = 4", "confirm.min_axes"),
            ("persistent_n = 22", "persistent_n = 0", "confirm.persistent_n"),
            ("window_s = 30", "window_s = 0", "confirm.window_s"),
            ("duration_s = 45", "duration_s = -1", "refractory.duration_s"),
            (
                "spread_narrowing_pct = 0.6",
                "spread_narrowing_pct = 0.0",
                "onset.friction.spread_narrowing_pct",
            ),
        ];

        for (from, to, key) in cases {
            let raw = FULL.replace(from, to);
            match OnsetConfig::from_toml_str(&raw) {
                Err(ConfigError::Invalid { key: k, .. }) => assert_eq!(k, key),
                other => panic!("expected invalid {key}, got {other:?}"),
            }
        }
    }

    #[test]
    fn fixture_is_valid() {
        fixture().validate().unwrap();
    }

    #[test]
    fn secs_round_to_whole_ms() {
        assert_eq!(secs_to_ms(45.0), 45_000);
        assert_eq!(secs_to_ms(0.0015), 2);
    }
}
