//! Defines all configuration structures for Tickclock.
//!
//! These structs are designed to be deserialized from a configuration file
//! (e.g., a TOML file) using `serde`, layered with `TICKCLOCK_*` environment
//! variables through the `config` crate. They control how often the driver
//! runs, how much newly created clocks count by, and the global step
//! override.

use crate::common::GlobalStep;
use crate::error::{ClockError, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// The fastest custom resolution: one pass per nanosecond.
pub const MAX_TICKS_PER_SECOND: u64 = 1_000_000_000;

/// The top-level configuration for a `ClockManager` and its `ClockDriver`.
#[derive(Debug, Clone, Deserialize)]
pub struct TickclockConfig {
    /// How often the driver runs one pass over the managed clocks.
    #[serde(default = "default_resolution")]
    pub resolution: ClockResolution,

    /// The step cached by clocks created through the manager's factory
    /// methods. Defaults to the resolution's period in milliseconds, so that
    /// clock time tracks real milliseconds while the driver runs.
    #[serde(default)]
    pub count_amount: Option<i64>,

    /// When positive, overrides every managed clock's step.
    #[serde(default)]
    pub global_step: i64,
}

/// Defines the operational speed of the `ClockDriver`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockResolution {
    /// ~60 passes per second.
    High,
    /// ~20 passes per second.
    Medium,
    /// ~1 pass per second.
    Low,
    /// A user-defined speed in passes per second.
    Custom { ticks_per_second: u64 },
}

impl ClockResolution {
    /// The time between two driver passes.
    pub fn period(&self) -> Duration {
        match self {
            ClockResolution::High => Duration::from_millis(16),
            ClockResolution::Medium => Duration::from_millis(50),
            ClockResolution::Low => Duration::from_secs(1),
            ClockResolution::Custom { ticks_per_second } => {
                let rate = (*ticks_per_second).clamp(1, MAX_TICKS_PER_SECOND);
                Duration::from_nanos(MAX_TICKS_PER_SECOND / rate)
            }
        }
    }
}

impl TickclockConfig {
    /// Loads a configuration from an optional TOML file plus environment.
    ///
    /// A missing file is not an error; environment variables such as
    /// `TICKCLOCK_GLOBAL_STEP=100` override values from the file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path.as_ref()).required(false))
            .add_source(::config::Environment::with_prefix("TICKCLOCK"))
            .build()?;
        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects a custom resolution the driver cannot run at.
    pub fn validate(&self) -> Result<()> {
        if let ClockResolution::Custom { ticks_per_second } = self.resolution {
            if ticks_per_second == 0 || ticks_per_second > MAX_TICKS_PER_SECOND {
                return Err(ClockError::InvalidArgument(format!(
                    "ticks_per_second must be between 1 and {}, got {}",
                    MAX_TICKS_PER_SECOND, ticks_per_second
                )));
            }
        }
        Ok(())
    }

    /// The step for clocks created by the manager.
    pub fn count_amount(&self) -> i64 {
        match self.count_amount {
            Some(amount) if amount > 0 => amount,
            _ => self.resolution.period().as_millis().max(1) as i64,
        }
    }

    pub fn global_step(&self) -> GlobalStep {
        GlobalStep(self.global_step)
    }
}

// --- Default value functions for serde ---

fn default_resolution() -> ClockResolution {
    ClockResolution::Medium
}

impl Default for TickclockConfig {
    fn default() -> Self {
        Self {
            resolution: default_resolution(),
            count_amount: None,
            global_step: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_amount_follows_resolution_by_default() {
        let config = TickclockConfig::default();
        assert_eq!(config.count_amount(), 50);

        let low = TickclockConfig {
            resolution: ClockResolution::Low,
            ..Default::default()
        };
        assert_eq!(low.count_amount(), 1000);
    }

    #[test]
    fn explicit_count_amount_wins() {
        let config = TickclockConfig {
            count_amount: Some(7),
            ..Default::default()
        };
        assert_eq!(config.count_amount(), 7);
    }

    #[test]
    fn custom_resolution_period() {
        let custom = ClockResolution::Custom { ticks_per_second: 4 };
        assert_eq!(custom.period(), Duration::from_millis(250));
        let zero = ClockResolution::Custom { ticks_per_second: 0 };
        assert_eq!(zero.period(), Duration::from_secs(1));
    }

    #[test]
    fn oversized_custom_resolution_keeps_a_nonzero_period() {
        let wrapped = ClockResolution::Custom { ticks_per_second: 1 << 32 };
        assert_eq!(wrapped.period(), Duration::from_nanos(1));
        let fast = ClockResolution::Custom { ticks_per_second: 2_000_000_000 };
        assert_eq!(fast.period(), Duration::from_nanos(1));
        assert!(!ClockResolution::Custom { ticks_per_second: u64::MAX }.period().is_zero());
    }

    #[test]
    fn validate_rejects_out_of_range_custom_resolution() {
        for ticks_per_second in [0, MAX_TICKS_PER_SECOND + 1, 1 << 32] {
            let config = TickclockConfig {
                resolution: ClockResolution::Custom { ticks_per_second },
                ..Default::default()
            };
            assert!(matches!(config.validate(), Err(ClockError::InvalidArgument(_))));
        }
        let ok = TickclockConfig {
            resolution: ClockResolution::Custom { ticks_per_second: MAX_TICKS_PER_SECOND },
            ..Default::default()
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn missing_file_loads_defaults() {
        let config = TickclockConfig::load("does-not-exist/tickclock.toml").unwrap();
        assert_eq!(config.resolution, ClockResolution::Medium);
        assert_eq!(config.global_step().0, 0);
    }
}
