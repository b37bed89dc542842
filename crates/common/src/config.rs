//! Mission and admission configuration
//!
//! Every threshold is configuration, not an invariant. Values load from TOML and
//! fall back to the defaults for any key left out.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{HiveError, HiveResult};

/// Thresholds of the admission controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Capacity of the latency and outcome rings.
    pub window_capacity: usize,
    /// Samples needed before the latency trend is evaluated.
    pub trend_min_samples: usize,
    /// Least-squares slope (ms per sample) above which THROTTLE fires.
    pub trend_threshold: f64,
    pub budget_max: u32,
    /// Subtracted for every stress signal (timeout/overload failure).
    pub stress_penalty: u32,
    pub refill_interval_secs: u64,
    pub refill_amount: u32,
    /// Budget below this emits STEALTH_MODE.
    pub stealth_low_water: u32,
    /// Budget below this makes the pre-flight gate deny.
    pub preflight_budget_floor: u32,
    /// Average latency above this makes the pre-flight gate deny.
    pub latency_ceiling_ms: f64,
    /// Completions needed before the block rate is evaluated.
    pub rotation_min_samples: usize,
    /// Failed fraction above which INFRA_ROTATE fires.
    pub block_rate_threshold: f64,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            window_capacity: 50,
            trend_min_samples: 10,
            trend_threshold: 0.5,
            budget_max: 50,
            stress_penalty: 5,
            refill_interval_secs: 60,
            refill_amount: 1,
            stealth_low_water: 5,
            preflight_budget_floor: 10,
            latency_ceiling_ms: 500.0,
            rotation_min_samples: 20,
            block_rate_threshold: 0.02,
        }
    }
}

impl AdmissionConfig {
    #[inline]
    #[must_use]
    pub fn refill_interval(&self) -> Duration {
        Duration::from_secs(self.refill_interval_secs)
    }

    pub fn validate(&self) -> HiveResult<()> {
        if self.window_capacity == 0 {
            return Err(HiveError::Config("window_capacity must be > 0".into()));
        }
        if self.trend_min_samples < 2 || self.trend_min_samples > self.window_capacity {
            return Err(HiveError::Config(format!(
                "trend_min_samples must be within 2..={}",
                self.window_capacity
            )));
        }
        if self.rotation_min_samples == 0 || self.rotation_min_samples > self.window_capacity {
            return Err(HiveError::Config(format!(
                "rotation_min_samples must be within 1..={}",
                self.window_capacity
            )));
        }
        if self.budget_max == 0 {
            return Err(HiveError::Config("budget_max must be > 0".into()));
        }
        if self.refill_interval_secs == 0 {
            return Err(HiveError::Config("refill_interval_secs must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&self.block_rate_threshold) {
            return Err(HiveError::Config("block_rate_threshold must be within [0, 1]".into()));
        }
        if !self.latency_ceiling_ms.is_finite() || self.latency_ceiling_ms <= 0.0 {
            return Err(HiveError::Config("latency_ceiling_ms must be positive".into()));
        }
        Ok(())
    }
}

/// Per-mission settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MissionConfig {
    pub mission_timeout_secs: u64,
    /// Tick of proactive workers.
    pub tick_interval_ms: u64,
    /// How long teardown waits for one worker to stop.
    pub stop_timeout_ms: u64,
    /// Events kept for the report. 0 disables history.
    pub history_limit: usize,
    pub dashboard_capacity: usize,
    /// Default aggression the strategist starts campaigns with.
    pub base_aggression: u8,
    pub admission: AdmissionConfig,
}

impl Default for MissionConfig {
    fn default() -> Self {
        Self::balanced()
    }
}

impl MissionConfig {
    /// Balanced preset: the defaults.
    #[must_use]
    pub fn balanced() -> Self {
        Self {
            mission_timeout_secs: 180,
            tick_interval_ms: 1_000,
            stop_timeout_ms: 2_000,
            history_limit: 10_000,
            dashboard_capacity: 256,
            base_aggression: 5,
            admission: AdmissionConfig::default(),
        }
    }

    /// Aggressive preset: louder campaigns and a looser latency ceiling.
    #[must_use]
    pub fn aggressive() -> Self {
        Self {
            base_aggression: 8,
            admission: AdmissionConfig {
                latency_ceiling_ms: 1_000.0,
                block_rate_threshold: 0.05,
                ..AdmissionConfig::default()
            },
            ..Self::balanced()
        }
    }

    /// Stealth preset: gentle campaigns, early throttling.
    #[must_use]
    pub fn stealth() -> Self {
        Self {
            base_aggression: 2,
            admission: AdmissionConfig {
                trend_threshold: 0.25,
                latency_ceiling_ms: 250.0,
                stress_penalty: 10,
                preflight_budget_floor: 20,
                ..AdmissionConfig::default()
            },
            ..Self::balanced()
        }
    }

    /// Look up a preset by name.
    pub fn preset(name: &str) -> HiveResult<Self> {
        match name.trim().to_lowercase().as_str() {
            "balanced" | "" => Ok(Self::balanced()),
            "aggressive" => Ok(Self::aggressive()),
            "stealth" => Ok(Self::stealth()),
            other => Err(HiveError::Config(format!("unknown preset '{}'", other))),
        }
    }

    pub fn from_toml_str(raw: &str) -> HiveResult<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> HiveResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    #[inline]
    #[must_use]
    pub fn mission_timeout(&self) -> Duration {
        Duration::from_secs(self.mission_timeout_secs)
    }

    #[inline]
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    #[inline]
    #[must_use]
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn validate(&self) -> HiveResult<()> {
        if self.tick_interval_ms == 0 {
            return Err(HiveError::Config("tick_interval_ms must be > 0".into()));
        }
        if self.dashboard_capacity == 0 {
            return Err(HiveError::Config("dashboard_capacity must be > 0".into()));
        }
        if !(1..=10).contains(&self.base_aggression) {
            return Err(HiveError::Config("base_aggression must be within 1..=10".into()));
        }
        self.admission.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(MissionConfig::default().validate().is_ok());
        assert!(MissionConfig::aggressive().validate().is_ok());
        assert!(MissionConfig::stealth().validate().is_ok());
        assert_eq!(MissionConfig::default().mission_timeout(), Duration::from_secs(180));
    }

    #[test]
    fn presets_by_name() {
        assert_eq!(MissionConfig::preset("stealth").unwrap().base_aggression, 2);
        assert!(MissionConfig::preset("reckless").is_err());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = MissionConfig::from_toml_str(
            r#"
            mission_timeout_secs = 30

            [admission]
            budget_max = 20
            "#,
        )
        .unwrap();
        assert_eq!(cfg.mission_timeout_secs, 30);
        assert_eq!(cfg.admission.budget_max, 20);
        assert_eq!(cfg.admission.stress_penalty, 5);
        assert_eq!(cfg.tick_interval_ms, 1_000);
    }

    #[test]
    fn invalid_values_rejected() {
        let err = MissionConfig::from_toml_str("[admission]\nwindow_capacity = 0\n");
        assert!(matches!(err, Err(HiveError::Config(_))));

        let err = MissionConfig::from_toml_str("mission_timeout_secs = \"soon\"");
        assert!(matches!(err, Err(HiveError::ConfigFile(_))));
    }
}
