//! Typed engine configuration.
//!
//! Every section and field has a default, so a config file only needs to
//! name what it changes. Loading from RON, TOML or JSON lives in
//! `stellar-data`.

use serde::{Deserialize, Serialize};

use crate::numeral::{DEFAULT_EXPONENTIAL_FROM, Numeral};

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Base production and economy tuning.
    #[serde(default)]
    pub economy: EconomyConfig,

    /// Tick periods.
    #[serde(default)]
    pub timing: TimingConfig,

    /// Save scheduling.
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Number rendering.
    #[serde(default)]
    pub display: DisplayConfig,

    /// Probability forge random source.
    #[serde(default)]
    pub forge: ForgeConfig,

    /// Achievement notifications.
    #[serde(default)]
    pub predicates: PredicateConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomyConfig {
    /// Energy per second before any node effect.
    #[serde(default = "default_base_production")]
    pub base_production: Numeral,

    /// Base of the log-scaled echo fragment reward.
    #[serde(default = "default_echo_base_threshold")]
    pub echo_base_threshold: Numeral,

    /// Momentum bonus per advance in the current run.
    #[serde(default)]
    pub momentum_per_run: f64,

    /// Upper bound on offline catch-up, if any.
    #[serde(default)]
    pub offline_cap_seconds: Option<f64>,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            base_production: default_base_production(),
            echo_base_threshold: default_echo_base_threshold(),
            momentum_per_run: 0.0,
            offline_cap_seconds: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_ledger_tick_seconds")]
    pub ledger_tick_seconds: f64,

    #[serde(default = "default_automation_tick_seconds")]
    pub automation_tick_seconds: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            ledger_tick_seconds: default_ledger_tick_seconds(),
            automation_tick_seconds: default_automation_tick_seconds(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Repeated save requests for one key within this window coalesce.
    #[serde(default = "default_save_debounce_ms")]
    pub save_debounce_ms: u64,

    /// Minimum spacing between two writes of the same key.
    #[serde(default = "default_save_min_interval_ms")]
    pub save_min_interval_ms: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            save_debounce_ms: default_save_debounce_ms(),
            save_min_interval_ms: default_save_min_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_display_precision")]
    pub precision: usize,

    /// Exponent from which numbers render in exponential notation.
    #[serde(default = "default_exponential_from")]
    pub exponential_from: i64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            precision: default_display_precision(),
            exponential_from: default_exponential_from(),
        }
    }
}

impl DisplayConfig {
    pub fn format(&self, value: Numeral) -> String {
        value.display_with(self.precision, self.exponential_from)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForgeConfig {
    #[serde(default = "default_forge_seed")]
    pub seed: u64,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            seed: default_forge_seed(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredicateConfig {
    /// Most recent unlock notifications kept; older ones drop off.
    #[serde(default = "default_notification_capacity")]
    pub notification_capacity: usize,
}

impl Default for PredicateConfig {
    fn default() -> Self {
        Self {
            notification_capacity: default_notification_capacity(),
        }
    }
}

fn default_base_production() -> Numeral {
    Numeral::ONE
}

fn default_echo_base_threshold() -> Numeral {
    Numeral::from(1e35)
}

const fn default_ledger_tick_seconds() -> f64 {
    0.1
}

const fn default_automation_tick_seconds() -> f64 {
    0.5
}

const fn default_save_debounce_ms() -> u64 {
    1_000
}

const fn default_save_min_interval_ms() -> u64 {
    5_000
}

const fn default_display_precision() -> usize {
    2
}

const fn default_exponential_from() -> i64 {
    DEFAULT_EXPONENTIAL_FROM
}

const fn default_forge_seed() -> u64 {
    0x5EED_F0E6_2024_0001
}

const fn default_notification_capacity() -> usize {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = EngineConfig::default();
        assert_eq!(config.economy.base_production, Numeral::ONE);
        assert_eq!(config.economy.echo_base_threshold, "1e35".parse().unwrap());
        assert_eq!(config.persistence.save_debounce_ms, 1000);
        assert_eq!(config.persistence.save_min_interval_ms, 5000);
        assert_eq!(config.predicates.notification_capacity, 5);
        assert_eq!(config.display.exponential_from, 12);
    }

    #[test]
    fn partial_document_fills_defaults() {
        let json = r#"{ "economy": { "momentum_per_run": 0.05 }, "forge": { "seed": 7 } }"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.economy.momentum_per_run, 0.05);
        assert_eq!(config.economy.base_production, Numeral::ONE);
        assert_eq!(config.forge.seed, 7);
        assert_eq!(config.timing, TimingConfig::default());
    }

    #[test]
    fn display_config_formats() {
        let display = DisplayConfig {
            precision: 1,
            exponential_from: 6,
        };
        assert_eq!(display.format(Numeral::from(2500.0)), "2.5K");
        assert_eq!(display.format(Numeral::from(2.5e6)), "2.5e6");
    }
}
