//! Configuration types for routelet

use crate::{RouteletError, RouteletResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Blacklist configuration
    #[serde(default)]
    pub blacklist: BlacklistConfig,
    /// Strategy used when the caller does not name one
    #[serde(default)]
    pub default_strategy: LoadBalanceStrategy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            blacklist: BlacklistConfig::default(),
            default_strategy: LoadBalanceStrategy::Random,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> RouteletResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RouteletError::Config(format!("Failed to read config file: {}", e)))?;
        let config: Self = toml::from_str(&content)?;
        config.blacklist.validate()?;
        Ok(config)
    }
}

/// Blacklist configuration
///
/// All durations are seconds and may be fractional. Values are validated at
/// construction and again by the runtime setters; changes through the
/// setters take effect on the next probe cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlacklistConfig {
    /// Entry lifetime in seconds
    #[serde(default = "default_ttl")]
    pub ttl_seconds: f64,
    /// Cadence of the background recovery sweep in seconds
    #[serde(default = "default_probe_interval")]
    pub probe_interval_secs: f64,
    /// Per-probe dial timeout in seconds
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_secs: f64,
}

fn default_ttl() -> f64 {
    30.0
}

fn default_probe_interval() -> f64 {
    5.0
}

fn default_connection_timeout() -> f64 {
    1.0
}

impl Default for BlacklistConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl(),
            probe_interval_secs: default_probe_interval(),
            connection_timeout_secs: default_connection_timeout(),
        }
    }
}

impl BlacklistConfig {
    /// Validate all duration fields
    pub fn validate(&self) -> RouteletResult<()> {
        validate_seconds("ttl_seconds", self.ttl_seconds)?;
        validate_seconds("probe_interval_secs", self.probe_interval_secs)?;
        validate_seconds("connection_timeout_secs", self.connection_timeout_secs)?;
        Ok(())
    }
}

/// Reject negative or non-finite durations
pub fn validate_seconds(name: &str, value: f64) -> RouteletResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(RouteletError::Config(format!(
            "{} must be a non-negative number, got {}",
            name, value
        )));
    }
    Ok(())
}

/// Load balancing strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoadBalanceStrategy {
    /// Uniform random choice
    #[default]
    Random,
    /// Per-service round-robin
    RoundRobin,
    /// Random choice proportional to instance weight
    WeightedRandom,
}

impl std::fmt::Display for LoadBalanceStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadBalanceStrategy::Random => write!(f, "random"),
            LoadBalanceStrategy::RoundRobin => write!(f, "round-robin"),
            LoadBalanceStrategy::WeightedRandom => write!(f, "weighted-random"),
        }
    }
}

impl FromStr for LoadBalanceStrategy {
    type Err = std::convert::Infallible;

    /// Unknown names fall back to `Random`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "round-robin" | "round_robin" | "roundrobin" => LoadBalanceStrategy::RoundRobin,
            "weighted-random" | "weighted_random" | "weightedrandom" => {
                LoadBalanceStrategy::WeightedRandom
            }
            _ => LoadBalanceStrategy::Random,
        })
    }
}
