//! Pipeline configuration with validation.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid pending-call setting: {0}")]
    InvalidCallbacks(String),
    #[error("invalid config bus setting: {0}")]
    InvalidBus(String),
    #[error("invalid limiter setting: {0}")]
    InvalidLimiter(String),
    #[error("malformed configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Main pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InvokeConfig {
    /// Pending-call tracking (timeouts of in-flight provider calls)
    pub callbacks: CallbackConfig,
    /// Configuration change bus
    pub bus: BusConfig,
    /// Rate limiter defaults
    pub limiter: LimiterSettings,
}

impl InvokeConfig {
    /// Parse from JSON, filling omitted sections with defaults
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: InvokeConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.callbacks.sweep_interval.is_zero() {
            return Err(ConfigError::InvalidCallbacks(
                "sweep_interval cannot be 0".into(),
            ));
        }
        if self.callbacks.default_timeout.is_zero() {
            return Err(ConfigError::InvalidCallbacks(
                "default_timeout cannot be 0".into(),
            ));
        }
        if self.bus.capacity == 0 {
            return Err(ConfigError::InvalidBus("capacity cannot be 0".into()));
        }
        if self.limiter.default_type.trim().is_empty() {
            return Err(ConfigError::InvalidLimiter(
                "default_type cannot be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Pending-call tracking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CallbackConfig {
    /// How often expired in-flight calls are swept
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
    /// Timeout applied when a request carries none
    #[serde(with = "humantime_serde")]
    pub default_timeout: Duration,
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_millis(100),
            default_timeout: Duration::from_secs(5),
        }
    }
}

/// Configuration change bus settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Events buffered per subscriber before lagging
    pub capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}

/// Rate limiter defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimiterSettings {
    /// Algorithm used when an entry does not name one
    pub default_type: String,
}

impl Default for LimiterSettings {
    fn default() -> Self {
        Self {
            default_type: crate::limiter::DEFAULT_LIMITER_TYPE.to_string(),
        }
    }
}
