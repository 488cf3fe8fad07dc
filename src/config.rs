use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Hard cap on the number of samples the spike-insensitive estimator inspects.
pub const DEFAULT_MAX_SAMPLES: usize = 50_000;

/// Fraction of values discarded on each tail by default.
pub const DEFAULT_SPIKE_PERCENTILE: f64 = 0.005;

/// Tuning for the spike-insensitive range estimator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpikeConfig {
    pub percentile: f64,
    pub max_samples: usize,
}

impl Default for SpikeConfig {
    fn default() -> Self {
        Self {
            percentile: DEFAULT_SPIKE_PERCENTILE,
            max_samples: DEFAULT_MAX_SAMPLES,
        }
    }
}

/// Engine-wide settings, usually loaded from the application's JSON settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub spike: SpikeConfig,
    /// Zero-fill newly added cells when a matrix changes shape.
    pub reinitialize_on_change: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            spike: SpikeConfig::default(),
            reinitialize_on_change: true,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_object() {
        let config = EngineConfig::from_json("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.spike.max_samples, 50_000);
    }

    #[test]
    fn test_partial_override() {
        let config = EngineConfig::from_json(r#"{"spike": {"percentile": 0.01}}"#).unwrap();
        assert!((config.spike.percentile - 0.01).abs() < 1e-12);
        assert_eq!(config.spike.max_samples, DEFAULT_MAX_SAMPLES);
        assert!(config.reinitialize_on_change);
    }

    #[test]
    fn test_bad_json_is_json_error() {
        let err = EngineConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, crate::error::MatrixError::Json(_)));
    }

    #[test]
    fn test_json_round_trip() {
        let mut config = EngineConfig::default();
        config.reinitialize_on_change = false;
        config.spike.max_samples = 1000;
        let json = config.to_json().unwrap();
        assert_eq!(EngineConfig::from_json(&json).unwrap(), config);
    }
}
