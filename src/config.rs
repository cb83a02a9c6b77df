// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Multilocator configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// One locator's fixed position and orientation, used by the estimator to
/// turn bearings into coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocatorConfig {
    pub id: String,
    pub coordinate: [f32; 3],
    #[serde(default)]
    pub orientation: [f32; 3],
}

/// Multilocator aggregator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultilocatorConfig {
    /// Identifier for this aggregator instance, used as the MQTT client ID
    /// and as the middle segment of published position topics.
    pub multilocator_id: String,

    /// Locators this instance correlates reports from.
    pub locators: Vec<LocatorConfig>,

    /// Cap on `locators.len()` (reference 6).
    #[serde(default = "default_max_locators")]
    pub max_locators: usize,

    /// Cap on concurrently tracked tags (reference 50).
    #[serde(default = "default_max_tags")]
    pub max_tags: usize,

    /// Correlation window depth per tag (reference 6).
    #[serde(default = "default_max_sequence_ids")]
    pub max_sequence_ids: usize,

    /// Largest signed sequence distance still considered in-window
    /// (reference 20).
    #[serde(default = "default_max_sequence_diff")]
    pub max_sequence_diff: i32,

    /// Estimator step interval in seconds (reference 0.1).
    #[serde(default = "default_estimation_interval_secs")]
    pub estimation_interval_secs: f32,

    /// Exponential moving-average weight for the axis filter
    /// (reference 0.1).
    #[serde(default = "default_filtering_amount")]
    pub filtering_amount: f32,

    /// MQTT topic prefix angle reports arrive on, e.g. `aoa/angle`;
    /// subscribed as `<prefix>/+/+` (locator id / tag id).
    #[serde(default = "default_angle_topic_prefix")]
    pub angle_topic_prefix: String,

    /// MQTT topic prefix estimated positions are published under.
    #[serde(default = "default_position_topic_prefix")]
    pub position_topic_prefix: String,
}

fn default_max_locators() -> usize {
    6
}

fn default_max_tags() -> usize {
    50
}

fn default_max_sequence_ids() -> usize {
    6
}

fn default_max_sequence_diff() -> i32 {
    20
}

fn default_estimation_interval_secs() -> f32 {
    0.1
}

fn default_filtering_amount() -> f32 {
    0.1
}

fn default_angle_topic_prefix() -> String {
    "aoa/angle".to_string()
}

fn default_position_topic_prefix() -> String {
    "aoa/position".to_string()
}

impl MultilocatorConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save configuration to a JSON file.
    pub fn to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))
    }

    pub fn estimation_interval(&self) -> Duration {
        Duration::from_secs_f32(self.estimation_interval_secs)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.locators.is_empty() {
            return Err(ConfigError::InvalidValue("locators cannot be empty".into()));
        }
        if self.locators.len() > self.max_locators {
            return Err(ConfigError::InvalidValue(format!(
                "locators.len() ({}) exceeds max_locators ({})",
                self.locators.len(),
                self.max_locators
            )));
        }
        if self.max_tags == 0 {
            return Err(ConfigError::InvalidValue("max_tags cannot be 0".into()));
        }
        if self.max_sequence_ids == 0 {
            return Err(ConfigError::InvalidValue("max_sequence_ids cannot be 0".into()));
        }
        crate::sequence::validate_max_diff(self.max_sequence_diff, self.max_sequence_ids)
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;
        if !(0.0..=1.0).contains(&self.filtering_amount) {
            return Err(ConfigError::InvalidValue("filtering_amount must be in [0, 1]".into()));
        }
        if self.estimation_interval_secs <= 0.0 {
            return Err(ConfigError::InvalidValue("estimation_interval_secs must be > 0".into()));
        }
        let mut seen = std::collections::HashSet::new();
        for locator in &self.locators {
            if !seen.insert(locator.id.as_str()) {
                return Err(ConfigError::InvalidValue(format!("duplicate locator id: {}", locator.id)));
            }
        }
        Ok(())
    }
}

/// Configuration error types.
#[derive(Debug, Clone)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IoError(s) => write!(f, "I/O error: {s}"),
            Self::ParseError(s) => write!(f, "parse error: {s}"),
            Self::SerializeError(s) => write!(f, "serialize error: {s}"),
            Self::InvalidValue(s) => write!(f, "invalid value: {s}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn locator(id: &str) -> LocatorConfig {
        LocatorConfig {
            id: id.to_string(),
            coordinate: [0.0, 0.0, 0.0],
            orientation: [0.0, 0.0, 0.0],
        }
    }

    fn valid_config() -> MultilocatorConfig {
        MultilocatorConfig {
            multilocator_id: "ml1".into(),
            locators: vec![locator("loc0"), locator("loc1"), locator("loc2")],
            max_locators: default_max_locators(),
            max_tags: default_max_tags(),
            max_sequence_ids: default_max_sequence_ids(),
            max_sequence_diff: default_max_sequence_diff(),
            estimation_interval_secs: default_estimation_interval_secs(),
            filtering_amount: default_filtering_amount(),
            angle_topic_prefix: default_angle_topic_prefix(),
            position_topic_prefix: default_position_topic_prefix(),
        }
    }

    #[test]
    fn valid_config_passes_validation() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn rejects_empty_locators() {
        let mut cfg = valid_config();
        cfg.locators.clear();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_too_many_locators_for_max_locators() {
        let mut cfg = valid_config();
        cfg.max_locators = 2;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_duplicate_locator_ids() {
        let mut cfg = valid_config();
        cfg.locators.push(locator("loc0"));
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_undersized_max_sequence_diff() {
        let mut cfg = valid_config();
        cfg.max_sequence_diff = 1;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_filtering_amount_out_of_range() {
        let mut cfg = valid_config();
        cfg.filtering_amount = 1.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn round_trips_through_json() {
        let cfg = valid_config();
        let json = serde_json::to_string(&cfg).unwrap();
        let parsed: MultilocatorConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg.multilocator_id, parsed.multilocator_id);
        assert_eq!(cfg.locators, parsed.locators);
    }

    #[test]
    fn loads_from_file() {
        let cfg = valid_config();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        cfg.to_file(&path).unwrap();
        let loaded = MultilocatorConfig::from_file(&path).unwrap();
        assert_eq!(loaded.multilocator_id, cfg.multilocator_id);
    }
}
