//! Engine configuration types
//!
//! This module defines the small set of knobs the engine itself needs. Everything about
//! where master data comes from, how often cycles run and how results are shown belongs
//! to the application layer.

use serde::{Deserialize, Serialize};

/// Configuration for the interlocking engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Depth of the next-signal closure and of the aspect look-ahead (default: 4)
    #[serde(default = "default_max_signal_depth")]
    pub max_signal_depth: usize,

    /// Skip the known incomplete areas of the master data instead of failing the load
    #[serde(default = "default_true")]
    pub tolerate_known_data_gaps: bool,

    /// Optional: only load lock-table rows of these plants
    #[serde(default)]
    pub plant_filter: Option<Vec<String>>,
}

fn default_max_signal_depth() -> usize {
    4
}

fn default_true() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_signal_depth: default_max_signal_depth(),
            tolerate_known_data_gaps: default_true(),
            plant_filter: None,
        }
    }
}

impl EngineConfig {
    /// Create a new engine configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the next-signal look-ahead depth
    pub fn with_max_signal_depth(mut self, depth: usize) -> Self {
        self.max_signal_depth = depth;
        self
    }

    /// Builder method: enable or disable the known data-gap exceptions
    pub fn with_known_data_gaps(mut self, tolerated: bool) -> Self {
        self.tolerate_known_data_gaps = tolerated;
        self
    }

    /// Builder method: set plant filter
    pub fn with_plant_filter(mut self, plants: Vec<String>) -> Self {
        self.plant_filter = Some(plants);
        self
    }

    /// Check if lock-table rows of a plant should be loaded
    pub fn should_process_plant(&self, plant: &str) -> bool {
        match &self.plant_filter {
            Some(plants) => plants.iter().any(|p| p == plant),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_builder() {
        let config = EngineConfig::new()
            .with_max_signal_depth(6)
            .with_known_data_gaps(false)
            .with_plant_filter(vec!["TH71".to_string()]);

        assert_eq!(config.max_signal_depth, 6);
        assert!(!config.tolerate_known_data_gaps);
        assert_eq!(config.plant_filter, Some(vec!["TH71".to_string()]));
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_signal_depth, 4);
        assert!(config.tolerate_known_data_gaps);
        assert!(config.should_process_plant("TH58"));
    }

    #[test]
    fn test_filter_logic() {
        let config = EngineConfig::new().with_plant_filter(vec!["TH70".to_string(), "TH71".to_string()]);

        assert!(config.should_process_plant("TH70"));
        assert!(!config.should_process_plant("TH75")); // Not in filter
    }
}
