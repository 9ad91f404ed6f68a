//! Configuration loading and parsing

use anyhow::{Context, Result};
use interlocking_core::EngineConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration (loaded from a TOML file)
///
/// Every section is optional; command-line flags override file values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl AppConfig {
    /// Check the merged configuration (file values plus command-line overrides)
    pub fn validate(&self) -> Result<()> {
        if self.run.cycles == 0 {
            anyhow::bail!("run.cycles must be at least 1");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InputConfig {
    /// Master data (JSON `PlantData`)
    pub plant: Option<PathBuf>,
    /// Live state to start from (JSON `InterlockingState`)
    pub state: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunConfig {
    #[serde(default = "default_cycles")]
    pub cycles: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self { cycles: default_cycles() }
    }
}

fn default_cycles() -> usize {
    1
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
    /// Signals whose aspects are reported; all signals when empty
    #[serde(default)]
    pub signals: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Txt,
    Json,
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    config
        .validate()
        .with_context(|| format!("Invalid config file: {:?}", path))?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_deserialization() {
        let toml_content = r#"
            [input]
            plant = "plant.json"
            state = "state.json"

            [engine]
            max_signal_depth = 3
            tolerate_known_data_gaps = false
            plant_filter = ["TH71", "TH72"]

            [run]
            cycles = 5

            [output]
            format = "json"
            signals = ["TH71_1R", "TH71_2R"]
        "#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.input.plant, Some(PathBuf::from("plant.json")));
        assert_eq!(config.engine.max_signal_depth, 3);
        assert!(!config.engine.tolerate_known_data_gaps);
        assert!(config.engine.should_process_plant("TH72"));
        assert!(!config.engine.should_process_plant("TH75"));
        assert_eq!(config.run.cycles, 5);
        assert_eq!(config.output.format, OutputFormat::Json);
        assert_eq!(config.output.signals.len(), 2);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert!(config.input.plant.is_none());
        assert_eq!(config.engine.max_signal_depth, 4);
        assert!(config.engine.tolerate_known_data_gaps);
        assert_eq!(config.run.cycles, 1);
        assert_eq!(config.output.format, OutputFormat::Txt);
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[input]\nplant = \"th71.json\"\n\n[run]\ncycles = 3").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.input.plant, Some(PathBuf::from("th71.json")));
        assert_eq!(config.run.cycles, 3);
    }

    #[test]
    fn test_load_config_rejects_zero_cycles() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[run]\ncycles = 0").unwrap();
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_load_config_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let error = load_config(&dir.path().join("missing.toml")).unwrap_err();
        assert!(error.to_string().contains("Failed to read config file"));
    }
}
