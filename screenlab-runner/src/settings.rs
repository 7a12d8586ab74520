//! Screener settings file (`screenlab.toml`).
//!
//! ```toml
//! [run]
//! data_dir = "data"
//! models_dir = "models"      # optional; built-ins when absent
//! output_dir = "results"
//! only = ["turnaround"]      # optional; all discovered models when empty
//!
//! [aggregation.signal]
//! warning_penalty = 2.0
//! ```
//!
//! Every field has a default, so an empty file is valid.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use screenlab_core::{AggregationConfig, Category};

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse settings: {0}")]
    Parse(String),

    #[error("invalid settings: {0}")]
    Invalid(String),
}

/// Where the run reads and writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    pub data_dir: PathBuf,
    /// Replace the built-in models with the definitions in this directory
    pub models_dir: Option<PathBuf>,
    pub output_dir: PathBuf,
    /// Restrict the run to these model ids
    pub only: Vec<String>,
    /// Rows generated per model for synthetic runs
    pub synthetic_rows: usize,
    pub synthetic_seed: u64,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            models_dir: None,
            output_dir: PathBuf::from("results"),
            only: Vec::new(),
            synthetic_rows: 60,
            synthetic_seed: 42,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenerConfig {
    pub run: RunSettings,
    pub aggregation: AggregationConfig,
}

impl ScreenerConfig {
    /// Load settings from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse settings from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let config: Self =
            toml::from_str(content).map_err(|e| SettingsError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        let agg = &self.aggregation;
        if agg.elite_tiers.iter().any(|t| t.max_rank == 0 || !t.points.is_finite()) {
            return Err(SettingsError::Invalid(
                "elite tiers need max_rank >= 1 and finite points".into(),
            ));
        }
        let coefficients = [
            agg.signal.flag_density,
            agg.signal.warning_penalty,
            agg.signal.consistency_max,
            agg.thesis.strong_strength,
            agg.thesis.medium_strength,
        ];
        if coefficients.iter().any(|c| !c.is_finite() || *c < 0.0) {
            return Err(SettingsError::Invalid(
                "aggregation coefficients must be finite and non-negative".into(),
            ));
        }
        for category in Category::ALL {
            let weight = agg.category_weights.get(category);
            if !weight.is_finite() || weight < 0.0 {
                return Err(SettingsError::Invalid(format!(
                    "category weight for {} must be finite and non-negative, got {weight}",
                    category.as_str()
                )));
            }
        }
        if agg.thesis.medium_strength > agg.thesis.strong_strength {
            return Err(SettingsError::Invalid(
                "thesis medium_strength exceeds strong_strength".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = ScreenerConfig::from_toml("").unwrap();
        assert_eq!(config, ScreenerConfig::default());
        assert_eq!(config.aggregation.signal.warning_penalty, 2.0);
        assert_eq!(config.aggregation.category_weights.quality, 1.5);
        assert_eq!(config.aggregation.elite_tiers.len(), 3);
    }

    #[test]
    fn partial_override() {
        let config = ScreenerConfig::from_toml(
            r#"
            [run]
            data_dir = "snapshots/2024"
            only = ["turnaround", "cash_quality"]

            [aggregation.signal]
            warning_penalty = 3.5

            [aggregation.category_weights]
            safety = 2.0

            [[aggregation.elite_tiers]]
            max_rank = 3
            points = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.run.data_dir, PathBuf::from("snapshots/2024"));
        assert_eq!(config.run.output_dir, PathBuf::from("results"));
        assert_eq!(config.run.only.len(), 2);
        assert_eq!(config.aggregation.signal.warning_penalty, 3.5);
        assert_eq!(config.aggregation.signal.flag_density, 3.0);
        assert_eq!(config.aggregation.category_weights.safety, 2.0);
        assert_eq!(config.aggregation.category_weights.quality, 1.5);
        assert_eq!(config.aggregation.elite_tiers.len(), 1);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = ScreenerConfig::from_toml("[aggregation.signal]\nwarning_penalty = -1").unwrap_err();
        assert!(matches!(err, SettingsError::Invalid(_)));
        let err = ScreenerConfig::from_toml("[run\n").unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }

    #[test]
    fn negative_or_nan_category_weight_is_rejected() {
        for bad in ["-0.5", "nan", "inf"] {
            let text = format!("[aggregation.category_weights]\nsafety = {bad}");
            match ScreenerConfig::from_toml(&text) {
                Err(SettingsError::Invalid(msg)) => assert!(msg.contains("safety"), "{msg}"),
                other => panic!("{bad}: expected invalid, got {other:?}"),
            }
        }
        assert!(ScreenerConfig::from_toml("[aggregation.category_weights]\nvalue = 0").is_ok());
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = ScreenerConfig::from_file(Path::new("/nonexistent/screenlab.toml")).unwrap_err();
        assert!(matches!(err, SettingsError::Read { .. }));
    }
}
