//! Configuration file support.
//!
//! Pipeline settings are loaded from TOML for reproducible dataset builds.
//! Keys are snake_case; the camelCase spellings `sequenceLength`,
//! `forecastHorizon`, `trainSplitPercent` and `expectedSymbolCount` are
//! accepted as aliases.

use crate::align::AlignConfig;
use crate::data::DataConfig;
use crate::error::{PipelineError, Result};
use crate::normalize::NormalizationScope;
use crate::window::WindowConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

/// Complete pipeline configuration loaded from a file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub data: DataSettings,
    #[serde(default)]
    pub window: WindowSettings,
    #[serde(default)]
    pub split: SplitSettings,
}

/// Input data settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataSettings {
    /// CSV file or directory of per-symbol CSV files.
    pub path: Option<String>,
    /// Date format tried before the built-in ones.
    pub date_format: Option<String>,
    /// CSV delimiter; auto-detected when absent.
    pub delimiter: Option<char>,
    /// Expected number of symbols; a mismatch only warns.
    #[serde(default, alias = "expectedSymbolCount")]
    pub expected_symbol_count: Option<usize>,
    /// Fail on dates that cannot be parsed instead of keeping them verbatim.
    #[serde(default, alias = "strictDates")]
    pub strict_dates: bool,
}

/// Sliding-window settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowSettings {
    #[serde(default = "default_sequence_length", alias = "sequenceLength")]
    pub sequence_length: usize,
    #[serde(default = "default_forecast_horizon", alias = "forecastHorizon")]
    pub forecast_horizon: usize,
}

fn default_sequence_length() -> usize {
    20
}

fn default_forecast_horizon() -> usize {
    5
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            sequence_length: 20,
            forecast_horizon: 5,
        }
    }
}

/// Train/test split settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitSettings {
    /// Percentage of samples used for training.
    #[serde(default = "default_train_split", alias = "trainSplitPercent")]
    pub train_split_percent: f64,
    /// Dates contributing to normalization statistics.
    #[serde(default)]
    pub normalization: NormalizationScope,
}

fn default_train_split() -> f64 {
    80.0
}

impl Default for SplitSettings {
    fn default() -> Self {
        Self {
            train_split_percent: 80.0,
            normalization: NormalizationScope::FullSeries,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        let content = fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        Ok(config)
    }

    /// Parse and validate TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| PipelineError::ConfigError(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        self.window_config().validate()?;
        let p = self.split.train_split_percent;
        if !(0.0..=100.0).contains(&p) {
            return Err(PipelineError::ConfigError(format!(
                "train_split_percent must be within 0..=100, got {}",
                p
            )));
        }
        if let Some(d) = self.data.delimiter {
            if !d.is_ascii() {
                return Err(PipelineError::ConfigError(format!(
                    "delimiter must be a single ASCII character, got {:?}",
                    d
                )));
            }
        }
        Ok(())
    }

    pub fn window_config(&self) -> WindowConfig {
        WindowConfig::new(self.window.sequence_length, self.window.forecast_horizon)
    }

    pub fn align_config(&self) -> AlignConfig {
        AlignConfig {
            date_format: self.data.date_format.clone(),
            expected_symbol_count: self.data.expected_symbol_count,
            strict_dates: self.data.strict_dates,
        }
    }

    pub fn data_config(&self) -> DataConfig {
        DataConfig {
            delimiter: self.data.delimiter.map(|c| c as u8),
            default_symbol: None,
        }
    }

    /// Generate an example configuration file content.
    pub fn example() -> String {
        r#"# risewin pipeline configuration

[data]
# CSV file with Date, Symbol, Open, Close columns,
# or a directory of per-symbol CSV files (symbol = file name)
path = "data/prices.csv"
# date_format = "%Y-%m-%d"
# delimiter = ","
expected_symbol_count = 5
strict_dates = false

[window]
sequence_length = 20
forecast_horizon = 5

[split]
train_split_percent = 80.0
# "full_series" or "train_only"
normalization = "full_series"
"#
        .to_string()
    }
}
