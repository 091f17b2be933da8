use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::calibration::Calibration;
use crate::data::model::Role;

/// Magnitude beyond which a derived value is treated as a numeric artifact.
pub const DEFAULT_LARGE_ERROR_THRESHOLD: f64 = 1e18;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("channels must be at least 1")]
    NoChannels,
    #[error("save.max_attempts must be at least 1")]
    NoSaveAttempts,
    #[error("calibration.millivolts_per_volt must be finite and non-zero")]
    BadGain,
    #[error("large_error_threshold must be positive")]
    BadThreshold,
}

// ---------------------------------------------------------------------------
// Input layout
// ---------------------------------------------------------------------------

/// How channel blocks are found in the input file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Layout {
    pub channels: usize,
    /// Columns before the first channel block.
    pub header_columns: usize,
    /// Header of the set-point key column.
    pub group_column: String,
    pub input_row_suffix: String,
    pub measured_suffix: String,
    pub expected_suffix: String,
    pub time_suffix: String,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            channels: 29,
            header_columns: 4,
            group_column: "InputRow".to_owned(),
            input_row_suffix: "InputRow".to_owned(),
            measured_suffix: "MeasuredVolt".to_owned(),
            expected_suffix: "ExpectedVolt".to_owned(),
            time_suffix: "Time".to_owned(),
        }
    }
}

impl Layout {
    pub fn suffix(&self, role: Role) -> &str {
        match role {
            Role::InputRow => &self.input_row_suffix,
            Role::Measured => &self.measured_suffix,
            Role::Expected => &self.expected_suffix,
            Role::Time => &self.time_suffix,
        }
    }
}

// ---------------------------------------------------------------------------
// Saving
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveConfig {
    pub max_attempts: u32,
    /// Ask on stdin before retrying a locked output file.
    pub interactive: bool,
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            interactive: true,
        }
    }
}

// ---------------------------------------------------------------------------
// RunConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub input: PathBuf,
    /// Defaults to the input path with an `.xlsx` extension.
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(flatten)]
    pub layout: Layout,
    #[serde(default)]
    pub calibration: Calibration,
    #[serde(default = "default_large_error_threshold")]
    pub large_error_threshold: f64,
    #[serde(default)]
    pub save: SaveConfig,
}

fn default_large_error_threshold() -> f64 {
    DEFAULT_LARGE_ERROR_THRESHOLD
}

impl RunConfig {
    pub fn new(input: PathBuf) -> Self {
        Self {
            input,
            output: None,
            layout: Layout::default(),
            calibration: Calibration::default(),
            large_error_threshold: DEFAULT_LARGE_ERROR_THRESHOLD,
            save: SaveConfig::default(),
        }
    }

    /// Read a config file, dispatching on extension (`.toml` or `.json`).
    /// A relative `input`/`output` is resolved against the file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        let mut config: RunConfig = match ext.as_str() {
            "toml" => toml::from_str(&text).context("parsing TOML config")?,
            "json" => serde_json::from_str(&text).context("parsing JSON config")?,
            other => bail!("Unsupported config extension: .{other}"),
        };

        if let Some(base) = path.parent() {
            if config.input.is_relative() {
                config.input = base.join(&config.input);
            }
            if let Some(out) = config.output.as_mut().filter(|o| o.is_relative()) {
                *out = base.join(&*out);
            }
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.layout.channels == 0 {
            return Err(ConfigError::NoChannels);
        }
        if self.save.max_attempts == 0 {
            return Err(ConfigError::NoSaveAttempts);
        }
        let gain = self.calibration.millivolts_per_volt;
        if !gain.is_finite() || gain == 0.0 {
            return Err(ConfigError::BadGain);
        }
        if self.large_error_threshold.is_nan() || self.large_error_threshold <= 0.0 {
            return Err(ConfigError::BadThreshold);
        }
        Ok(())
    }

    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| self.input.with_extension("xlsx"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_config_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.toml");
        std::fs::write(
            &path,
            r#"
input = "data/run.csv"
channels = 3

[calibration]
lower_bound_volts = -5.0
"#,
        )
        .unwrap();

        let config = RunConfig::load(&path).unwrap();
        assert_eq!(config.input, dir.path().join("data/run.csv"));
        assert_eq!(config.layout.channels, 3);
        assert_eq!(config.layout.header_columns, 4);
        assert_eq!(config.calibration.lower_bound_volts, -5.0);
        assert_eq!(config.calibration.millivolts_per_volt, 100.0);
        assert_eq!(config.large_error_threshold, 1e18);
        assert_eq!(config.save, SaveConfig::default());
        assert_eq!(config.output_path(), dir.path().join("data/run.xlsx"));
    }

    #[test]
    fn json_config_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        std::fs::write(
            &path,
            r#"{"input": "/abs/run.csv", "output": "out.xlsx", "channels": 2,
                "save": {"max_attempts": 1, "interactive": false}}"#,
        )
        .unwrap();

        let config = RunConfig::load(&path).unwrap();
        assert_eq!(config.input, PathBuf::from("/abs/run.csv"));
        assert_eq!(config.output_path(), dir.path().join("out.xlsx"));
        assert!(!config.save.interactive);
    }

    #[test]
    fn zero_channels_fail_validation() {
        let mut config = RunConfig::new("run.csv".into());
        config.layout.channels = 0;
        assert_eq!(config.validate(), Err(ConfigError::NoChannels));
        config.layout.channels = 1;
        config.calibration.millivolts_per_volt = f64::NAN;
        assert_eq!(config.validate(), Err(ConfigError::BadGain));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.yaml");
        std::fs::write(&path, "input: x").unwrap();
        assert!(RunConfig::load(&path).is_err());
    }
}
