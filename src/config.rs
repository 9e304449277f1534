//! Configuration management for the loan risk pipeline

use crate::models::explain::DEFAULT_TOP_FACTORS;
use anyhow::{Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub explain: ExplainConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Locations of the reference artifacts
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DataConfig {
    /// FICO tier -> bureau field defaults (JSON)
    #[serde(default = "default_imputation_table")]
    pub imputation_table: PathBuf,
    /// Unemployment rate series (CSV)
    #[serde(default = "default_unemployment_series")]
    pub unemployment_series: PathBuf,
    /// Value column of the unemployment series
    #[serde(default = "default_unemployment_column")]
    pub unemployment_column: String,
    /// Consumer loan delinquency rate series (CSV)
    #[serde(default = "default_delinquency_series")]
    pub delinquency_series: PathBuf,
    /// Value column of the delinquency series
    #[serde(default = "default_delinquency_column")]
    pub delinquency_column: String,
    /// Trained model bundle (JSON)
    #[serde(default = "default_model_bundle")]
    pub model_bundle: PathBuf,
}

fn default_imputation_table() -> PathBuf {
    PathBuf::from("data/fico_imputation_table.json")
}

fn default_unemployment_series() -> PathBuf {
    PathBuf::from("data/UNRATE.csv")
}

fn default_unemployment_column() -> String {
    "UNRATE".to_string()
}

fn default_delinquency_series() -> PathBuf {
    PathBuf::from("data/DRCLACBS.csv")
}

fn default_delinquency_column() -> String {
    "DRCLACBS".to_string()
}

fn default_model_bundle() -> PathBuf {
    PathBuf::from("models/model_bundle.json")
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            imputation_table: default_imputation_table(),
            unemployment_series: default_unemployment_series(),
            unemployment_column: default_unemployment_column(),
            delinquency_series: default_delinquency_series(),
            delinquency_column: default_delinquency_column(),
            model_bundle: default_model_bundle(),
        }
    }
}

impl DataConfig {
    /// Resolve every relative path against `base`
    pub fn relative_to<P: AsRef<Path>>(&self, base: P) -> Self {
        let base = base.as_ref();
        let resolve = |p: &PathBuf| {
            if p.is_absolute() {
                p.clone()
            } else {
                base.join(p)
            }
        };

        Self {
            imputation_table: resolve(&self.imputation_table),
            unemployment_series: resolve(&self.unemployment_series),
            unemployment_column: self.unemployment_column.clone(),
            delinquency_series: resolve(&self.delinquency_series),
            delinquency_column: self.delinquency_column.clone(),
            model_bundle: resolve(&self.model_bundle),
        }
    }
}

/// Explanation configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ExplainConfig {
    /// Number of top risk factors per prediction
    #[serde(default = "default_top_factors")]
    pub top_factors: usize,
}

fn default_top_factors() -> usize {
    DEFAULT_TOP_FACTORS
}

impl Default for ExplainConfig {
    fn default() -> Self {
        Self {
            top_factors: default_top_factors(),
        }
    }
}

/// Batch runner configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Maximum applications scored concurrently
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_workers() -> usize {
    4
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (json, pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default file
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(
            config.data.model_bundle,
            PathBuf::from("models/model_bundle.json")
        );
        assert_eq!(config.data.unemployment_column, "UNRATE");
        assert_eq!(config.data.delinquency_column, "DRCLACBS");
        assert_eq!(config.explain.top_factors, 3);
        assert_eq!(config.pipeline.workers, 4);
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[data]\nmodel_bundle = \"/srv/models/v2.json\"\n\n[pipeline]\nworkers = 8"
        )
        .unwrap();

        let config = AppConfig::load_from_path(file.path()).unwrap();

        assert_eq!(config.data.model_bundle, PathBuf::from("/srv/models/v2.json"));
        assert_eq!(config.data.unemployment_column, "UNRATE");
        assert_eq!(config.pipeline.workers, 8);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_relative_paths() {
        let data = DataConfig {
            model_bundle: PathBuf::from("/abs/model.json"),
            ..DataConfig::default()
        };

        let resolved = data.relative_to("/opt/risk");

        assert_eq!(resolved.model_bundle, PathBuf::from("/abs/model.json"));
        assert_eq!(
            resolved.imputation_table,
            PathBuf::from("/opt/risk/data/fico_imputation_table.json")
        );
    }
}
