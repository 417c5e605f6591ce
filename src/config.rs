//! Configuration management for the donation fraud detector

use crate::error::{Error, Result};
use crate::preprocess::{CategoricalColumn, NumericColumn};
use config::{Config, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Anomaly scoring strategy
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyStrategy {
    /// Randomized isolation trees - supports out-of-sample scoring
    #[default]
    IsolationForest,
    /// Local outlier factor over a stored reference set
    Lof,
}

impl AnomalyStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyStrategy::IsolationForest => "isolation_forest",
            AnomalyStrategy::Lof => "lof",
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub features: FeaturesConfig,
    pub model: ModelConfig,
    pub paths: PathsConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// Feature columns fed to the preprocessor
#[derive(Debug, Clone, Deserialize)]
pub struct FeaturesConfig {
    /// Standardized columns, in output order
    pub numerical: Vec<String>,
    /// One-hot encoded columns, in output order
    pub categorical: Vec<String>,
}

/// Anomaly model configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Scoring strategy: "isolation_forest" or "lof"
    pub algorithm: AnomalyStrategy,
    /// Expected fraud prevalence, used to calibrate the outlier threshold
    pub contamination: f64,
    /// Number of isolation trees
    #[serde(default = "default_n_estimators")]
    pub n_estimators: usize,
    /// Rows sampled per isolation tree
    #[serde(default = "default_max_samples")]
    pub max_samples: usize,
    /// Neighborhood size for LOF
    #[serde(default = "default_n_neighbors")]
    pub n_neighbors: usize,
    /// Seed for tree construction and train/test splitting
    #[serde(default = "default_random_state")]
    pub random_state: u64,
    /// Held-out share of each class during training
    #[serde(default = "default_test_size")]
    pub test_size: f64,
    /// Fewest records the preprocessor will fit on
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,
}

fn default_n_estimators() -> usize {
    100
}

fn default_max_samples() -> usize {
    256
}

fn default_n_neighbors() -> usize {
    20
}

fn default_random_state() -> u64 {
    42
}

fn default_test_size() -> f64 {
    0.2
}

fn default_min_samples() -> usize {
    10
}

/// Artifact locations
#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    /// Serialized anomaly model state
    pub model: PathBuf,
    /// Serialized preprocessor state
    pub preprocessor: PathBuf,
}

/// Serving loop configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Maximum predictions in flight
    pub workers: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load and validate configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let config = Config::builder()
            .add_source(File::from(path))
            .build()
            .map_err(|e| {
                Error::Configuration(format!("failed to read {}: {}", path.display(), e))
            })?;

        let config: AppConfig = config
            .try_deserialize()
            .map_err(|e| Error::Configuration(format!("failed to deserialize: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let contamination = self.model.contamination;
        if !(contamination > 0.0 && contamination <= 0.5) {
            return Err(Error::Configuration(format!(
                "contamination must be in (0, 0.5], got {}",
                contamination
            )));
        }
        if !(self.model.test_size > 0.0 && self.model.test_size < 1.0) {
            return Err(Error::Configuration(format!(
                "test_size must be in (0, 1), got {}",
                self.model.test_size
            )));
        }
        if self.model.n_estimators == 0 || self.model.max_samples == 0 {
            return Err(Error::Configuration(
                "n_estimators and max_samples must be positive".to_string(),
            ));
        }
        if self.model.n_neighbors == 0 {
            return Err(Error::Configuration(
                "n_neighbors must be positive".to_string(),
            ));
        }
        if self.model.min_samples == 0 {
            return Err(Error::Configuration(
                "min_samples must be positive".to_string(),
            ));
        }
        if self.pipeline.workers == 0 {
            return Err(Error::Configuration("workers must be positive".to_string()));
        }
        if self.features.numerical.is_empty() && self.features.categorical.is_empty() {
            return Err(Error::Configuration("no feature columns configured".to_string()));
        }
        for name in &self.features.numerical {
            name.parse::<NumericColumn>()
                .map_err(|_| Error::Configuration(format!("unknown numerical feature '{}'", name)))?;
        }
        for name in &self.features.categorical {
            name.parse::<CategoricalColumn>().map_err(|_| {
                Error::Configuration(format!("unknown categorical feature '{}'", name))
            })?;
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            features: FeaturesConfig {
                numerical: vec![
                    "amount".to_string(),
                    "donation_frequency_from_ip".to_string(),
                    "geo_distance_from_campaign".to_string(),
                    "campaign_age".to_string(),
                    "sentiment_score".to_string(),
                ],
                categorical: vec![
                    "device_type".to_string(),
                    "is_donor_anonymous".to_string(),
                ],
            },
            model: ModelConfig {
                algorithm: AnomalyStrategy::IsolationForest,
                contamination: 0.05,
                n_estimators: default_n_estimators(),
                max_samples: default_max_samples(),
                n_neighbors: default_n_neighbors(),
                random_state: default_random_state(),
                test_size: default_test_size(),
                min_samples: default_min_samples(),
            },
            paths: PathsConfig {
                model: PathBuf::from("models/fraud_model.json"),
                preprocessor: PathBuf::from("models/preprocessor.json"),
            },
            pipeline: PipelineConfig { workers: 4 },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.model.algorithm, AnomalyStrategy::IsolationForest);
        assert_eq!(config.model.contamination, 0.05);
        assert_eq!(config.features.numerical.len(), 5);
        assert_eq!(config.features.categorical.len(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_contamination() {
        let mut config = AppConfig::default();
        config.model.contamination = 0.0;
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
        config.model.contamination = 0.7;
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_rejects_zero_min_samples() {
        let mut config = AppConfig::default();
        config.model.min_samples = 0;
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_rejects_unknown_feature() {
        let mut config = AppConfig::default();
        config.features.categorical.push("favorite_color".to_string());
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_loads_shipped_file() {
        let config = AppConfig::load_from_path("config/config.toml").unwrap();
        assert_eq!(config.model.algorithm, AnomalyStrategy::IsolationForest);
        assert_eq!(config.pipeline.workers, 4);
    }

    #[test]
    fn test_unknown_strategy_is_configuration_error() {
        let shipped = std::fs::read_to_string("config/config.toml").unwrap();
        let broken = shipped.replace(
            "algorithm = \"isolation_forest\"",
            "algorithm = \"one_class_svm\"",
        );
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(broken.as_bytes()).unwrap();

        let err = AppConfig::load_from_path(file.path()).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
