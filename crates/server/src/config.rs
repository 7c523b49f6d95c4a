//! Service configuration.
//!
//! Sources, lowest precedence first: built-in defaults, an optional TOML file
//! (`--config <FILE>`, else `exo.toml` in the working directory when present)
//! and `EXO_*` environment variables (`EXO_PORT`, `EXO_TRAINING__NUM_TREES`).
//! CLI flags are applied on top by the binary.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File as ConfigFile};
use exo_trainer::GbdtConfig;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "exo.toml";
pub const ENV_PREFIX: &str = "EXO";
pub const LOG_FORMATS: [&str; 2] = ["pretty", "compact"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub dataset_file: String,
    pub model_file: String,
    /// Seconds between scheduled retrains; 0 disables the scheduler.
    pub retrain_interval_secs: u64,
    pub max_upload_bytes: usize,
    /// `*` allows any origin.
    pub cors_allowed_origins: Vec<String>,
    pub log_level: String,
    /// `pretty` or `compact`
    pub log_format: String,
    pub training: GbdtConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            data_dir: PathBuf::from("data"),
            dataset_file: "main.csv".to_string(),
            model_file: "model.json".to_string(),
            retrain_interval_secs: 24 * 60 * 60,
            max_upload_bytes: 32 * 1024 * 1024,
            cors_allowed_origins: vec!["*".to_string()],
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            training: GbdtConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration. An explicitly given file must exist.
    pub fn load(config_path_override: Option<&Path>) -> Result<Self> {
        let resolved_path = match config_path_override {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!(
                        "Configuration file {} not found (specified via --config)",
                        path.display()
                    );
                }
                Some(path.to_path_buf())
            }
            None => {
                let path = PathBuf::from(DEFAULT_CONFIG_FILE);
                path.exists().then_some(path)
            }
        };

        let mut builder = Config::builder();

        if let Some(path) = &resolved_path {
            builder = builder.add_source(ConfigFile::from(path.as_path()));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("cors_allowed_origins"),
        );

        let config: ServiceConfig = builder
            .build()
            .context("failed to assemble configuration")?
            .try_deserialize()
            .context("invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.dataset_file.trim().is_empty() || self.model_file.trim().is_empty() {
            anyhow::bail!("dataset_file and model_file must not be empty");
        }
        if self.max_upload_bytes == 0 {
            anyhow::bail!("max_upload_bytes must be positive");
        }
        if !LOG_FORMATS.contains(&self.log_format.as_str()) {
            anyhow::bail!(
                "log_format must be one of {LOG_FORMATS:?}, got {:?}",
                self.log_format
            );
        }
        self.training
            .validate()
            .context("invalid [training] parameters")?;
        Ok(())
    }

    pub fn dataset_path(&self) -> PathBuf {
        self.data_dir.join(&self.dataset_file)
    }

    pub fn model_path(&self) -> PathBuf {
        self.data_dir.join(&self.model_file)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// An empty origin list or a `*` entry means CORS is permissive.
    pub fn allows_any_origin(&self) -> bool {
        self.cors_allowed_origins.is_empty()
            || self.cors_allowed_origins.iter().any(|origin| origin == "*")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_service_layout() {
        let config = ServiceConfig::default();
        assert_eq!(config.bind_addr(), "0.0.0.0:8000");
        assert_eq!(config.dataset_path(), PathBuf::from("data").join("main.csv"));
        assert_eq!(config.model_path(), PathBuf::from("data").join("model.json"));
        assert_eq!(config.retrain_interval_secs, 86_400);
        assert!(config.allows_any_origin());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn file_overrides_defaults() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("service.toml");
        std::fs::write(
            &path,
            r#"
port = 9100
data_dir = "/var/lib/exo"
retrain_interval_secs = 0
cors_allowed_origins = ["http://localhost:3000"]

[training]
num_trees = 25
learning_rate = 0.1
"#,
        )?;

        let config = ServiceConfig::load(Some(&path))?;
        assert_eq!(config.port, 9100);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/exo"));
        assert_eq!(config.retrain_interval_secs, 0);
        assert!(!config.allows_any_origin());
        assert_eq!(config.training.num_trees, 25);
        assert_eq!(config.training.max_depth, 6);
        Ok(())
    }

    #[test]
    fn serialized_config_loads_back() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("exo.toml");
        let original = ServiceConfig {
            port: 8123,
            log_format: "compact".to_string(),
            ..ServiceConfig::default()
        };
        std::fs::write(&path, toml::to_string(&original)?)?;

        assert_eq!(ServiceConfig::load(Some(&path))?, original);
        Ok(())
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = ServiceConfig::load(Some(Path::new("/nonexistent/exo.toml"))).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn invalid_training_parameters_rejected() {
        let mut config = ServiceConfig::default();
        config.training.num_trees = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_log_format_rejected() {
        let config = ServiceConfig {
            log_format: "json".to_string(),
            ..ServiceConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_format"));
    }
}
