//! Configuration management for the analytics service
//!
//! TOML file support with environment variable overrides and defaults for
//! every field, so an empty file (or no file) yields a runnable service.
//!
//! ```toml
//! [server]
//! listen_addr = "0.0.0.0:8080"
//!
//! [storage]
//! sample_rows = 100
//!
//! [forecast]
//! command = "python3"
//! args = ["scripts/forecast_service.py"]
//!
//! [[datasets]]
//! table = "Line_Sales"
//! date_field = "day"
//! fields = [{ name = "day", kind = "date" }, { name = "amount", kind = "float" }]
//! metrics = [{ field = "amount", label = "Sales" }]
//! ```

use crate::error::ConfigError;
use crate::query::QueryTimeouts;
use crate::registry::{DatasetDefinition, DatasetRegistry};
use crate::storage::SampleData;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "VISION_CONFIG";

/// Config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "application.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// HTTP server settings
    pub server: ServerSection,

    /// Row storage settings
    pub storage: StorageSection,

    /// Forecast process settings
    pub forecast: ForecastSection,

    /// CORS and origin checks
    pub security: SecuritySection,

    /// Datasets registered after the built-in ones
    pub datasets: Vec<DatasetDefinition>,
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerSection {
    /// Socket address to bind
    pub listen_addr: String,

    /// Log level (error, warn, info, debug, trace), used when `RUST_LOG` is unset
    pub log_level: String,
}

/// Storage configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageSection {
    /// JSON seed file; takes precedence over generated sample data
    pub seed_file: Option<PathBuf>,

    /// Fill tables with generated rows when no seed file is given
    pub generate_sample_data: bool,

    /// Rows per dated dataset
    pub sample_rows: usize,

    /// Rows in the project table
    pub sample_projects: usize,

    /// RNG seed for sample data
    pub sample_seed: u64,

    /// Bound on fetching one dataset
    pub fetch_timeout_secs: u64,
}

/// Forecast configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ForecastSection {
    /// Launch a forecast process for forecast requests
    pub enabled: bool,

    /// Program to run
    pub command: String,

    /// Arguments passed to the program
    pub args: Vec<String>,

    /// Bound on one forecast
    pub timeout_secs: u64,
}

/// Security configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SecuritySection {
    /// CORS allowed origins (empty = allow any origin)
    pub cors_allowed_origins: Vec<String>,

    /// Origin every request must carry; `/health` is exempt
    pub required_origin: Option<String>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for StorageSection {
    fn default() -> Self {
        let sample = SampleData::default();
        Self {
            seed_file: None,
            generate_sample_data: true,
            sample_rows: sample.rows,
            sample_projects: sample.projects,
            sample_seed: sample.seed,
            fetch_timeout_secs: 10,
        }
    }
}

impl Default for ForecastSection {
    fn default() -> Self {
        Self {
            enabled: true,
            command: "python3".to_string(),
            args: vec!["scripts/forecast_service.py".to_string()],
            timeout_secs: 120,
        }
    }
}

impl StorageSection {
    /// Sample generator settings
    pub fn sample_data(&self) -> SampleData {
        SampleData {
            rows: self.sample_rows,
            projects: self.sample_projects,
            seed: self.sample_seed,
        }
    }
}

impl ApplicationConfig {
    /// Parse configuration from TOML text
    pub fn from_toml(text: &str, path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.into(),
            source,
        })
    }

    /// Load configuration from a TOML file and apply environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml(&contents, path)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Defaults with environment overrides
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, var: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = var("VISION_LISTEN_ADDR") {
            self.server.listen_addr = addr;
        }
        if let Some(level) = var("RUST_LOG") {
            self.server.log_level = level;
        }
        if let Some(path) = var("VISION_SEED_FILE") {
            self.storage.seed_file = Some(PathBuf::from(path));
        }
        if let Some(command) = var("VISION_FORECAST_COMMAND") {
            self.forecast.command = command;
        }
        if let Some(origin) = var("VISION_REQUIRED_ORIGIN") {
            self.security.required_origin = Some(origin).filter(|o| !o.is_empty());
        }
        if let Some(timeout) = var("VISION_FETCH_TIMEOUT_SECS") {
            self.storage.fetch_timeout_secs = timeout.parse().map_err(|_| {
                ConfigError::Invalid(format!(
                    "VISION_FETCH_TIMEOUT_SECS is not a number: {}",
                    timeout
                ))
            })?;
        }
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.listen_addr()?;

        if self.storage.fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "storage.fetch_timeout_secs must be > 0".to_string(),
            ));
        }
        if self.forecast.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "forecast.timeout_secs must be > 0".to_string(),
            ));
        }
        if self.forecast.enabled && self.forecast.command.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "forecast.command cannot be empty when forecasting is enabled".to_string(),
            ));
        }
        if let Some(origin) = &self.security.required_origin {
            if origin.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "security.required_origin cannot be blank".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Parsed listen address
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server.listen_addr.parse().map_err(|_| {
            ConfigError::Invalid(format!(
                "server.listen_addr is not a socket address: {}",
                self.server.listen_addr
            ))
        })
    }

    /// Built-in datasets plus the configured ones
    pub fn build_registry(&self) -> Result<DatasetRegistry, ConfigError> {
        let mut registry = DatasetRegistry::builtin();
        for def in &self.datasets {
            registry.register(def.clone())?;
        }
        Ok(registry)
    }

    /// Collaborator timeouts for the query façade
    pub fn query_timeouts(&self) -> QueryTimeouts {
        QueryTimeouts {
            fetch: Duration::from_secs(self.storage.fetch_timeout_secs),
            forecast: Duration::from_secs(self.forecast.timeout_secs),
        }
    }
}
