//! Server Configuration
//!
//! This module locates and loads the application configuration.

use std::path::{Path, PathBuf};
use vision_analytics::config::{ApplicationConfig, CONFIG_ENV, DEFAULT_CONFIG_FILE};
use vision_analytics::error::ConfigError;

/// Load configuration from file or environment
///
/// Priority:
/// 1. `--config` flag
/// 2. VISION_CONFIG environment variable
/// 3. application.toml
/// 4. Default configuration
///
/// A file that is named explicitly or found on disk must load; only a
/// missing application.toml falls back to defaults.
pub fn load_config(cli_path: Option<&Path>) -> Result<ApplicationConfig, ConfigError> {
    let explicit = cli_path
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

    if let Some(path) = explicit {
        let config = ApplicationConfig::load(&path)?;
        eprintln!("[config] Loaded configuration from: {}", path.display());
        return Ok(config);
    }

    let app_toml_path = Path::new(DEFAULT_CONFIG_FILE);
    if app_toml_path.exists() {
        let config = ApplicationConfig::load(app_toml_path)?;
        eprintln!("[config] Loaded configuration from {}", DEFAULT_CONFIG_FILE);
        return Ok(config);
    }

    eprintln!(
        "[config] {} not found at: {:?}",
        DEFAULT_CONFIG_FILE,
        app_toml_path
            .canonicalize()
            .unwrap_or_else(|_| app_toml_path.to_path_buf())
    );
    eprintln!("[config] Using default configuration");
    ApplicationConfig::from_env()
}
