//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! The engine has a single user-level configuration file. Every field is
//! optional; accessors on [`EngineConfig`] apply the defaults.
//!
//! # Locations
//!
//! Searched in order:
//! 1. `$KODA_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/koda/config.toml`
//! 3. `~/.koda/config.toml` (canonical write location)
//!
//! A missing file is not an error: defaults are used.
//!
//! # Example
//!
//! ```no_run
//! use koda_store::core::config::EngineConfig;
//!
//! let loaded = EngineConfig::load().unwrap();
//! let config = loaded.config;
//! println!("log level: {}", config.log_level());
//! println!("attribute order: {:?}", config.attribute_order());
//! ```

pub mod schema;

pub use schema::{AttributeOrder, EngineConfig, TraversalConfig};

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default log filter when neither the config nor the environment sets one.
pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("failed to write config file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("home directory not found")]
    NoHomeDir,
}

/// Result of loading configuration.
#[derive(Debug)]
pub struct ConfigLoadResult {
    /// The loaded configuration.
    pub config: EngineConfig,
    /// The file it was read from, if any.
    pub path: Option<PathBuf>,
}

impl EngineConfig {
    /// Load configuration from the standard locations.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read, parsed
    /// or validated.
    pub fn load() -> Result<ConfigLoadResult, ConfigError> {
        let Some(path) = Self::find_config_file() else {
            return Ok(ConfigLoadResult {
                config: EngineConfig::default(),
                path: None,
            });
        };
        let config = Self::load_from(&path)?;
        Ok(ConfigLoadResult {
            config,
            path: Some(path),
        })
    }

    /// Read, parse and validate a config file.
    pub fn load_from(path: &Path) -> Result<EngineConfig, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: EngineConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        config.validate()?;
        Ok(config)
    }

    fn find_config_file() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("KODA_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("koda/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        let path = dirs::home_dir()?.join(".koda/config.toml");
        path.exists().then_some(path)
    }

    /// Get the canonical config path, `~/.koda/config.toml`.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".koda/config.toml"))
    }

    /// Write this config to `path` atomically.
    ///
    /// Creates parent directories if needed. The contents go to a temp file
    /// in the same directory which is then renamed over `path`.
    pub fn write(&self, path: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        let temp_path = path.with_extension("toml.tmp");
        let mut file = fs::File::create(&temp_path).map_err(|e| ConfigError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;

        file.write_all(contents.as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(|e| ConfigError::WriteError {
                path: temp_path.clone(),
                source: e,
            })?;

        fs::rename(&temp_path, path).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    // =========================================================================
    // Accessors with defaults
    // =========================================================================

    /// Get the log filter.
    ///
    /// Defaults to "warn" if not configured.
    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    /// Get the entity attribute walk order.
    ///
    /// Defaults to sorted if not configured.
    pub fn attribute_order(&self) -> AttributeOrder {
        self.traversal
            .as_ref()
            .and_then(|t| t.attribute_order)
            .unwrap_or_default()
    }

    /// Check if per-visit tracing is enabled.
    ///
    /// Defaults to `false` if not configured.
    pub fn trace_visits(&self) -> bool {
        self.traversal
            .as_ref()
            .and_then(|t| t.trace_visits)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_apply() {
        let config = EngineConfig::default();
        assert_eq!(config.log_level(), "warn");
        assert_eq!(config.attribute_order(), AttributeOrder::Sorted);
        assert!(!config.trace_visits());
    }

    #[test]
    fn load_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(
            &path,
            r#"
            log_level = "debug"

            [traversal]
            attribute_order = "declared"
            "#,
        )
        .unwrap();

        let config = EngineConfig::load_from(&path).unwrap();
        assert_eq!(config.log_level(), "debug");
        assert_eq!(config.attribute_order(), AttributeOrder::Declared);
        assert!(!config.trace_visits());
    }

    #[test]
    fn load_from_env() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("engine.toml");
        fs::write(&path, "[traversal]\ntrace_visits = true\n").unwrap();

        std::env::set_var("KODA_CONFIG", path.to_str().unwrap());
        let result = EngineConfig::load();
        std::env::remove_var("KODA_CONFIG");

        let loaded = result.unwrap();
        assert_eq!(loaded.path.as_deref(), Some(path.as_path()));
        assert!(loaded.config.trace_visits());
    }

    #[test]
    fn missing_file_is_read_error() {
        let temp = TempDir::new().unwrap();
        let result = EngineConfig::load_from(&temp.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "log_level = [").unwrap();

        let result = EngineConfig::load_from(&path);
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn write_is_atomic_and_reloadable() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/dir/config.toml");

        let config = EngineConfig {
            log_level: Some("trace".to_string()),
            traversal: Some(TraversalConfig {
                attribute_order: Some(AttributeOrder::Declared),
                trace_visits: Some(true),
            }),
        };
        config.write(&path).unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("toml.tmp").exists());
        assert_eq!(EngineConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn write_rejects_invalid_config() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        let config = EngineConfig {
            log_level: Some("x=nonsense".to_string()),
            ..Default::default()
        };
        assert!(config.write(&path).is_err());
        assert!(!path.exists());
    }
}
