//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Engine Config
//!
//! Located at (in order of precedence):
//! 1. `$KODA_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/koda/config.toml`
//! 3. `~/.koda/config.toml` (canonical write location)
//!
//! # Validation
//!
//! Enumerated values are checked by serde while parsing. Free-form values
//! (the log filter) are validated after parsing.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use super::ConfigError;

/// Engine configuration.
///
/// # Example
///
/// ```toml
/// log_level = "koda_store=debug"
///
/// [traversal]
/// attribute_order = "declared"
/// trace_visits = true
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Log filter directive (e.g. "warn" or "koda_store=trace")
    pub log_level: Option<String>,

    /// Traversal defaults
    pub traversal: Option<TraversalConfig>,
}

impl EngineConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(level) = &self.log_level {
            EnvFilter::try_new(level).map_err(|e| {
                ConfigError::InvalidValue(format!("invalid log_level '{level}': {e}"))
            })?;
        }
        Ok(())
    }
}

/// Traversal defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TraversalConfig {
    /// Order in which entity attributes are walked
    pub attribute_order: Option<AttributeOrder>,

    /// Emit a trace event for every visited item
    pub trace_visits: Option<bool>,
}

/// Order in which the attributes of an entity schema are walked.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AttributeOrder {
    /// Sorted by attribute name.
    #[default]
    Sorted,
    /// In the order the schema record declared them.
    Declared,
}
