//! logging
//!
//! `tracing` subscriber setup.
//!
//! The filter comes from `KODA_LOG` when it is set and parses, otherwise
//! from the configured `log_level`. Events go to stderr. Installing a
//! subscriber twice is a no-op.

use tracing_subscriber::EnvFilter;

use crate::core::config::EngineConfig;

/// Environment variable holding a log filter directive.
pub const LOG_ENV: &str = "KODA_LOG";

/// Build the filter for `config`.
pub fn env_filter(config: &EngineConfig) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(config.log_level()))
}

/// Install the global fmt subscriber.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_tracing(config: &EngineConfig) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(config))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_ignored() {
        let config = EngineConfig::default();
        let _ = init_tracing(&config);
        assert!(!init_tracing(&config));
    }

    #[test]
    fn filter_uses_configured_level() {
        std::env::remove_var(LOG_ENV);
        let config = EngineConfig {
            log_level: Some("debug".to_string()),
            ..Default::default()
        };
        assert_eq!(env_filter(&config).to_string(), "debug");
    }
}
