//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ServiceConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable consulted when no config path is given on the command line.
pub const CONFIG_PATH_ENV: &str = "WEBHOOK_FANOUT_CONFIG";

/// Error type for configuration loading. Any variant is fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("No configuration path given (pass --config or set WEBHOOK_FANOUT_CONFIG)")]
    MissingPath,
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<ServiceConfig, ConfigError> {
    let config: ServiceConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Resolve the config path from an explicit argument or the environment, then load it.
pub fn load_from_args(explicit: Option<&Path>) -> Result<ServiceConfig, ConfigError> {
    match explicit {
        Some(path) => load_config(path),
        None => {
            let path = std::env::var_os(CONFIG_PATH_ENV).ok_or(ConfigError::MissingPath)?;
            load_config(Path::new(&path))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_config() {
        let config = parse_config(
            r#"
            environment = "staging"

            [store]
            database = "events"
            secret_name = "webhooks/store-uri"

            [fanout]
            topic = "webhook-events"
            endpoint = "http://localhost:4566"
            "#,
        )
        .unwrap();

        assert_eq!(config.store.database, "events");
        assert!(config.fanout.is_enabled());
    }

    #[test]
    fn test_validation_error_lists_fields() {
        let err = parse_config("environment = \"prod\"").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("store.secret_name"));
    }

    #[test]
    fn test_parse_error_is_distinct() {
        let err = parse_config("environment = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
