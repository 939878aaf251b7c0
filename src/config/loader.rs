//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::ServiceConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
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

/// Parse and validate configuration from a TOML string.
pub fn parse_config(content: &str) -> Result<ServiceConfig, ConfigError> {
    let config: ServiceConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::LogFormat;

    #[test]
    fn empty_file_yields_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.api.base_path, "/api");
        assert_eq!(config.auth.tokens["valid-token"], "user-123");
    }

    #[test]
    fn partial_sections_override_defaults() {
        let config = parse_config(
            r#"
            [observability]
            log_format = "json"
            trace_header = "x-correlation-id"

            [auth]
            default_grants = [1]

            [auth.grants]
            "user-9" = [1, 3]
            "#,
        )
        .unwrap();

        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert_eq!(config.observability.trace_header, "x-correlation-id");
        assert_eq!(config.observability.log_level, "info");
        assert_eq!(config.auth.default_grants.len(), 1);
        assert_eq!(config.auth.grants["user-9"].len(), 2);
    }

    #[test]
    fn syntax_errors_are_parse_errors() {
        assert!(matches!(parse_config("[listener"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn semantic_errors_are_collected() {
        let err = parse_config(
            r#"
            [listener]
            bind_address = "not-an-address"

            [timeouts]
            request_secs = 0
            "#,
        )
        .unwrap_err();

        match err {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }
}
