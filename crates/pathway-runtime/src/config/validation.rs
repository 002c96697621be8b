//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{LogOutput, LoggingConfig, PathwayConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &PathwayConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;

    if config.dispatch.max_reroute_depth == 0 {
        return Err(ConfigError::validation(
            "dispatch.max_reroute_depth must be greater than 0",
        ));
    }

    if config.catalog.default_methods.is_empty() {
        return Err(ConfigError::validation(
            "catalog.default_methods must list at least one method",
        ));
    }

    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }

    if let Some(module) = logging.filters.keys().find(|module| module.trim().is_empty()) {
        return Err(ConfigError::validation(format!(
            "Invalid logging filter module name: {module:?}"
        )));
    }

    Ok(())
}
