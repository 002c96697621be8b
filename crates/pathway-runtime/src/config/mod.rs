//! Configuration module for the Pathway runtime.
//!
//! This module provides figment-based configuration loading and validation
//! for logging, dispatch and catalog settings.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{LogFormat, LogLevel, LogOutput, LoggingConfig, PathwayConfig, SpanEventConfig};
pub use validation::validate_config;
