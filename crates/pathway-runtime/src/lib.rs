//! Pathway Runtime - request serving, configuration and logging.
//!
//! This crate provides:
//! - [`PageServer`], the top-level collaborator a transport hands parsed
//!   requests to
//! - Layered configuration loading (`PathwayConfig`, [`ConfigLoader`])
//! - Logging configuration ([`LoggingBuilder`])
//!
//! ```ignore
//! use pathway_runtime::{ConfigLoader, PageServer, Request, logging};
//!
//! fn main() -> pathway_runtime::RuntimeResult<()> {
//!     let config = ConfigLoader::new().load()?;
//!     logging::init_from_config(&config.logging)?;
//!
//!     let server = PageServer::from_config(&config);
//!     server.register::<HomePage>()?;
//!
//!     let response = server.handle::<HomePage>(Request::get("/hello/world"))?;
//!     println!("{} {}", response.status, response.body);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod server;

pub use config::{ConfigError, ConfigLoader, ConfigResult, LoggingConfig, PathwayConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use server::{PageServer, Request, Response};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
///
/// This provides all the commonly used logging macros:
/// - `trace!`, `debug!`, `info!`, `warn!`, `error!`
/// - `span`, `event`
/// - `instrument` attribute
/// - `Level` for span creation
pub mod prelude {
    pub use tracing::{Level, debug, error, event, info, instrument, span, trace, warn};
}
