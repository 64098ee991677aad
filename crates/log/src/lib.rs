//! # Sybase DB Plugin Log
//!
//! Logging bootstrap for the plugin binaries, built on `tracing` and
//! `tracing-subscriber`.
//!
//! ```no_run
//! let _guard = sybase_dbplugin_log::init()?;
//! tracing::info!(port = 5000, "plugin starting");
//! # Ok::<(), sybase_dbplugin_log::LogError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod builder;
mod config;
mod error;

pub use builder::{LoggerBuilder, LoggerGuard};
pub use config::{Config, DisplayConfig, Fields, Format, WriterConfig};
pub use error::{LogError, LogResult};

// Re-export tracing macros
pub use tracing::{debug, error, info, instrument, trace, warn};

/// Prelude for common imports
pub mod prelude {
    pub use crate::{Config, Format, LogError, LoggerGuard, init, init_with};
    pub use crate::{debug, error, info, instrument, trace, warn};
}

/// Initialize from the environment (see [`Config::from_env`])
pub fn init() -> LogResult<LoggerGuard> {
    init_with(Config::from_env())
}

/// Initialize with an explicit configuration
pub fn init_with(config: Config) -> LogResult<LoggerGuard> {
    LoggerBuilder::from_config(config).build()
}
