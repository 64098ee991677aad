//! Error type for logger setup

use thiserror::Error;

/// Failure while configuring or installing the logger
#[derive(Debug, Error)]
pub enum LogError {
    /// The level filter could not be parsed
    #[error("invalid filter '{filter}': {reason}")]
    Filter {
        /// Filter string as given
        filter: String,
        /// Parser message
        reason: String,
    },

    /// Unknown output format name
    #[error("unknown log format '{0}', expected pretty, compact or json")]
    Format(String),

    /// A global subscriber is already installed
    #[error("failed to install logger: {0}")]
    Init(String),
}

/// Result alias for logger operations
pub type LogResult<T> = Result<T, LogError>;
