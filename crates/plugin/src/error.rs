//! Error types for the credential lifecycle engine
//!
//! The hierarchy has three tiers:
//! - [`DatabaseError`]: what every lifecycle operation returns
//! - [`DriverError`]: a failure reported by the wire driver (connect, execute, query)
//! - [`PolicyError`]: a failure reported by the naming/secret policy
//!
//! [`DatabaseError::kind`] collapses the variants into the five kinds the
//! control plane acts on (see [`ErrorKind`]).

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Coarse classification of a [`DatabaseError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad input or bad plugin configuration. Never retried.
    Configuration,
    /// The database handle could not be established or was lost.
    Connection,
    /// A rendered statement failed to execute.
    StatementExecution,
    /// The default-database lookup of the fallback revocation found nothing.
    Lookup,
    /// The naming/secret policy failed.
    Policy,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Connection => "connection",
            ErrorKind::StatementExecution => "statement execution",
            ErrorKind::Lookup => "lookup",
            ErrorKind::Policy => "policy",
        };
        f.write_str(name)
    }
}

/// What part of the driver failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverErrorKind {
    /// Opening the transport or authenticating.
    Connect,
    /// Executing a statement.
    Execute,
    /// Reading a query result.
    Query,
    /// BEGIN / COMMIT / ROLLBACK.
    Transaction,
    /// The handle is already closed.
    Closed,
    /// The statement exceeded the configured timeout.
    Timeout,
}

/// Failure reported by a [`Connector`](crate::driver::Connector) or
/// [`Connection`](crate::driver::Connection).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct DriverError {
    kind: DriverErrorKind,
    message: String,
}

impl DriverError {
    /// Create a driver error of the given kind
    pub fn new(kind: DriverErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Connection could not be opened or authenticated
    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(DriverErrorKind::Connect, message)
    }

    /// Statement execution failed
    pub fn execute(message: impl Into<String>) -> Self {
        Self::new(DriverErrorKind::Execute, message)
    }

    /// Query result could not be read
    pub fn query(message: impl Into<String>) -> Self {
        Self::new(DriverErrorKind::Query, message)
    }

    /// Transaction control statement failed
    pub fn transaction(message: impl Into<String>) -> Self {
        Self::new(DriverErrorKind::Transaction, message)
    }

    /// Handle is closed
    pub fn closed() -> Self {
        Self::new(DriverErrorKind::Closed, "connection is closed")
    }

    /// Statement ran past its deadline
    pub fn timeout(after: Duration) -> Self {
        Self::new(
            DriverErrorKind::Timeout,
            format!("statement timed out after {after:?}"),
        )
    }

    /// Which part of the driver failed
    pub fn kind(&self) -> DriverErrorKind {
        self.kind
    }

    /// Driver-supplied message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether the failure concerns the transport rather than a statement
    pub fn is_connection_failure(&self) -> bool {
        matches!(
            self.kind,
            DriverErrorKind::Connect | DriverErrorKind::Closed
        )
    }
}

/// Failure reported by a [`CredentialsProducer`](crate::credentials::CredentialsProducer).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PolicyError {
    /// Username could not be generated
    #[error("failed to generate username: {0}")]
    Username(String),

    /// Password could not be generated
    #[error("failed to generate password: {0}")]
    Password(String),

    /// Expiration could not be formatted
    #[error("failed to generate expiration: {0}")]
    Expiration(String),
}

/// One statement that failed, with its position in the rendered batch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("statement #{index}: {source}")]
pub struct StatementFailure {
    /// Zero-based position in the rendered statement list
    pub index: usize,
    /// Driver error
    #[source]
    pub source: DriverError,
}

/// Phase of a transaction that failed outside any statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionPhase {
    /// BEGIN
    Begin,
    /// COMMIT
    Commit,
}

impl fmt::Display for TransactionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionPhase::Begin => f.write_str("begin"),
            TransactionPhase::Commit => f.write_str("commit"),
        }
    }
}

/// Error returned by every lifecycle operation.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// CreateUser was called without creation statements
    #[error("empty creation statements")]
    EmptyCreationStatement,

    /// RotateRootCredentials needs a configured root login
    #[error("username and password are required to rotate")]
    MissingRootCredentials,

    /// The plugin has not been initialized, or was closed
    #[error("connection has not been initialized")]
    NotInitialized,

    /// A configuration value is missing or malformed
    #[error("invalid configuration: {field}: {reason}")]
    InvalidConfig {
        /// Offending key
        field: String,
        /// What is wrong with it
        reason: String,
    },

    /// The database handle could not be established, verified or kept
    #[error("connection error: {0}")]
    Connection(#[source] DriverError),

    /// A statement failed; `applied` statements before it took effect
    /// unless the batch was rolled back.
    #[error("{failure} ({applied} applied{})", rollback_suffix(.rolled_back))]
    Statement {
        /// Statements that completed before the failure
        applied: usize,
        /// Whether the enclosing transaction was rolled back
        rolled_back: bool,
        /// The failing statement
        #[source]
        failure: StatementFailure,
    },

    /// BEGIN or COMMIT failed
    #[error("transaction {phase} failed: {source}")]
    Transaction {
        /// Which phase
        phase: TransactionPhase,
        /// Driver error
        #[source]
        source: DriverError,
    },

    /// The fallback revocation found no default database for the login
    #[error("no default database found for login '{username}'")]
    NoDefaultDatabase {
        /// Login being revoked
        username: String,
    },

    /// The fallback revocation attempted every teardown statement but some failed
    #[error("revocation of '{username}' incomplete: {}", last_failure(.failures))]
    IncompleteRevocation {
        /// Login being revoked
        username: String,
        /// Every teardown failure, in execution order
        failures: Vec<StatementFailure>,
    },

    /// The naming/secret policy failed
    #[error(transparent)]
    Policy(#[from] PolicyError),

    /// An error whose message had secret values removed
    #[error("{message}")]
    Sanitized {
        /// Kind of the original error
        kind: ErrorKind,
        /// Redacted message
        message: String,
    },
}

fn rollback_suffix(rolled_back: &bool) -> &'static str {
    if *rolled_back { ", rolled back" } else { "" }
}

fn last_failure(failures: &[StatementFailure]) -> String {
    failures
        .last()
        .map_or_else(|| "unknown failure".to_string(), ToString::to_string)
}

/// Result type alias for lifecycle operations
pub type Result<T> = std::result::Result<T, DatabaseError>;

impl DatabaseError {
    /// Shorthand for [`DatabaseError::InvalidConfig`]
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            DatabaseError::EmptyCreationStatement
            | DatabaseError::MissingRootCredentials
            | DatabaseError::NotInitialized
            | DatabaseError::InvalidConfig { .. } => ErrorKind::Configuration,
            DatabaseError::Connection(_) => ErrorKind::Connection,
            DatabaseError::Statement { failure, .. } if failure.source.is_connection_failure() => {
                ErrorKind::Connection
            }
            DatabaseError::Transaction { source, .. } if source.is_connection_failure() => {
                ErrorKind::Connection
            }
            DatabaseError::Statement { .. }
            | DatabaseError::Transaction { .. }
            | DatabaseError::IncompleteRevocation { .. } => ErrorKind::StatementExecution,
            DatabaseError::NoDefaultDatabase { .. } => ErrorKind::Lookup,
            DatabaseError::Policy(_) => ErrorKind::Policy,
            DatabaseError::Sanitized { kind, .. } => *kind,
        }
    }

    /// Only connection failures are worth retrying after connectivity is checked
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Connection
    }

    /// Replace every secret value in the message with its placeholder.
    ///
    /// Errors whose message holds no secret are returned untouched so callers
    /// can still match on the concrete variant.
    pub fn sanitize(self, secrets: &HashMap<String, String>) -> Self {
        let message = self.to_string();
        let mut redacted = message.clone();
        for (secret, replacement) in secrets {
            if !secret.is_empty() {
                redacted = redacted.replace(secret.as_str(), replacement);
            }
        }
        if redacted == message {
            return self;
        }
        DatabaseError::Sanitized {
            kind: self.kind(),
            message: redacted,
        }
    }
}
