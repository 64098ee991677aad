//! # Sybase DB Plugin
//!
//! Credential lifecycle engine for Sybase ASE and other TDS servers. A
//! secret-management control plane calls it to issue, revoke and rotate
//! database logins.
//!
//! ## Core Types
//!
//! - [`Database`]: inbound interface: init, create, renew, revoke, rotate, close
//! - [`SybaseDatabase`]: the engine, generic over a [`Connector`] and a
//!   [`CredentialsProducer`]
//! - [`ErrorSanitizerMiddleware`]: strips secret values from returned errors
//! - [`Statements`] / [`UsernameConfig`]: caller-supplied templates and naming input
//! - [`Credential`]: a generated login
//! - [`DatabaseError`] / [`ErrorKind`]: what went wrong and how to react
//!
//! ## Statement templates
//!
//! Templates hold `;`-separated statements with `{{key}}` placeholders.
//! CreateUser provides `name`, `password` and `expiration`; RevokeUser
//! provides `name`; root rotation provides `username`, `old_password` and
//! `password`. Substitution is literal, see [`template`].
//!
//! ## Features
//!
//! - `tds` (default): [`driver::TdsConnector`] over `tiberius`
//! - `test-util`: in-memory fake server in [`testing`]

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod connection;
pub mod credentials;
pub mod database;
pub mod driver;
pub mod error;
pub mod executor;
pub mod middleware;
pub mod revocation;
pub mod secret;
pub mod statements;
pub mod template;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

// ── Public re-exports ─────────────────────────────────────────────────────────

pub use config::{ConnectionConfig, RawConfig};
pub use connection::ConnectionProducer;
pub use credentials::{Credential, CredentialsProducer, SqlCredentialsProducer};
pub use database::{DEFAULT_ROTATION_STATEMENT, Database, SybaseDatabase, TYPE_NAME};
pub use driver::{Connection, Connector};
pub use error::{DatabaseError, DriverError, DriverErrorKind, ErrorKind, PolicyError, Result};
pub use executor::{ApplyOutcome, FailurePolicy};
pub use middleware::ErrorSanitizerMiddleware;
pub use secret::SecretString;
pub use statements::{Statements, UsernameConfig};

/// The plugin as the control plane runs it: a TDS-backed [`SybaseDatabase`]
/// behind the error sanitizer.
#[cfg(feature = "tds")]
pub fn new_database() -> ErrorSanitizerMiddleware<SybaseDatabase<driver::TdsConnector>> {
    ErrorSanitizerMiddleware::new(SybaseDatabase::new(driver::TdsConnector::new()))
}

/// Commonly used types
pub mod prelude {
    pub use crate::{
        Credential, CredentialsProducer, Database, DatabaseError, ErrorKind,
        ErrorSanitizerMiddleware, RawConfig, Statements, SybaseDatabase, UsernameConfig,
    };
}
