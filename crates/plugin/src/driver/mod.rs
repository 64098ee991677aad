//! Wire driver seam
//!
//! The plugin never speaks a database protocol itself. A [`Connector`] opens
//! a [`Connection`] from a [`ConnectionConfig`]; the connection executes the
//! statement text produced by the templating engine.

use async_trait::async_trait;

use crate::config::ConnectionConfig;
use crate::error::DriverError;

#[cfg(feature = "tds")]
pub mod tds;

#[cfg(feature = "tds")]
pub use tds::{TdsConnection, TdsConnector};

/// Opens connections.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Connection type produced by this connector
    type Connection: Connection;

    /// Open and authenticate a new connection
    async fn connect(&self, config: &ConnectionConfig) -> Result<Self::Connection, DriverError>;
}

/// A single live session.
///
/// Transaction control defaults to plain `BEGIN/COMMIT/ROLLBACK TRANSACTION`
/// batches, which is what TDS servers expect.
#[async_trait]
pub trait Connection: Send + 'static {
    /// Execute one statement, discarding any result set
    async fn execute(&mut self, statement: &str) -> Result<(), DriverError>;

    /// Run a query and return the first column of the first row
    async fn query_value(&mut self, query: &str) -> Result<Option<String>, DriverError>;

    /// Check the session is still usable
    async fn ping(&mut self) -> Result<(), DriverError> {
        self.query_value("SELECT 1").await.map(|_| ())
    }

    /// Open a transaction
    async fn begin(&mut self) -> Result<(), DriverError> {
        self.execute("BEGIN TRANSACTION").await
    }

    /// Commit the open transaction
    async fn commit(&mut self) -> Result<(), DriverError> {
        self.execute("COMMIT TRANSACTION").await
    }

    /// Roll back the open transaction
    async fn rollback(&mut self) -> Result<(), DriverError> {
        self.execute("ROLLBACK TRANSACTION").await
    }

    /// Close the session
    async fn close(self) -> Result<(), DriverError>;
}
