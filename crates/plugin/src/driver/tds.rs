//! TDS connector built on `tiberius`
//!
//! Accepts ADO.NET style connection strings
//! (`server=tcp:host,5000;database=vault;TrustServerCertificate=true`) and
//! JDBC strings (`jdbc:sqlserver://host:5000;databaseName=vault`). When the
//! configuration carries a root username and password they take precedence
//! over credentials embedded in the string, so a rotated password is used on
//! the next connect even if the string still holds the old one.
//!
//! Statements run as simple batches rather than `sp_executesql`, otherwise a
//! `USE db` would only last for its own batch.

use async_trait::async_trait;
use tiberius::{AuthMethod, Client, Config, Row};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::debug;

use super::{Connection, Connector};
use crate::config::ConnectionConfig;
use crate::error::{DriverError, DriverErrorKind};

/// Opens TDS sessions over TCP.
#[derive(Debug, Clone, Copy, Default)]
pub struct TdsConnector;

impl TdsConnector {
    /// Create a connector
    pub fn new() -> Self {
        Self
    }
}

/// Live TDS session
pub struct TdsConnection {
    client: Client<Compat<TcpStream>>,
}

impl std::fmt::Debug for TdsConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TdsConnection").finish_non_exhaustive()
    }
}

fn parse_connection_string(url: &str) -> Result<Config, DriverError> {
    let parsed = if url.trim_start().to_ascii_lowercase().starts_with("jdbc:") {
        Config::from_jdbc_string(url)
    } else {
        Config::from_ado_string(url)
    };
    parsed.map_err(|e| DriverError::connect(format!("malformed connection string: {e}")))
}

#[async_trait]
impl Connector for TdsConnector {
    type Connection = TdsConnection;

    async fn connect(&self, config: &ConnectionConfig) -> Result<TdsConnection, DriverError> {
        let mut tds = parse_connection_string(&config.connection_url())?;

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            password.expose_secret(|password| {
                tds.authentication(AuthMethod::sql_server(username, password));
            });
        }

        let addr = tds.get_addr();
        debug!(%addr, "opening TDS connection");

        let tcp = TcpStream::connect(&addr)
            .await
            .map_err(|e| DriverError::connect(format!("could not reach {addr}: {e}")))?;
        tcp.set_nodelay(true)
            .map_err(|e| DriverError::connect(e.to_string()))?;

        let client = Client::connect(tds, tcp.compat_write())
            .await
            .map_err(|e| DriverError::connect(e.to_string()))?;

        Ok(TdsConnection { client })
    }
}

fn first_column(row: &Row) -> Result<Option<String>, tiberius::error::Error> {
    if let Ok(value) = row.try_get::<&str, _>(0) {
        return Ok(value.map(str::to_owned));
    }
    if let Ok(value) = row.try_get::<i32, _>(0) {
        return Ok(value.map(|n| n.to_string()));
    }
    row.try_get::<i64, _>(0).map(|value| value.map(|n| n.to_string()))
}

#[async_trait]
impl Connection for TdsConnection {
    async fn execute(&mut self, statement: &str) -> Result<(), DriverError> {
        self.client
            .simple_query(statement)
            .await
            .map_err(|e| DriverError::execute(e.to_string()))?
            .into_results()
            .await
            .map_err(|e| DriverError::execute(e.to_string()))?;
        Ok(())
    }

    async fn query_value(&mut self, query: &str) -> Result<Option<String>, DriverError> {
        let row = self
            .client
            .simple_query(query)
            .await
            .map_err(|e| DriverError::query(e.to_string()))?
            .into_row()
            .await
            .map_err(|e| DriverError::query(e.to_string()))?;

        match row {
            Some(row) => first_column(&row).map_err(|e| DriverError::query(e.to_string())),
            None => Ok(None),
        }
    }

    async fn ping(&mut self) -> Result<(), DriverError> {
        self.client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| DriverError::new(DriverErrorKind::Closed, e.to_string()))?
            .into_results()
            .await
            .map_err(|e| DriverError::new(DriverErrorKind::Closed, e.to_string()))?;
        Ok(())
    }

    async fn close(self) -> Result<(), DriverError> {
        self.client
            .close()
            .await
            .map_err(|e| DriverError::new(DriverErrorKind::Closed, e.to_string()))
    }
}
