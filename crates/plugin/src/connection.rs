//! Connection handle manager
//!
//! Owns the raw configuration, its typed view, and at most one live
//! [`Connection`]. The handle is opened lazily and pinged before reuse; a
//! handle that fails the ping or outlives `max_connection_lifetime` is closed
//! and replaced. Callers serialize access through the lock held by
//! [`SybaseDatabase`](crate::database::SybaseDatabase).
//!
//! Operations borrow the handle with [`checkout`](ConnectionProducer::checkout)
//! and hand it back with [`checkin`](ConnectionProducer::checkin). A checkout
//! that was never checked in belongs to a cancelled call, and its session may
//! still hold an open transaction, so the next checkout replaces it.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{ConnectionConfig, PASSWORD_KEY, RawConfig};
use crate::driver::{Connection, Connector};
use crate::error::{DatabaseError, DriverError, Result};
use crate::secret::SecretString;

/// Lazily established, cached database handle.
pub struct ConnectionProducer<C: Connector> {
    connector: C,
    raw: RawConfig,
    config: Option<ConnectionConfig>,
    connection: Option<C::Connection>,
    opened_at: Option<Instant>,
    checked_out: bool,
}

impl<C: Connector> ConnectionProducer<C> {
    /// Uninitialized producer
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            raw: RawConfig::new(),
            config: None,
            connection: None,
            opened_at: None,
            checked_out: false,
        }
    }

    /// Whether `init` succeeded and `close` has not been called since
    pub fn is_initialized(&self) -> bool {
        self.config.is_some()
    }

    /// Typed configuration, if initialized
    pub fn config(&self) -> Option<&ConnectionConfig> {
        self.config.as_ref()
    }

    /// Raw configuration as last initialized or rotated
    pub fn raw(&self) -> &RawConfig {
        &self.raw
    }

    /// Per-statement deadline from the configuration
    pub fn statement_timeout(&self) -> Option<Duration> {
        self.config.as_ref().and_then(|c| c.statement_timeout)
    }

    /// Root login and password, when both are configured
    pub fn root_credentials(&self) -> Option<(String, SecretString)> {
        let config = self.config.as_ref()?;
        Some((config.username.clone()?, config.password.clone()?))
    }

    /// Apply a new configuration, discarding any existing handle.
    ///
    /// With `verify` set a connection is opened and pinged; on failure the
    /// producer is left uninitialized.
    pub async fn init(&mut self, raw: RawConfig, verify: bool) -> Result<RawConfig> {
        let config = ConnectionConfig::from_raw(&raw)?;

        self.invalidate().await;
        self.config = Some(config);
        self.raw = raw;

        if verify {
            if let Err(e) = self.verify().await {
                self.config = None;
                self.invalidate().await;
                return Err(e);
            }
        }

        debug!(verified = verify, "connection producer initialized");
        Ok(self.raw.clone())
    }

    async fn verify(&mut self) -> Result<()> {
        let verifying = |e: DriverError| {
            DatabaseError::Connection(DriverError::connect(format!(
                "error verifying connection: {e}"
            )))
        };

        let config = self.config.as_ref().ok_or(DatabaseError::NotInitialized)?;
        let mut connection = self.connector.connect(config).await.map_err(verifying)?;
        connection.ping().await.map_err(verifying)?;
        self.connection = Some(connection);
        self.opened_at = Some(Instant::now());
        Ok(())
    }

    fn expired(&self, lifetime: Duration) -> bool {
        !lifetime.is_zero() && self.opened_at.is_some_and(|at| at.elapsed() >= lifetime)
    }

    async fn ensure_connected(&mut self) -> Result<()> {
        let config = self.config.as_ref().ok_or(DatabaseError::NotInitialized)?;

        let healthy = if self.expired(config.max_connection_lifetime) {
            debug!("connection reached its maximum lifetime, reconnecting");
            false
        } else {
            match self.connection.as_mut() {
                Some(connection) => match connection.ping().await {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(error = %e, "cached connection failed ping, reconnecting");
                        false
                    }
                },
                None => false,
            }
        };
        if healthy {
            return Ok(());
        }

        if let Some(stale) = self.connection.take() {
            if let Err(e) = stale.close().await {
                debug!(error = %e, "error closing stale connection");
            }
        }
        self.opened_at = None;

        let connection = self
            .connector
            .connect(config)
            .await
            .map_err(DatabaseError::Connection)?;
        debug!("opened database connection");
        self.connection = Some(connection);
        self.opened_at = Some(Instant::now());
        Ok(())
    }

    /// Borrow a ready handle for one operation. It is opened on first use and
    /// replaced if it stops answering or has outlived
    /// `max_connection_lifetime`. Pair every successful call with
    /// [`checkin`](Self::checkin).
    pub async fn checkout(&mut self) -> Result<&mut C::Connection> {
        if self.checked_out {
            warn!("previous operation was interrupted, discarding its session");
            self.invalidate().await;
        }
        self.ensure_connected().await?;
        self.checked_out = true;
        self.connection.as_mut().ok_or(DatabaseError::NotInitialized)
    }

    /// Return the handle borrowed by [`checkout`](Self::checkout). A
    /// `poisoned` session is closed instead of kept.
    pub async fn checkin(&mut self, poisoned: bool) {
        self.checked_out = false;
        if poisoned {
            warn!("session state unknown after failure, closing it");
            self.invalidate().await;
        }
    }

    /// Close the handle, keeping the configuration. The next
    /// [`checkout`](Self::checkout) reconnects.
    pub async fn invalidate(&mut self) {
        self.checked_out = false;
        self.opened_at = None;
        if let Some(connection) = self.connection.take() {
            if let Err(e) = connection.close().await {
                warn!(error = %e, "error closing database connection");
            }
        }
    }

    /// Release the handle and mark the producer uninitialized
    pub async fn close(&mut self) -> Result<()> {
        self.config = None;
        self.checked_out = false;
        self.opened_at = None;
        match self.connection.take() {
            Some(connection) => connection.close().await.map_err(DatabaseError::Connection),
            None => Ok(()),
        }
    }

    /// Record a rotated root password in both the raw and typed configuration
    pub fn update_password(&mut self, password: SecretString) {
        password.expose_secret(|p| {
            self.raw
                .insert(PASSWORD_KEY.to_string(), Value::String(p.to_string()));
        });
        if let Some(config) = self.config.as_mut() {
            config.password = Some(password);
        }
    }

    /// Secret values to scrub from error messages
    pub fn secret_values(&self) -> HashMap<String, String> {
        self.config
            .as_ref()
            .map(ConnectionConfig::secret_values)
            .unwrap_or_default()
    }
}

impl<C: Connector + std::fmt::Debug> std::fmt::Debug for ConnectionProducer<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionProducer")
            .field("connector", &self.connector)
            .field("config", &self.config)
            .field("connected", &self.connection.is_some())
            .field("checked_out", &self.checked_out)
            .finish()
    }
}
