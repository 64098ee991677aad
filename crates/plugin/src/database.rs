//! Credential lifecycle manager
//!
//! [`Database`] is the inbound interface the control plane calls.
//! [`SybaseDatabase`] implements it on top of a [`ConnectionProducer`] and a
//! [`CredentialsProducer`].
//!
//! # Locking
//!
//! Every operation that touches the connection holds one async mutex for its
//! whole duration: CreateUser, RevokeUser, RotateRootCredentials, Init and
//! Close. Contending callers wait; they never fail on contention. The mutex
//! guards only the connection handle and configuration, so RenewUser and
//! `type_name` never wait.
//!
//! # Session hygiene
//!
//! Statements run on a handle taken with [`ConnectionProducer::checkout`].
//! When an operation ends with the session in an unknown state (timeout, lost
//! link, failed rollback or commit) the handle is closed on checkin. When the
//! caller drops the future mid-operation, the next checkout replaces it.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::config::RawConfig;
use crate::connection::ConnectionProducer;
use crate::credentials::{Credential, CredentialsProducer, SqlCredentialsProducer, normalize_password};
use crate::driver::Connector;
use crate::error::{DatabaseError, Result};
use crate::executor::{Executor, FailurePolicy};
use crate::revocation;
use crate::statements::{Statements, UsernameConfig};
use crate::template::{Placeholders, render_all};

/// Routing name the control plane registers this plugin under
pub const TYPE_NAME: &str = "mssql";

/// Used by root rotation when the caller supplies no statements
pub const DEFAULT_ROTATION_STATEMENT: &str =
    "ALTER LOGIN {{username}} WITH PASSWORD {{old_password}} MODIFY PASSWORD IMMEDIATELY {{password}}";

/// Inbound lifecycle interface.
#[async_trait]
pub trait Database: Send + Sync {
    /// Constant routing string
    fn type_name(&self) -> &'static str;

    /// Apply configuration, optionally verifying connectivity. Returns the
    /// configuration to persist.
    async fn init(&self, config: RawConfig, verify_connection: bool) -> Result<RawConfig>;

    /// Create a new login from the creation statements
    async fn create_user(
        &self,
        statements: &Statements,
        username_config: &UsernameConfig,
        expires_at: DateTime<Utc>,
    ) -> Result<Credential>;

    /// Extend a login's lease
    async fn renew_user(
        &self,
        statements: &Statements,
        username: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Remove a login
    async fn revoke_user(&self, statements: &Statements, username: &str) -> Result<()>;

    /// Replace the root password. Returns the updated configuration.
    async fn rotate_root_credentials(&self, statements: &[String]) -> Result<RawConfig>;

    /// Release the connection
    async fn close(&self) -> Result<()>;

    /// Secret values mapped to their placeholder, for error sanitizing
    async fn secret_values(&self) -> HashMap<String, String> {
        HashMap::new()
    }
}

// A template of only separators and whitespace renders to nothing.
fn has_templates(templates: &[String]) -> bool {
    !render_all(templates, &Placeholders::new()).is_empty()
}

/// Sybase ASE credential plugin.
pub struct SybaseDatabase<C: Connector, P = SqlCredentialsProducer> {
    producer: Mutex<ConnectionProducer<C>>,
    credentials: P,
}

impl<C: Connector> SybaseDatabase<C> {
    /// Plugin using the default naming policy
    pub fn new(connector: C) -> Self {
        Self::with_credentials(connector, SqlCredentialsProducer::new())
    }
}

impl<C: Connector, P: CredentialsProducer> SybaseDatabase<C, P> {
    /// Plugin using a custom naming policy
    pub fn with_credentials(connector: C, credentials: P) -> Self {
        Self {
            producer: Mutex::new(ConnectionProducer::new(connector)),
            credentials,
        }
    }

    /// Raw configuration as currently held
    pub async fn config(&self) -> RawConfig {
        self.producer.lock().await.raw().clone()
    }

    /// Whether `init` has succeeded and `close` not been called since
    pub async fn is_initialized(&self) -> bool {
        self.producer.lock().await.is_initialized()
    }
}

#[async_trait]
impl<C: Connector, P: CredentialsProducer> Database for SybaseDatabase<C, P> {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    #[instrument(skip_all, fields(verify = verify_connection))]
    async fn init(&self, config: RawConfig, verify_connection: bool) -> Result<RawConfig> {
        self.producer
            .lock()
            .await
            .init(config, verify_connection)
            .await
    }

    #[instrument(
        skip_all,
        fields(display_name = %username_config.display_name, role_name = %username_config.role_name)
    )]
    async fn create_user(
        &self,
        statements: &Statements,
        username_config: &UsernameConfig,
        expires_at: DateTime<Utc>,
    ) -> Result<Credential> {
        let mut producer = self.producer.lock().await;

        let statements = statements.clone().normalized();
        if !has_templates(&statements.creation) {
            return Err(DatabaseError::EmptyCreationStatement);
        }
        if !producer.is_initialized() {
            return Err(DatabaseError::NotInitialized);
        }

        let username = self.credentials.generate_username(username_config)?;
        let password = normalize_password(&self.credentials.generate_password()?);
        let expiration = self.credentials.generate_expiration(expires_at)?;

        let rendered = password.expose_secret(|password| {
            render_all(
                &statements.creation,
                &Placeholders::new()
                    .with("name", &username)
                    .with("password", password)
                    .with("expiration", &expiration),
            )
        });

        let timeout = producer.statement_timeout();
        let connection = producer.checkout().await?;
        let mut executor = Executor::new(connection, timeout);
        let outcome = executor.apply(&rendered, FailurePolicy::Abort).await;
        let poisoned = executor.is_poisoned();
        producer.checkin(poisoned).await;
        let applied = outcome.into_result(false)?;

        info!(username = %username, statements = applied, "created user");
        Ok(Credential {
            username,
            password,
            expiration,
        })
    }

    async fn renew_user(
        &self,
        _statements: &Statements,
        username: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        debug!(username, %expires_at, "renewal is a no-op");
        Ok(())
    }

    #[instrument(skip(self, statements))]
    async fn revoke_user(&self, statements: &Statements, username: &str) -> Result<()> {
        let mut producer = self.producer.lock().await;

        let statements = statements.clone().normalized();
        let rendered = render_all(
            &statements.revocation,
            &Placeholders::new().with("name", username),
        );

        let timeout = producer.statement_timeout();
        let connection = producer.checkout().await?;
        let mut executor = Executor::new(connection, timeout);

        if rendered.is_empty() {
            let result = revocation::revoke_default(&mut executor, username).await;
            let poisoned = executor.is_poisoned();
            producer.checkin(poisoned).await;
            return result;
        }

        let result = executor.apply_in_transaction(&rendered).await;
        let poisoned = executor.is_poisoned();
        producer.checkin(poisoned).await;
        let applied = result?;

        info!(username, statements = applied, "revoked user");
        Ok(())
    }

    #[instrument(skip_all)]
    async fn rotate_root_credentials(&self, statements: &[String]) -> Result<RawConfig> {
        let mut producer = self.producer.lock().await;

        if !producer.is_initialized() {
            return Err(DatabaseError::NotInitialized);
        }
        let (username, old_password) = producer
            .root_credentials()
            .ok_or(DatabaseError::MissingRootCredentials)?;

        let templates = if has_templates(statements) {
            statements.to_vec()
        } else {
            vec![DEFAULT_ROTATION_STATEMENT.to_string()]
        };

        let new_password = normalize_password(&self.credentials.generate_password()?);

        let rendered = old_password.expose_secret(|old| {
            new_password.expose_secret(|new| {
                render_all(
                    &templates,
                    &Placeholders::new()
                        .with("username", &username)
                        .with("old_password", old)
                        .with("password", new),
                )
            })
        });

        let timeout = producer.statement_timeout();
        let connection = producer.checkout().await?;
        let mut executor = Executor::new(connection, timeout);
        let result = executor.apply_in_transaction(&rendered).await;
        let poisoned = executor.is_poisoned();
        producer.checkin(poisoned).await;
        result?;

        // The open session authenticated with the old password.
        producer.invalidate().await;
        producer.update_password(new_password);

        info!(username = %username, "rotated root credentials");
        Ok(producer.raw().clone())
    }

    #[instrument(skip_all)]
    async fn close(&self) -> Result<()> {
        self.producer.lock().await.close().await
    }

    async fn secret_values(&self) -> HashMap<String, String> {
        self.producer.lock().await.secret_values()
    }
}

impl<C: Connector, P> std::fmt::Debug for SybaseDatabase<C, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SybaseDatabase").finish_non_exhaustive()
    }
}
