//! Error sanitizing wrapper

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::config::{PASSWORD_KEY, RawConfig};
use crate::credentials::Credential;
use crate::database::Database;
use crate::error::Result;
use crate::statements::{Statements, UsernameConfig};

/// Wraps a [`Database`] so no secret value from its configuration appears in
/// a returned error message.
///
/// Errors that carry no secret keep their concrete variant; otherwise they
/// become [`DatabaseError::Sanitized`](crate::DatabaseError::Sanitized) with
/// the original kind.
#[derive(Debug)]
pub struct ErrorSanitizerMiddleware<D> {
    inner: D,
}

impl<D: Database> ErrorSanitizerMiddleware<D> {
    /// Wrap `inner`
    pub fn new(inner: D) -> Self {
        Self { inner }
    }

    /// Wrapped database
    pub fn inner(&self) -> &D {
        &self.inner
    }

    /// Unwrap
    pub fn into_inner(self) -> D {
        self.inner
    }

    async fn sanitize<T>(&self, result: Result<T>) -> Result<T> {
        self.sanitize_with(result, HashMap::new()).await
    }

    async fn sanitize_with<T>(
        &self,
        result: Result<T>,
        mut extra: HashMap<String, String>,
    ) -> Result<T> {
        match result {
            Ok(value) => Ok(value),
            Err(err) => {
                extra.extend(self.inner.secret_values().await);
                Err(err.sanitize(&extra))
            }
        }
    }
}

#[async_trait]
impl<D: Database> Database for ErrorSanitizerMiddleware<D> {
    fn type_name(&self) -> &'static str {
        self.inner.type_name()
    }

    async fn init(&self, config: RawConfig, verify_connection: bool) -> Result<RawConfig> {
        // A rejected config never reaches the inner secret set.
        let incoming: HashMap<String, String> = config
            .get(PASSWORD_KEY)
            .and_then(Value::as_str)
            .filter(|p| !p.is_empty())
            .map(|p| (p.to_string(), "[password]".to_string()))
            .into_iter()
            .collect();

        let result = self.inner.init(config, verify_connection).await;
        self.sanitize_with(result, incoming).await
    }

    async fn create_user(
        &self,
        statements: &Statements,
        username_config: &UsernameConfig,
        expires_at: DateTime<Utc>,
    ) -> Result<Credential> {
        let result = self
            .inner
            .create_user(statements, username_config, expires_at)
            .await;
        self.sanitize(result).await
    }

    async fn renew_user(
        &self,
        statements: &Statements,
        username: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let result = self.inner.renew_user(statements, username, expires_at).await;
        self.sanitize(result).await
    }

    async fn revoke_user(&self, statements: &Statements, username: &str) -> Result<()> {
        let result = self.inner.revoke_user(statements, username).await;
        self.sanitize(result).await
    }

    async fn rotate_root_credentials(&self, statements: &[String]) -> Result<RawConfig> {
        let result = self.inner.rotate_root_credentials(statements).await;
        self.sanitize(result).await
    }

    async fn close(&self) -> Result<()> {
        let result = self.inner.close().await;
        self.sanitize(result).await
    }

    async fn secret_values(&self) -> HashMap<String, String> {
        self.inner.secret_values().await
    }
}
