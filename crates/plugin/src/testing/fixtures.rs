//! Test fixtures and deterministic credential producers

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::credentials::CredentialsProducer;
use crate::error::PolicyError;
use crate::secret::SecretString;
use crate::statements::{Statements, UsernameConfig};

/// Creation template that creates a login defaulting to `vault` and maps it there
pub const VAULT_CREATION: &str = "CREATE LOGIN {{name}} WITH PASSWORD {{password}} default database vault; USE vault; sp_adduser [{{name}}]";

/// Revocation template that drops the mapping in the current database and the login
pub const VAULT_REVOCATION: &str = "sp_dropuser {{name}}; DROP LOGIN {{name}}";

/// Statement set with [`VAULT_CREATION`]
pub fn vault_statements() -> Statements {
    Statements::creation([VAULT_CREATION])
}

/// Statement set with [`VAULT_CREATION`] and [`VAULT_REVOCATION`]
pub fn vault_statements_with_revocation() -> Statements {
    vault_statements().with_revocation([VAULT_REVOCATION])
}

/// Naming policy returning fixed values.
///
/// Passwords queued with [`with_passwords`](Self::with_passwords) are handed
/// out in order before falling back to the fixed password.
#[derive(Debug)]
pub struct FixedCredentials {
    username: String,
    password: String,
    queued: Mutex<VecDeque<String>>,
    expiration: Option<String>,
}

impl FixedCredentials {
    /// Always produce `username` and `password`
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            queued: Mutex::new(VecDeque::new()),
            expiration: None,
        }
    }

    /// Hand out these passwords first
    pub fn with_passwords<I, S>(self, passwords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.queued.lock().extend(passwords.into_iter().map(Into::into));
        self
    }

    /// Fixed expiration string instead of formatting the timestamp
    pub fn with_expiration(mut self, expiration: impl Into<String>) -> Self {
        self.expiration = Some(expiration.into());
        self
    }
}

impl Default for FixedCredentials {
    fn default() -> Self {
        Self::new("v-test-AbC123", "Xy9_pw")
    }
}

impl CredentialsProducer for FixedCredentials {
    fn generate_username(&self, _config: &UsernameConfig) -> Result<String, PolicyError> {
        Ok(self.username.clone())
    }

    fn generate_password(&self) -> Result<SecretString, PolicyError> {
        let next = self.queued.lock().pop_front();
        Ok(SecretString::new(next.unwrap_or_else(|| self.password.clone())))
    }

    fn generate_expiration(&self, expires_at: DateTime<Utc>) -> Result<String, PolicyError> {
        Ok(self
            .expiration
            .clone()
            .unwrap_or_else(|| expires_at.format("%Y-%m-%d %H:%M:%S%z").to_string()))
    }
}
