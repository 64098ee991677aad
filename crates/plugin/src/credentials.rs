//! Naming and secret policy
//!
//! [`CredentialsProducer`] is the seam through which the lifecycle engine
//! obtains usernames, passwords and expiration strings. The engine never
//! inspects what it gets back beyond normalizing passwords with
//! [`normalize_password`].

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::Serialize;

use crate::error::PolicyError;
use crate::secret::SecretString;
use crate::statements::UsernameConfig;

/// A generated database credential, handed back to the caller and never read back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Credential {
    /// Login name
    pub username: String,
    /// Login password
    pub password: SecretString,
    /// Expiration as rendered into `{{expiration}}`
    pub expiration: String,
}

/// Produces the identifiers for a new credential.
///
/// Errors are forwarded to the caller unchanged.
#[cfg_attr(test, mockall::automock)]
pub trait CredentialsProducer: Send + Sync + 'static {
    /// Generate a login name from the requesting display and role names
    fn generate_username(&self, config: &UsernameConfig) -> Result<String, PolicyError>;

    /// Generate a password
    fn generate_password(&self) -> Result<SecretString, PolicyError>;

    /// Render the expiration timestamp
    fn generate_expiration(&self, expires_at: DateTime<Utc>) -> Result<String, PolicyError>;
}

/// `-` is not accepted by the server's password syntax.
pub fn normalize_password(password: &SecretString) -> SecretString {
    password.map(|p| p.replace('-', "_"))
}

const USERNAME_PREFIX: &str = "v";
const EXPIRATION_FORMAT: &str = "%Y-%m-%d %H:%M:%S%z";
const PASSWORD_PREFIX: &str = "A1a-";
const RANDOM_SUFFIX_LEN: usize = 20;

/// Default naming policy for SQL logins.
///
/// Usernames look like `v_<display>_<role>_<random>_<unix seconds>` and are
/// truncated to [`username_len`](Self::username_len). Passwords start with
/// `A1a-` so they satisfy the usual upper/lower/digit/symbol complexity rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlCredentialsProducer {
    /// Characters kept from the display name
    pub display_name_len: usize,
    /// Characters kept from the role name
    pub role_name_len: usize,
    /// Maximum username length
    pub username_len: usize,
    /// Separator between username parts
    pub separator: char,
    /// Total password length including the prefix
    pub password_len: usize,
}

impl Default for SqlCredentialsProducer {
    fn default() -> Self {
        Self {
            display_name_len: 20,
            role_name_len: 20,
            username_len: 30,
            separator: '_',
            password_len: 20,
        }
    }
}

impl SqlCredentialsProducer {
    /// Producer with the default limits
    pub fn new() -> Self {
        Self::default()
    }
}

fn random_alphanumeric(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

fn sanitize_part(part: &str, max_len: usize) -> String {
    part.chars()
        .take(max_len)
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

impl CredentialsProducer for SqlCredentialsProducer {
    fn generate_username(&self, config: &UsernameConfig) -> Result<String, PolicyError> {
        if self.username_len == 0 {
            return Err(PolicyError::Username("username length must be positive".into()));
        }

        let sep = self.separator.to_string();
        let parts = [
            USERNAME_PREFIX.to_string(),
            sanitize_part(&config.display_name, self.display_name_len),
            sanitize_part(&config.role_name, self.role_name_len),
            random_alphanumeric(RANDOM_SUFFIX_LEN),
            Utc::now().timestamp().to_string(),
        ];

        let username: String = parts.join(&sep).chars().take(self.username_len).collect();
        Ok(username)
    }

    fn generate_password(&self) -> Result<SecretString, PolicyError> {
        let random_len = self
            .password_len
            .checked_sub(PASSWORD_PREFIX.len())
            .filter(|n| *n > 0)
            .ok_or_else(|| {
                PolicyError::Password(format!(
                    "password length must exceed {}",
                    PASSWORD_PREFIX.len()
                ))
            })?;

        Ok(SecretString::new(format!(
            "{PASSWORD_PREFIX}{}",
            random_alphanumeric(random_len)
        )))
    }

    fn generate_expiration(&self, expires_at: DateTime<Utc>) -> Result<String, PolicyError> {
        Ok(expires_at.format(EXPIRATION_FORMAT).to_string())
    }
}
