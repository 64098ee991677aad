//! Connection configuration
//!
//! The control plane hands the plugin an untyped JSON object. It is decoded
//! into [`ConnectionConfig`] while the original map is kept verbatim in
//! [`RawConfig`] so unknown keys survive a root rotation.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{DatabaseError, Result};
use crate::secret::SecretString;
use crate::template::{Placeholders, render};

/// Untyped configuration as stored by the control plane
pub type RawConfig = serde_json::Map<String, Value>;

/// Key holding the connection string template
pub const CONNECTION_URL_KEY: &str = "connection_url";
/// Key holding the root password, rewritten by root rotation
pub const PASSWORD_KEY: &str = "password";

/// Pool size used when `max_open_connections` is absent or zero
pub const DEFAULT_MAX_OPEN_CONNECTIONS: u32 = 4;

/// Typed view of the connection settings.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Connection string; may contain `{{username}}` and `{{password}}`
    pub connection_url: String,
    /// Root login
    pub username: Option<String>,
    /// Root password
    pub password: Option<SecretString>,
    /// Upper bound on open connections the driver may hold
    pub max_open_connections: u32,
    /// Maximum age of a connection; zero means unlimited
    pub max_connection_lifetime: Duration,
    /// Per-statement deadline
    pub statement_timeout: Option<Duration>,
}

#[derive(Deserialize)]
struct Fields {
    #[serde(default)]
    connection_url: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default, deserialize_with = "weak_u32")]
    max_open_connections: u32,
    #[serde(default, deserialize_with = "weak_duration")]
    max_connection_lifetime: Option<Duration>,
    #[serde(default, deserialize_with = "weak_duration")]
    statement_timeout: Option<Duration>,
}

impl ConnectionConfig {
    /// Decode and validate a raw configuration map
    pub fn from_raw(raw: &RawConfig) -> Result<Self> {
        let fields: Fields = serde_json::from_value(Value::Object(raw.clone()))
            .map_err(|e| DatabaseError::invalid_config("config", e.to_string()))?;

        let connection_url = fields
            .connection_url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                DatabaseError::invalid_config(CONNECTION_URL_KEY, "connection_url cannot be empty")
            })?;

        let max_open_connections = match fields.max_open_connections {
            0 => DEFAULT_MAX_OPEN_CONNECTIONS,
            n => n,
        };

        Ok(Self {
            connection_url,
            username: fields.username.filter(|u| !u.is_empty()),
            password: fields.password.filter(|p| !p.is_empty()).map(SecretString::new),
            max_open_connections,
            max_connection_lifetime: fields.max_connection_lifetime.unwrap_or_default(),
            statement_timeout: fields.statement_timeout.filter(|d| !d.is_zero()),
        })
    }

    /// Connection string with the root credential substituted
    pub fn connection_url(&self) -> String {
        let username = self.username.as_deref().unwrap_or_default();
        self.password.as_ref().map_or_else(
            || render(&self.connection_url, &Placeholders::new().with("username", username)),
            |password| {
                password.expose_secret(|password| {
                    render(
                        &self.connection_url,
                        &Placeholders::new()
                            .with("username", username)
                            .with("password", password),
                    )
                })
            },
        )
    }

    /// Secret values mapped to the placeholder that replaces them in errors
    pub fn secret_values(&self) -> HashMap<String, String> {
        let mut secrets = HashMap::new();
        if let Some(password) = &self.password {
            password.expose_secret(|p| secrets.insert(p.to_string(), "[password]".to_string()));
        }
        secrets
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("connection_url", &self.connection_url)
            .field("username", &self.username)
            .field("max_open_connections", &self.max_open_connections)
            .field("max_connection_lifetime", &self.max_connection_lifetime)
            .field("statement_timeout", &self.statement_timeout)
            .finish()
    }
}

/// Accepts `5`, `"5"`, or null.
fn weak_u32<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(0),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| de::Error::custom(format!("expected a non-negative integer, got {n}"))),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(0),
        Some(Value::String(s)) => s
            .trim()
            .parse::<u32>()
            .map_err(|_| de::Error::custom(format!("expected a non-negative integer, got {s:?}"))),
        Some(other) => Err(de::Error::custom(format!(
            "expected a number or numeric string, got {other}"
        ))),
    }
}

/// Accepts seconds as a number or numeric string, or a humantime string such as `"5m"`.
fn weak_duration<'de, D>(deserializer: D) -> std::result::Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(|secs| Some(Duration::from_secs(secs)))
            .ok_or_else(|| de::Error::custom(format!("expected whole seconds, got {n}"))),
        Some(Value::String(s)) => parse_duration(&s).map(Some).map_err(de::Error::custom),
        Some(other) => Err(de::Error::custom(format!(
            "expected a duration, got {other}"
        ))),
    }
}

fn parse_duration(input: &str) -> std::result::Result<Duration, String> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(Duration::ZERO);
    }
    if let Ok(secs) = input.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(input).map_err(|e| format!("invalid duration {input:?}: {e}"))
}
