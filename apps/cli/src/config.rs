//! Raw plugin configuration loading

use std::path::Path;

use anyhow::{Context, Result, bail};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde_json::Value;
use sybase_dbplugin::RawConfig;
use sybase_dbplugin::config::DEFAULT_MAX_OPEN_CONNECTIONS;

/// Environment prefix for configuration keys
pub const ENV_PREFIX: &str = "DBPLUGIN_";

/// Keys under [`ENV_PREFIX`] that belong to the logger or the CLI itself
const RESERVED_ENV_KEYS: &[&str] = &["log", "log_format", "service", "env", "config"];

/// Keys that must reach the plugin as strings even when the value looks numeric
const STRING_KEYS: &[&str] = &["connection_url", "username", "password"];

/// Load the raw configuration: defaults, then the TOML file, then `DBPLUGIN_*`.
///
/// A missing file is only an error when the path was given explicitly.
pub fn load(path: &Path, explicit: bool) -> Result<RawConfig> {
    if explicit && !path.exists() {
        bail!("config file {} does not exist", path.display());
    }

    let figment = Figment::new()
        .merge(Serialized::default("max_open_connections", DEFAULT_MAX_OPEN_CONNECTIONS))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).ignore(RESERVED_ENV_KEYS));

    let mut raw: RawConfig = figment
        .extract()
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;

    stringify(&mut raw);
    Ok(raw)
}

// Env values are parsed loosely, so a numeric password would arrive as a number.
fn stringify(raw: &mut RawConfig) {
    for key in STRING_KEYS {
        if let Some(value) = raw.get_mut(*key) {
            match value {
                Value::Number(n) => *value = Value::String(n.to_string()),
                Value::Bool(b) => *value = Value::String(b.to_string()),
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_file_values_are_loaded_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "connection_url = \"server=tcp:db,5000;user={{{{username}}}}\"\nusername = \"sa\"\npassword = \"12345\""
        )
        .unwrap();

        let raw = load(file.path(), true).unwrap();

        assert_eq!(raw["username"], "sa");
        assert_eq!(raw["password"], "12345");
        assert_eq!(raw["max_open_connections"], 4);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let err = load(Path::new("/nonexistent/dbplugin.toml"), true).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_numeric_secrets_become_strings() {
        let mut raw = RawConfig::new();
        raw.insert("password".into(), Value::from(12345));
        raw.insert("max_open_connections".into(), Value::from(2));

        stringify(&mut raw);

        assert_eq!(raw["password"], "12345");
        assert_eq!(raw["max_open_connections"], 2);
    }
}
