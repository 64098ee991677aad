//! Configuration presets for common scenarios

use super::{Config, DisplayConfig, Fields, Format};

impl Config {
    /// Create configuration from environment variables
    ///
    /// - `DBPLUGIN_LOG`, falling back to `RUST_LOG`: level filter
    /// - `DBPLUGIN_LOG_FORMAT`: `pretty`, `compact` or `json`
    /// - `DBPLUGIN_SERVICE`, `DBPLUGIN_ENV`: root span fields
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(level) = lookup("DBPLUGIN_LOG").or_else(|| lookup("RUST_LOG")) {
            config.level = level;
        }

        // Unknown names fall back to compact rather than failing startup
        if let Some(format) = lookup("DBPLUGIN_LOG_FORMAT") {
            config.format = format.parse().unwrap_or(Format::Compact);
        }

        config.fields = Fields {
            service: lookup("DBPLUGIN_SERVICE"),
            env: lookup("DBPLUGIN_ENV"),
            version: Some(env!("CARGO_PKG_VERSION").to_string()),
        };

        config
    }

    /// Development configuration (pretty, debug level)
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            format: Format::Pretty,
            display: DisplayConfig {
                colors: true,
                source: true,
                ..DisplayConfig::default()
            },
            ..Self::default()
        }
    }

    /// Production configuration (JSON, info level)
    #[must_use]
    pub fn production() -> Self {
        Self {
            level: "info".to_string(),
            format: Format::Json,
            display: DisplayConfig {
                colors: false,
                source: false,
                flatten: true,
                ..DisplayConfig::default()
            },
            ..Self::default()
        }
    }
}
