//! Logger configuration
//!
//! - [`Config`]: level filter, output format, writer, display toggles, global fields
//! - presets (`from_env`, `development`, `production`) live in `presets`

mod presets;

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LogError;

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Level filter in `EnvFilter` syntax (e.g. "info", "debug,tiberius=warn")
    pub level: String,

    /// Output format
    pub format: Format,

    /// Output stream
    pub writer: WriterConfig,

    /// Display toggles
    pub display: DisplayConfig,

    /// Global fields attached through the root span
    pub fields: Fields,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: Format::Compact,
            writer: WriterConfig::Stderr,
            display: DisplayConfig::default(),
            fields: Fields::default(),
        }
    }
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Human-readable, multi-line
    Pretty,
    /// Single line per event
    Compact,
    /// One JSON object per event
    Json,
}

impl FromStr for Format {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Format::Pretty),
            "compact" => Ok(Format::Compact),
            "json" => Ok(Format::Json),
            other => Err(LogError::Format(other.to_string())),
        }
    }
}

/// Where log lines go.
///
/// Stdout is reserved for command output in the CLI, so stderr is the default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriterConfig {
    /// Standard error
    #[default]
    Stderr,
    /// Standard output
    Stdout,
}

/// Display toggles
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Show timestamps
    pub time: bool,
    /// Show source location (`file:line`)
    pub source: bool,
    /// Show target module
    pub target: bool,
    /// Show thread IDs
    pub thread_ids: bool,
    /// Use ANSI colors
    pub colors: bool,
    /// Include the span list in JSON output
    pub span_list: bool,
    /// Flatten event fields into the top-level JSON object
    pub flatten: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            time: true,
            source: false,
            target: true,
            thread_ids: false,
            colors: false,
            span_list: false,
            flatten: false,
        }
    }
}

/// Fields recorded on the root span
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fields {
    /// Service name
    pub service: Option<String>,
    /// Environment (dev/staging/prod)
    pub env: Option<String>,
    /// Version
    pub version: Option<String>,
}

impl Fields {
    /// Whether no field is set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.service.is_none() && self.env.is_none() && self.version.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_from_str() {
        assert_eq!("JSON".parse::<Format>().unwrap(), Format::Json);
        assert_eq!(" pretty ".parse::<Format>().unwrap(), Format::Pretty);
        assert!(matches!(
            "logfmt".parse::<Format>(),
            Err(LogError::Format(name)) if name == "logfmt"
        ));
    }

    #[test]
    fn test_config_deserializes_partial_input() {
        let config: Config =
            serde_json::from_value(serde_json::json!({ "format": "json" })).unwrap();
        assert_eq!(config.format, Format::Json);
        assert_eq!(config.level, "info");
        assert_eq!(config.writer, WriterConfig::Stderr);
    }

    #[test]
    fn test_fields_is_empty() {
        assert!(Fields::default().is_empty());
        assert!(
            !Fields {
                service: Some("sybase-dbplugin".into()),
                ..Fields::default()
            }
            .is_empty()
        );
    }
}
