//! Operator command line for the Sybase DB plugin.
//!
//! Loads the raw plugin configuration, runs one lifecycle operation and
//! prints the result as JSON on stdout. Logs go to stderr.

mod commands;
mod config;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use sybase_dbplugin_log::Format;

/// Default configuration file, relative to the working directory
const DEFAULT_CONFIG: &str = "dbplugin.toml";

#[derive(Parser, Debug)]
#[command(name = "sybase-dbplugin", version, about = "Sybase credential lifecycle operations")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true, env = "DBPLUGIN_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter, e.g. `info` or `sybase_dbplugin=debug`
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log output format
    #[arg(long, global = true, value_parser = parse_format)]
    log_format: Option<Format>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect with the configured credentials and report success
    Verify,

    /// Create a login from creation statements
    CreateUser {
        /// Display name folded into the generated username
        #[arg(long, default_value = "")]
        display_name: String,

        /// Role name folded into the generated username
        #[arg(long, default_value = "")]
        role_name: String,

        /// Lease length, e.g. `1h` or `30m`
        #[arg(long, default_value = "1h", value_parser = humantime::parse_duration)]
        ttl: std::time::Duration,

        #[command(flatten)]
        statements: StatementArgs,
    },

    /// Extend a login's lease (no statements are run)
    RenewUser {
        /// Login to renew
        #[arg(long)]
        username: String,

        /// New lease length
        #[arg(long, default_value = "1h", value_parser = humantime::parse_duration)]
        ttl: std::time::Duration,
    },

    /// Remove a login, using the built-in teardown when no statements are given
    RevokeUser {
        /// Login to remove
        #[arg(long)]
        username: String,

        #[command(flatten)]
        statements: StatementArgs,
    },

    /// Replace the root password and print the updated configuration
    RotateRoot {
        #[command(flatten)]
        statements: StatementArgs,
    },
}

/// Statement templates given inline or from a file
#[derive(Args, Debug, Default)]
struct StatementArgs {
    /// Statement template; may be repeated
    #[arg(long = "statement", value_name = "TEMPLATE")]
    inline: Vec<String>,

    /// File holding a statement template
    #[arg(long, value_name = "PATH", conflicts_with = "inline")]
    statements_file: Option<PathBuf>,
}

impl StatementArgs {
    fn templates(&self) -> Result<Vec<String>> {
        match &self.statements_file {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read statements from {}", path.display()))?;
                Ok(vec![text])
            }
            None => Ok(self.inline.clone()),
        }
    }
}

fn parse_format(s: &str) -> Result<Format, String> {
    s.parse().map_err(|e: sybase_dbplugin_log::LogError| e.to_string())
}

fn init_logging(cli: &Cli) -> Result<sybase_dbplugin_log::LoggerGuard> {
    let mut log = sybase_dbplugin_log::Config::from_env();
    if let Some(level) = &cli.log_level {
        log.level.clone_from(level);
    }
    if let Some(format) = cli.log_format {
        log.format = format;
    }
    sybase_dbplugin_log::init_with(log).context("failed to initialize logging")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_logging(&cli)?;

    let (path, explicit) = match &cli.config {
        Some(path) => (path.clone(), true),
        None => (PathBuf::from(DEFAULT_CONFIG), false),
    };
    let raw = config::load(&path, explicit)?;

    let output = commands::run(cli.command, raw).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
