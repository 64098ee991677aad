//! Subcommand execution

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, TimeDelta, Utc};
use serde_json::{Value, json};
use sybase_dbplugin::{Database, RawConfig, Statements, UsernameConfig};

use crate::Command;

fn expires_in(ttl: Duration) -> Result<DateTime<Utc>> {
    let ttl = TimeDelta::from_std(ttl).context("ttl is out of range")?;
    Ok(Utc::now() + ttl)
}

/// Initialize the plugin, run one command and close the connection.
pub(crate) async fn run(command: Command, raw: RawConfig) -> Result<Value> {
    let db = sybase_dbplugin::new_database();
    let verify = matches!(command, Command::Verify);

    db.init(raw, verify)
        .await
        .context("failed to initialize plugin")?;

    let result = execute(&db, command).await;

    if let Err(e) = db.close().await {
        tracing::warn!(error = %e, "failed to close connection");
    }
    result
}

async fn execute<D: Database>(db: &D, command: Command) -> Result<Value> {
    match command {
        Command::Verify => {
            tracing::info!("connection verified");
            Ok(json!({ "type": db.type_name(), "verified": true }))
        }

        Command::CreateUser {
            display_name,
            role_name,
            ttl,
            statements,
        } => {
            let statements = Statements::creation(statements.templates()?);
            let credential = db
                .create_user(
                    &statements,
                    &UsernameConfig::new(display_name, role_name),
                    expires_in(ttl)?,
                )
                .await
                .context("failed to create user")?;

            tracing::info!(username = %credential.username, "user created");
            Ok(serde_json::to_value(&credential)?)
        }

        Command::RenewUser { username, ttl } => {
            let expires_at = expires_in(ttl)?;
            db.renew_user(&Statements::default(), &username, expires_at)
                .await
                .context("failed to renew user")?;
            Ok(json!({ "username": username, "expiration": expires_at.to_rfc3339() }))
        }

        Command::RevokeUser {
            username,
            statements,
        } => {
            let statements = Statements::default().with_revocation(statements.templates()?);
            db.revoke_user(&statements, &username)
                .await
                .context("failed to revoke user")?;

            tracing::info!(%username, "user revoked");
            Ok(json!({ "username": username, "revoked": true }))
        }

        Command::RotateRoot { statements } => {
            let config = db
                .rotate_root_credentials(&statements.templates()?)
                .await
                .context("failed to rotate root credentials")?;

            tracing::info!("root credentials rotated");
            Ok(Value::Object(config))
        }
    }
}
