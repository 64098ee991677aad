//! Fallback revocation used when the caller supplies no revocation statements
//!
//! 1. Lock the server login so it cannot authenticate while being torn down.
//! 2. Look up the login's default database in `master.dbo.syslogins`.
//! 3. Drop the user mapping in that database and then the login. Both drops
//!    are existence-guarded so a half-revoked login can be revoked again.
//!
//! The teardown attempts every drop even if one fails.

use tracing::{info, warn};

use crate::driver::Connection;
use crate::error::{DatabaseError, Result, StatementFailure};
use crate::executor::{ApplyOutcome, Executor, FailurePolicy};
use crate::template::{Placeholders, render};

const LOCK_LOGIN: &str = r#"master.dbo.sp_locklogin {{name}}, "lock""#;

const DEFAULT_DATABASE_LOOKUP: &str =
    "SELECT dbname FROM master.dbo.syslogins WHERE name = '{{name}}'";

const DROP_USER: &str = "IF EXISTS (SELECT name FROM {{database}}.dbo.sysusers WHERE name = '{{name}}') \
     BEGIN execute {{database}}.dbo.sp_dropuser {{name}} END";

const DROP_LOGIN: &str = "IF EXISTS (SELECT name FROM master.dbo.syslogins WHERE name = '{{name}}') \
     BEGIN DROP LOGIN {{name}} END";

/// Statement that locks `username`
pub fn lock_statement(username: &str) -> String {
    render(LOCK_LOGIN, &Placeholders::new().with("name", username))
}

/// Query returning the default database of `username`
pub fn lookup_query(username: &str) -> String {
    render(DEFAULT_DATABASE_LOOKUP, &Placeholders::new().with("name", username))
}

/// Guarded drops of the user mapping in `database` and of the login
pub fn teardown_statements(username: &str, database: &str) -> [String; 2] {
    let values = Placeholders::new()
        .with("name", username)
        .with("database", database);
    [render(DROP_USER, &values), render(DROP_LOGIN, &values)]
}

/// Run the fallback revocation for `username`.
pub async fn revoke_default<T: Connection>(
    executor: &mut Executor<'_, T>,
    username: &str,
) -> Result<()> {
    executor
        .execute(&lock_statement(username))
        .await
        .map_err(|source| DatabaseError::Statement {
            applied: 0,
            rolled_back: false,
            failure: StatementFailure { index: 0, source },
        })?;

    let database = executor
        .query_value(&lookup_query(username))
        .await
        .map_err(|source| DatabaseError::Statement {
            applied: 1,
            rolled_back: false,
            failure: StatementFailure { index: 1, source },
        })?
        .map(|db| db.trim().to_string())
        .filter(|db| !db.is_empty())
        .ok_or_else(|| DatabaseError::NoDefaultDatabase {
            username: username.to_string(),
        })?;

    match executor
        .apply(&teardown_statements(username, &database), FailurePolicy::Continue)
        .await
    {
        ApplyOutcome::Applied { .. } => {
            info!(username, database = %database, "revoked login with default teardown");
            Ok(())
        }
        ApplyOutcome::Partial { failures, .. } => {
            warn!(username, failed = failures.len(), "default teardown incomplete");
            Err(DatabaseError::IncompleteRevocation {
                username: username.to_string(),
                failures,
            })
        }
    }
}
