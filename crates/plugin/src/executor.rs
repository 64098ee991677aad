//! Ordered statement execution
//!
//! Runs rendered statements over one [`Connection`] and reports exactly how
//! far it got. Two failure policies exist: [`FailurePolicy::Abort`] stops at
//! the first error, [`FailurePolicy::Continue`] attempts every statement and
//! collects all failures.
//!
//! A timeout, a lost link, or a failed transaction control statement leaves
//! the session in an unknown state. The executor then reports itself
//! [poisoned](Executor::is_poisoned) and the caller must not reuse the handle.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::driver::Connection;
use crate::error::{
    DatabaseError, DriverError, DriverErrorKind, Result, StatementFailure, TransactionPhase,
};

/// What to do after a statement fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Skip the remaining statements
    Abort,
    /// Attempt the remaining statements anyway
    Continue,
}

/// Result of applying a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Every statement succeeded
    Applied {
        /// Number of statements executed
        statements: usize,
    },
    /// At least one statement failed
    Partial {
        /// Statements that succeeded
        applied: usize,
        /// Failures in execution order
        failures: Vec<StatementFailure>,
    },
}

impl ApplyOutcome {
    /// Whether every statement succeeded
    pub fn is_applied(&self) -> bool {
        matches!(self, ApplyOutcome::Applied { .. })
    }

    /// Number of statements that succeeded
    pub fn applied(&self) -> usize {
        match self {
            ApplyOutcome::Applied { statements } => *statements,
            ApplyOutcome::Partial { applied, .. } => *applied,
        }
    }

    /// Failures, empty when fully applied
    pub fn failures(&self) -> &[StatementFailure] {
        match self {
            ApplyOutcome::Applied { .. } => &[],
            ApplyOutcome::Partial { failures, .. } => failures,
        }
    }

    /// Convert an aborted batch into [`DatabaseError::Statement`] carrying the last failure
    pub fn into_result(self, rolled_back: bool) -> Result<usize> {
        match self {
            ApplyOutcome::Applied { statements } => Ok(statements),
            ApplyOutcome::Partial {
                applied,
                mut failures,
            } => match failures.pop() {
                Some(failure) => Err(DatabaseError::Statement {
                    applied,
                    rolled_back,
                    failure,
                }),
                None => Ok(applied),
            },
        }
    }
}

async fn bounded<T, F>(limit: Option<Duration>, operation: F) -> std::result::Result<T, DriverError>
where
    F: Future<Output = std::result::Result<T, DriverError>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, operation)
            .await
            .map_err(|_| DriverError::timeout(limit))?,
        None => operation.await,
    }
}

/// Executes statements on a borrowed connection.
pub struct Executor<'c, T: Connection> {
    connection: &'c mut T,
    timeout: Option<Duration>,
    poisoned: bool,
}

impl<'c, T: Connection> Executor<'c, T> {
    /// Wrap a connection; `timeout` bounds every statement individually
    pub fn new(connection: &'c mut T, timeout: Option<Duration>) -> Self {
        Self {
            connection,
            timeout,
            poisoned: false,
        }
    }

    /// Whether the session may hold an open transaction or a half-read
    /// response. A poisoned handle must be closed, not reused.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    fn observe<R>(&mut self, result: &std::result::Result<R, DriverError>) {
        if let Err(e) = result {
            if e.kind() == DriverErrorKind::Timeout || e.is_connection_failure() {
                self.poisoned = true;
            }
        }
    }

    /// Execute a single statement
    pub async fn execute(&mut self, statement: &str) -> std::result::Result<(), DriverError> {
        let result = bounded(self.timeout, self.connection.execute(statement)).await;
        self.observe(&result);
        result
    }

    /// Read the first column of the first row
    pub async fn query_value(
        &mut self,
        query: &str,
    ) -> std::result::Result<Option<String>, DriverError> {
        let result = bounded(self.timeout, self.connection.query_value(query)).await;
        self.observe(&result);
        result
    }

    /// Execute statements in order under `policy`
    pub async fn apply<S: AsRef<str>>(
        &mut self,
        statements: &[S],
        policy: FailurePolicy,
    ) -> ApplyOutcome {
        let mut applied = 0;
        let mut failures = Vec::new();

        for (index, statement) in statements.iter().enumerate() {
            match self.execute(statement.as_ref()).await {
                Ok(()) => applied += 1,
                Err(source) => {
                    debug!(index, error = %source, "statement failed");
                    failures.push(StatementFailure { index, source });
                    if policy == FailurePolicy::Abort {
                        break;
                    }
                }
            }
        }

        if failures.is_empty() {
            ApplyOutcome::Applied {
                statements: applied,
            }
        } else {
            ApplyOutcome::Partial { applied, failures }
        }
    }

    /// Execute statements in one transaction, rolling back on the first failure.
    ///
    /// Any failure of BEGIN, COMMIT or ROLLBACK poisons the executor, since the
    /// server side of the transaction is then unknown.
    pub async fn apply_in_transaction<S: AsRef<str>>(&mut self, statements: &[S]) -> Result<usize> {
        if let Err(source) = bounded(self.timeout, self.connection.begin()).await {
            self.poisoned = true;
            return Err(DatabaseError::Transaction {
                phase: TransactionPhase::Begin,
                source,
            });
        }

        let outcome = self.apply(statements, FailurePolicy::Abort).await;
        if !outcome.is_applied() {
            let rolled_back = match bounded(self.timeout, self.connection.rollback()).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, "rollback failed, session left with an open transaction");
                    self.poisoned = true;
                    false
                }
            };
            return outcome.into_result(rolled_back);
        }

        if let Err(source) = bounded(self.timeout, self.connection.commit()).await {
            self.poisoned = true;
            return Err(DatabaseError::Transaction {
                phase: TransactionPhase::Commit,
                source,
            });
        }

        Ok(outcome.applied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeServer;
    use pretty_assertions::assert_eq;

    async fn session(server: &FakeServer) -> crate::testing::FakeConnection {
        use crate::driver::Connector;
        let config = crate::config::ConnectionConfig::from_raw(&server.raw_config()).unwrap();
        server.connector().connect(&config).await.unwrap()
    }

    #[tokio::test]
    async fn test_abort_stops_at_first_failure() {
        let server = FakeServer::new();
        server.fail_on("sp_adduser");
        let mut connection = session(&server).await;

        let outcome = Executor::new(&mut connection, None)
            .apply(
                &[
                    "CREATE LOGIN a WITH PASSWORD p",
                    "sp_adduser a",
                    "CREATE LOGIN b WITH PASSWORD p",
                ],
                FailurePolicy::Abort,
            )
            .await;

        assert_eq!(outcome.applied(), 1);
        assert_eq!(outcome.failures().len(), 1);
        assert_eq!(outcome.failures()[0].index, 1);
        assert!(server.has_login("a"));
        assert!(!server.has_login("b"));
    }

    #[tokio::test]
    async fn test_continue_attempts_everything() {
        let server = FakeServer::new();
        let mut connection = session(&server).await;

        let outcome = Executor::new(&mut connection, None)
            .apply(
                &["DROP LOGIN missing", "CREATE LOGIN b WITH PASSWORD p", "DROP LOGIN gone"],
                FailurePolicy::Continue,
            )
            .await;

        assert_eq!(outcome.applied(), 1);
        let indexes: Vec<_> = outcome.failures().iter().map(|f| f.index).collect();
        assert_eq!(indexes, vec![0, 2]);
        assert!(server.has_login("b"));
    }

    #[tokio::test]
    async fn test_transaction_rolls_back() {
        let server = FakeServer::new();
        server.fail_on("DROP LOGIN b");
        let mut connection = session(&server).await;

        let err = Executor::new(&mut connection, None)
            .apply_in_transaction(&["CREATE LOGIN a WITH PASSWORD p", "DROP LOGIN b"])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DatabaseError::Statement {
                applied: 1,
                rolled_back: true,
                ..
            }
        ));
        assert!(!server.has_login("a"));
    }

    #[tokio::test]
    async fn test_statement_failure_with_rollback_keeps_session() {
        let server = FakeServer::new();
        server.fail_on("DROP LOGIN b");
        let mut connection = session(&server).await;
        let mut executor = Executor::new(&mut connection, None);

        executor
            .apply_in_transaction(&["CREATE LOGIN a WITH PASSWORD p", "DROP LOGIN b"])
            .await
            .unwrap_err();

        assert!(!executor.is_poisoned());
    }

    #[tokio::test]
    async fn test_rollback_failure_poisons() {
        // GIVEN a statement and the rollback after it both fail
        let server = FakeServer::new();
        server.fail_on("DROP LOGIN b");
        server.fail_on("ROLLBACK");
        let mut connection = session(&server).await;
        let mut executor = Executor::new(&mut connection, None);

        // WHEN the batch runs in a transaction
        let err = executor
            .apply_in_transaction(&["CREATE LOGIN a WITH PASSWORD p", "DROP LOGIN b"])
            .await
            .unwrap_err();

        // THEN the error admits nothing was rolled back
        assert!(matches!(
            err,
            DatabaseError::Statement {
                applied: 1,
                rolled_back: false,
                ..
            }
        ));
        assert!(executor.is_poisoned());
    }

    #[tokio::test]
    async fn test_commit_failure() {
        let server = FakeServer::new();
        server.fail_on("COMMIT");
        let mut connection = session(&server).await;

        let mut executor = Executor::new(&mut connection, None);

        let err = executor
            .apply_in_transaction(&["CREATE LOGIN a WITH PASSWORD p"])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DatabaseError::Transaction {
                phase: TransactionPhase::Commit,
                ..
            }
        ));
        assert!(executor.is_poisoned());
        assert!(!server.has_login("a"));
    }

    #[tokio::test]
    async fn test_statement_timeout() {
        let server = FakeServer::new();
        server.set_delay(Duration::from_millis(200));
        let mut connection = session(&server).await;

        let mut executor = Executor::new(&mut connection, Some(Duration::from_millis(20)));

        let err = executor
            .execute("CREATE LOGIN a WITH PASSWORD p")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), DriverErrorKind::Timeout);
        assert!(executor.is_poisoned());
        assert!(!server.has_login("a"));
    }
}
