//! Session state after failed, timed out or cancelled transactions.

use std::time::Duration;

use chrono::Utc;
use pretty_assertions::assert_eq;
use serde_json::Value;

use sybase_dbplugin::testing::{
    FakeConnector, FakeServer, ROOT_PASSWORD, ROOT_USERNAME, vault_statements,
};
use sybase_dbplugin::{
    Credential, Database, DatabaseError, DriverErrorKind, ErrorKind, Statements, SybaseDatabase,
    UsernameConfig,
};

// A reconnected session starts in `master`, so the database is named explicitly.
const REVOCATION: &str = "USE vault; sp_dropuser {{name}}; DROP LOGIN {{name}}";

fn revocation() -> Statements {
    Statements::default().with_revocation([REVOCATION])
}

async fn database(server: &FakeServer) -> SybaseDatabase<FakeConnector> {
    let database = SybaseDatabase::new(server.connector());
    database.init(server.raw_config(), true).await.unwrap();
    database
}

async fn create(database: &SybaseDatabase<FakeConnector>) -> Credential {
    database
        .create_user(&vault_statements(), &UsernameConfig::default(), Utc::now())
        .await
        .unwrap()
}

fn authenticates(server: &FakeServer, credential: &Credential) -> bool {
    credential
        .password
        .expose_secret(|password| server.authenticate(&credential.username, password))
}

#[tokio::test]
async fn failed_rollback_replaces_the_session() {
    // GIVEN a login whose revocation fails and whose rollback fails too
    let server = FakeServer::new();
    server.add_login("v_app", "A1a_pw", "vault");
    server.add_user("vault", "v_app");
    let database = database(&server).await;
    server.fail_on("DROP LOGIN");
    server.fail_on("ROLLBACK");

    // WHEN revoking
    let err = database.revoke_user(&revocation(), "v_app").await.unwrap_err();

    // THEN the error reports no rollback and the session is closed
    assert!(matches!(
        err,
        DatabaseError::Statement {
            applied: 2,
            rolled_back: false,
            ..
        }
    ));
    assert_eq!(err.kind(), ErrorKind::StatementExecution);
    assert_eq!(server.closed_count(), 1);

    // AND the next create runs on a fresh session and is committed
    server.clear_failures();
    let credential = create(&database).await;
    assert_eq!(server.connection_count(), 2);
    assert!(authenticates(&server, &credential));

    // AND a retried revocation can open its transaction
    database.revoke_user(&revocation(), "v_app").await.unwrap();
    assert!(!server.has_login("v_app"));
    assert!(!server.has_user("vault", "v_app"));
}

#[tokio::test]
async fn cancelled_rotation_does_not_leak_its_transaction() {
    // GIVEN a rotation dropped after BEGIN but before its ALTER completes
    let server = FakeServer::new();
    let database = database(&server).await;
    server.set_delay(Duration::from_millis(50));

    let cancelled = tokio::time::timeout(
        Duration::from_millis(75),
        database.rotate_root_credentials(&[]),
    )
    .await;
    assert!(cancelled.is_err());
    assert_eq!(server.executed(), vec!["BEGIN TRANSACTION".to_string()]);

    // WHEN the next operation creates a user
    server.set_delay(Duration::ZERO);
    let credential = create(&database).await;

    // THEN it ran outside the abandoned transaction
    assert!(authenticates(&server, &credential));
    assert_eq!(server.connection_count(), 2);
    assert!(server.authenticate(ROOT_USERNAME, ROOT_PASSWORD));
    assert_eq!(
        database.config().await["password"],
        Value::from(ROOT_PASSWORD)
    );
}

#[tokio::test]
async fn cancelled_revocation_does_not_leak_its_transaction() {
    // GIVEN a custom revocation dropped partway through
    let server = FakeServer::new();
    server.add_login("v_app", "A1a_pw", "vault");
    server.add_user("vault", "v_app");
    let database = database(&server).await;
    server.set_delay(Duration::from_millis(50));

    let cancelled = tokio::time::timeout(
        Duration::from_millis(125),
        database.revoke_user(&revocation(), "v_app"),
    )
    .await;
    assert!(cancelled.is_err());

    // WHEN the next operation creates a user
    server.set_delay(Duration::ZERO);
    let credential = create(&database).await;

    // THEN the new login is committed and the half-done revocation is not
    assert!(authenticates(&server, &credential));
    assert!(server.has_login("v_app"));
    assert!(server.has_user("vault", "v_app"));

    // AND revocation works again
    database.revoke_user(&revocation(), "v_app").await.unwrap();
    assert!(!server.has_login("v_app"));
}

#[tokio::test]
async fn statement_timeout_inside_transaction_replaces_the_session() {
    // GIVEN a statement deadline shorter than the server's response time
    let server = FakeServer::new();
    server.add_login("v_app", "A1a_pw", "vault");
    server.add_user("vault", "v_app");
    let database = SybaseDatabase::new(server.connector());
    let mut raw = server.raw_config();
    raw.insert("statement_timeout".into(), Value::from("30ms"));
    database.init(raw, true).await.unwrap();
    server.set_delay(Duration::from_millis(60));

    // WHEN a custom revocation runs
    let err = database.revoke_user(&revocation(), "v_app").await.unwrap_err();

    // THEN it times out and the session is discarded
    match &err {
        DatabaseError::Transaction { source, .. } => {
            assert_eq!(source.kind(), DriverErrorKind::Timeout);
        }
        other => panic!("expected a transaction error, got {other:?}"),
    }
    assert_eq!(server.closed_count(), 1);

    // AND a retry on a fast server succeeds on a new session
    server.set_delay(Duration::ZERO);
    database.revoke_user(&revocation(), "v_app").await.unwrap();
    assert_eq!(server.connection_count(), 2);
    assert!(!server.has_login("v_app"));
}
