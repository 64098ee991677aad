//! The fallback revocation path taken when no revocation statements are given.

use pretty_assertions::assert_eq;

use sybase_dbplugin::testing::{FakeConnector, FakeServer, FixedCredentials};
use sybase_dbplugin::{Database, DatabaseError, ErrorKind, Statements, SybaseDatabase};

async fn database(server: &FakeServer) -> SybaseDatabase<FakeConnector, FixedCredentials> {
    let database = SybaseDatabase::with_credentials(server.connector(), FixedCredentials::default());
    database.init(server.raw_config(), false).await.unwrap();
    database
}

#[tokio::test]
async fn fallback_issues_lock_lookup_and_guarded_drops_in_order() {
    let server = FakeServer::new();
    server.add_login("v_app", "pw", "vault");
    server.add_user("vault", "v_app");
    let database = database(&server).await;

    database
        .revoke_user(&Statements::default(), "v_app")
        .await
        .unwrap();

    assert_eq!(
        server.executed(),
        vec![
            r#"master.dbo.sp_locklogin v_app, "lock""#.to_string(),
            "SELECT dbname FROM master.dbo.syslogins WHERE name = 'v_app'".to_string(),
            "IF EXISTS (SELECT name FROM vault.dbo.sysusers WHERE name = 'v_app') BEGIN execute vault.dbo.sp_dropuser v_app END".to_string(),
            "IF EXISTS (SELECT name FROM master.dbo.syslogins WHERE name = 'v_app') BEGIN DROP LOGIN v_app END".to_string(),
        ]
    );
    assert!(!server.has_login("v_app"));
    assert!(!server.has_user("vault", "v_app"));
}

#[tokio::test]
async fn whitespace_only_revocation_uses_fallback() {
    let server = FakeServer::new();
    server.add_login("v_app", "pw", "vault");
    let database = database(&server).await;

    database
        .revoke_user(&Statements::default().with_revocation(["  ;  "]), "v_app")
        .await
        .unwrap();

    assert!(!server.has_login("v_app"));
}

#[tokio::test]
async fn lock_failure_aborts_before_lookup_and_drops() {
    // GIVEN a login that does not exist on the server
    let server = FakeServer::new();
    let database = database(&server).await;

    // WHEN revoking it with the fallback
    let err = database
        .revoke_user(&Statements::default(), "v_ghost")
        .await
        .unwrap_err();

    // THEN the lock fails and nothing else is sent
    assert!(matches!(err, DatabaseError::Statement { applied: 0, .. }));
    assert_eq!(err.kind(), ErrorKind::StatementExecution);
    assert_eq!(server.executed().len(), 1);
}

#[tokio::test]
async fn empty_default_database_is_a_lookup_error() {
    // GIVEN a login whose syslogins row has no default database
    let server = FakeServer::new();
    server.add_login("v_app", "pw", "");
    let database = database(&server).await;

    // WHEN revoking with the fallback
    let err = database
        .revoke_user(&Statements::default(), "v_app")
        .await
        .unwrap_err();

    // THEN it is a lookup error and the login is locked but not dropped
    assert!(matches!(err, DatabaseError::NoDefaultDatabase { ref username } if username == "v_app"));
    assert_eq!(err.kind(), ErrorKind::Lookup);
    assert!(server.has_login("v_app"));
    assert!(server.is_locked("v_app"));
    assert!(!server.authenticate("v_app", "pw"));
}

#[tokio::test]
async fn teardown_attempts_every_drop_and_reports_the_last_failure() {
    // GIVEN both drops fail
    let server = FakeServer::new();
    server.add_login("v_app", "pw", "vault");
    server.add_user("vault", "v_app");
    server.fail_on("sysusers");
    server.fail_on("DROP LOGIN");
    let database = database(&server).await;

    // WHEN revoking
    let err = database
        .revoke_user(&Statements::default(), "v_app")
        .await
        .unwrap_err();

    // THEN both drops were attempted and every failure is kept
    let DatabaseError::IncompleteRevocation { username, failures } = &err else {
        panic!("unexpected error: {err:?}");
    };
    assert_eq!(username, "v_app");
    assert_eq!(failures.len(), 2);
    assert!(err.to_string().contains("DROP LOGIN"));
    assert_eq!(server.executed().len(), 4);
}

#[tokio::test]
async fn teardown_continues_after_user_drop_failure() {
    let server = FakeServer::new();
    server.add_login("v_app", "pw", "vault");
    server.add_user("vault", "v_app");
    server.fail_on("sysusers");
    let database = database(&server).await;

    let err = database
        .revoke_user(&Statements::default(), "v_app")
        .await
        .unwrap_err();

    assert!(matches!(err, DatabaseError::IncompleteRevocation { .. }));
    assert!(!server.has_login("v_app"));
    assert!(server.has_user("vault", "v_app"));
}

#[tokio::test]
async fn fallback_is_idempotent_for_half_revoked_login() {
    // GIVEN the user mapping is already gone
    let server = FakeServer::new();
    server.add_login("v_app", "pw", "vault");
    let database = database(&server).await;

    // WHEN revoking
    database
        .revoke_user(&Statements::default(), "v_app")
        .await
        .unwrap();

    // THEN the guarded user drop is a no-op and the login is dropped
    assert!(!server.has_login("v_app"));
}
