//! Init, verification and error sanitizing at the plugin boundary.

use pretty_assertions::assert_eq;
use serde_json::{Value, json};

use sybase_dbplugin::testing::FakeServer;
use sybase_dbplugin::{
    Database, DatabaseError, ErrorKind, ErrorSanitizerMiddleware, RawConfig, SybaseDatabase,
};

fn object(value: Value) -> RawConfig {
    match value {
        Value::Object(map) => map,
        _ => unreachable!("config must be an object"),
    }
}

#[tokio::test]
async fn init_returns_config_verbatim() {
    let server = FakeServer::new();
    let database = SybaseDatabase::new(server.connector());
    let mut raw = server.raw_config();
    raw.insert("max_open_connections".into(), Value::from("5"));
    raw.insert("plugin_name".into(), Value::from("sybase"));

    let returned = database.init(raw.clone(), true).await.unwrap();

    assert_eq!(returned, raw);
    assert!(database.is_initialized().await);
    assert_eq!(server.connection_count(), 1);
}

#[tokio::test]
async fn init_without_verify_does_not_connect() {
    let server = FakeServer::new();
    server.set_down(true);
    let database = SybaseDatabase::new(server.connector());

    database.init(server.raw_config(), false).await.unwrap();

    assert_eq!(server.connection_count(), 0);
}

#[tokio::test]
async fn init_rejects_missing_connection_url() {
    let server = FakeServer::new();
    let database = SybaseDatabase::new(server.connector());

    let err = database
        .init(object(json!({ "username": "sa", "password": "x" })), false)
        .await
        .unwrap_err();

    assert!(matches!(err, DatabaseError::InvalidConfig { .. }));
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[tokio::test]
async fn init_rejects_non_numeric_max_open_connections() {
    let server = FakeServer::new();
    let database = SybaseDatabase::new(server.connector());
    let mut raw = server.raw_config();
    raw.insert("max_open_connections".into(), Value::from("many"));

    let err = database.init(raw, false).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[tokio::test]
async fn verify_failure_is_a_connection_error() {
    let server = FakeServer::new();
    server.set_down(true);
    let database = SybaseDatabase::new(server.connector());

    let err = database.init(server.raw_config(), true).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Connection);
    assert!(err.is_retryable());
    assert!(err.to_string().contains("error verifying connection"));
    assert!(!database.is_initialized().await);
}

#[tokio::test]
async fn sanitized_plugin_never_leaks_the_root_password() {
    // GIVEN a server that has moved the root password
    let server = FakeServer::new();
    let database = ErrorSanitizerMiddleware::new(SybaseDatabase::new(server.connector()));
    database.init(server.raw_config(), false).await.unwrap();
    server.add_login("sa", "changed-elsewhere", "master");

    // WHEN an operation needs a connection
    let err = database.rotate_root_credentials(&[]).await.unwrap_err();

    // THEN the driver message is scrubbed but still classified
    let message = err.to_string();
    assert!(!message.contains("Sybase123"), "{message}");
    assert!(message.contains("[password]"), "{message}");
    assert_eq!(err.kind(), ErrorKind::Connection);
    assert_eq!(
        database.secret_values().await.get("Sybase123").map(String::as_str),
        Some("[password]")
    );
}
