//! Live LocalDB integration tests.
//!
//! These tests need Windows with SQL Server Express LocalDB installed. They
//! are ignored by default and can be run with:
//!
//! ```bash
//! # Optional: pick the engine version (defaults to v11.0)
//! set LOCALDB_VERSION=v15.0
//! set LOCALDB_INSTALL=true
//!
//! cargo test -p mssql-localdb --test integration -- --ignored
//! ```

#![cfg(windows)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use mssql_localdb::{LocalDb, LocalDbConfig, installed_versions, is_attached};

fn test_config(dir: &tempfile::TempDir) -> LocalDbConfig {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    LocalDbConfig::from_env()
        .expect("valid LOCALDB_* variables")
        .location(dir.path())
        .database_prefix("it")
}

#[tokio::test]
#[ignore = "Requires SQL Server LocalDB"]
async fn test_create_query_dispose() {
    let dir = tempfile::tempdir().unwrap();
    let db = LocalDb::with_config(test_config(&dir)).await.unwrap();

    assert!(db.mdf_path().exists());
    assert!(db.is_attached().await.unwrap());
    if db.instance() == db.version().as_str() {
        assert!(is_attached(db.database_name(), db.version()).await.unwrap());
    }

    let mut conn = db.open_connection().await.unwrap();
    let row = conn
        .simple_query("SELECT DB_NAME()")
        .await
        .unwrap()
        .into_row()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.get::<&str, _>(0), Some(db.database_name()));
    drop(conn);

    db.dispose().await;
    assert!(!db.mdf_path().exists());
    assert!(!db.log_path().exists());
}

#[tokio::test]
#[ignore = "Requires SQL Server LocalDB"]
async fn test_reattach_existing_database() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir).database_name(format!("it_reuse_{}", std::process::id()));

    let first = LocalDb::with_config(config.clone().cleanup_on_drop(false))
        .await
        .unwrap();
    let second = LocalDb::with_config(config).await.unwrap();

    assert_eq!(first.database_name(), second.database_name());
    second.dispose().await;
    first.dispose().await;
}

#[test]
#[ignore = "Requires SQL Server LocalDB"]
fn test_registry_reports_versions() {
    assert!(!installed_versions().is_empty());
}
