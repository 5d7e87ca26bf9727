//! Behaviour on platforms without LocalDB.

#![cfg(not(windows))]
#![allow(clippy::unwrap_used)]

use mssql_localdb::{LocalDb, LocalDbConfig, LocalDbVersion, installed_versions, is_attached};

#[tokio::test]
async fn test_default_construction_unsupported() {
    let err = LocalDb::with_config(LocalDbConfig::new().version(LocalDbVersion::V13))
        .await
        .unwrap_err();
    assert!(err.is_unsupported_platform());
    assert_eq!(err.to_string(), "LocalDB only works on the Windows platform");
}

#[tokio::test]
async fn test_static_check_unsupported() {
    let err = is_attached("db", LocalDbVersion::V11).await.unwrap_err();
    assert!(err.is_unsupported_platform());
}

#[test]
fn test_nothing_installed() {
    assert!(installed_versions().is_empty());
}
