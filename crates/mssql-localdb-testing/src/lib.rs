//! # mssql-localdb-testing
//!
//! Test infrastructure for `mssql-localdb`.
//!
//! Lets the full database lifecycle run on any platform, without LocalDB
//! installed.
//!
//! ## Features
//!
//! - In-memory engine implementing the `Connector` seam
//! - Scripted `sqllocaldb` runner with call recording
//! - Fixed installed-version probe
//! - Scratch folders and tracing setup for tests
//!
//! ## Example
//!
//! ```rust,ignore
//! use mssql_localdb::{LocalDb, LocalDbConfig};
//! use mssql_localdb_testing::{MockEngine, MockTool, StaticProbe, fixtures};
//!
//! #[tokio::test]
//! async fn test_lifecycle() {
//!     let dir = fixtures::scratch_dir().unwrap();
//!     let engine = MockEngine::new();
//!
//!     let db = LocalDb::builder()
//!         .connector(engine.clone())
//!         .tool(MockTool::new().client())
//!         .probe(StaticProbe::all())
//!         .config(LocalDbConfig::new().location(dir.path()))
//!         .build()
//!         .await
//!         .unwrap();
//!
//!     assert!(db.mdf_path().exists());
//!     db.dispose().await;
//!     assert!(!engine.is_attached(db.database_name()));
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod fixtures;
pub mod mock_engine;
pub mod mock_tool;

pub use fixtures::StaticProbe;
pub use mock_engine::{MockEngine, MockSession, RecordedStatement};
pub use mock_tool::MockTool;
