//! # mssql-localdb
//!
//! Ephemeral SQL Server LocalDB databases for test suites.
//!
//! Each [`LocalDb`] creates (or attaches to) one database on a LocalDB
//! instance, hands out connections to it, and detaches it and deletes its
//! `.mdf`/`_log.ldf` files when disposed or dropped.
//!
//! ## Features
//!
//! - Installed engine versions detected from the Windows registry
//! - Optional instance creation through `sqllocaldb.exe`
//! - Generated, collision-free database names with a configurable prefix
//! - Connections over the instance's named pipe with integrated security
//! - Best-effort cleanup that never fails the caller
//!
//! ## Example
//!
//! ```rust,ignore
//! use mssql_localdb::{LocalDb, LocalDbConfig, LocalDbVersion};
//!
//! let config = LocalDbConfig::new()
//!     .version(LocalDbVersion::V13)
//!     .connect_timeout(30)
//!     .install_if_missing(true);
//!
//! let db = LocalDb::with_config(config).await?;
//! println!("{}", db.connection_string());
//!
//! let mut conn = db.open_connection().await?;
//! conn.simple_query("SELECT 1").await?;
//!
//! db.dispose().await;
//! ```
//!
//! LocalDB only exists on Windows. Elsewhere, construction fails with
//! [`Error::UnsupportedPlatform`].

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod connector;
pub mod error;
pub mod localdb;
pub mod registry;
pub mod settings;
pub mod sql;
pub mod tool;
pub mod version;

pub use config::LocalDbConfig;
pub use connector::{Connection, Connector, PipeConnector, Session};
pub use error::{Error, Result};
pub use localdb::{LocalDb, LocalDbBuilder, is_attached};
pub use registry::{RegistryProbe, VersionProbe, installed_versions};
pub use settings::ConnectionSettings;
pub use tool::{InstanceInfo, SqlLocalDb, ToolOutput, ToolRunner};
pub use version::LocalDbVersion;
