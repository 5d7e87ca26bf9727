//! LocalDB error types.

use std::time::Duration;

use thiserror::Error;

use crate::version::LocalDbVersion;

/// Errors that can occur while provisioning or using a LocalDB database.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// LocalDB only exists on Windows.
    #[error("LocalDB only works on the Windows platform")]
    UnsupportedPlatform,

    /// The version string does not name a known LocalDB engine.
    #[error("unsupported LocalDB version: {0}")]
    UnsupportedVersion(String),

    /// The engine version is known but not installed on this machine.
    #[error("LocalDB version {0} is not installed")]
    VersionNotInstalled(LocalDbVersion),

    /// `sqllocaldb create` ran but did not report the instance as started.
    #[error("could not start LocalDB instance {instance} with version {version}")]
    InstanceStartFailed {
        /// Instance name.
        instance: String,
        /// Engine version requested for the instance.
        version: LocalDbVersion,
    },

    /// `sqllocaldb` wrote to standard error.
    #[error("sqllocaldb failed: {0}")]
    Tool(String),

    /// Database name cannot be used as an identifier or file name.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Configuration or connection string error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Connection to the instance could not be established.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Connection was not established within the connect timeout.
    #[error("connection timed out after {0:?}")]
    ConnectionTimeout(Duration),

    /// Error reported by the SQL Server client or the server itself.
    #[error("server error: {0}")]
    Server(#[from] tiberius::error::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The database has already been disposed.
    #[error("database {0} has been disposed")]
    Disposed(String),
}

impl Error {
    /// Check if this error was caused by running on a platform without LocalDB.
    #[must_use]
    pub fn is_unsupported_platform(&self) -> bool {
        matches!(self, Self::UnsupportedPlatform)
    }

    /// Check if this error means the requested engine or instance is unavailable.
    #[must_use]
    pub fn is_not_installed(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedVersion(_)
                | Self::VersionNotInstalled(_)
                | Self::InstanceStartFailed { .. }
        )
    }
}

/// Result type for LocalDB operations.
pub type Result<T> = std::result::Result<T, Error>;
