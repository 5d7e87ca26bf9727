//! Native client connections to a LocalDB instance.
//!
//! LocalDB only listens on a per-instance named pipe whose name changes every
//! time the instance starts. [`PipeConnector`] asks `sqllocaldb` for the
//! current pipe, starts the instance if needed, opens the pipe and performs a
//! TDS login with integrated security.

use std::ops::{Deref, DerefMut};
use std::time::Duration;

use async_trait::async_trait;
use tiberius::Client;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::compat::Compat;

use crate::error::{Error, Result};
use crate::settings::ConnectionSettings;
use crate::sql::DATABASE_ID_QUERY;
use crate::tool::SqlLocalDb;

/// Application name reported to the server at login.
pub const DEFAULT_APPLICATION_NAME: &str = "mssql-localdb";

/// Delay between attempts to open a busy pipe.
pub const PIPE_BUSY_RETRY: Duration = Duration::from_millis(50);

/// Byte stream a LocalDB connection runs over.
pub trait PipeStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> PipeStream for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

/// Transport type of [`Connection`].
pub type Transport = Compat<Box<dyn PipeStream>>;

/// An open session against one catalog.
#[async_trait]
pub trait Session: Send + Sized {
    /// Execute a batch, discarding any results.
    async fn execute(&mut self, sql: &str) -> Result<()>;

    /// Look up the id of a database, `None` if it is not attached.
    async fn database_id(&mut self, name: &str) -> Result<Option<i32>>;

    /// Close the session.
    async fn close(self) -> Result<()>;
}

/// Opens sessions against a LocalDB instance.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Session type produced by this connector.
    type Connection: Session;

    /// Whether this connector can work on the current platform.
    fn is_supported(&self) -> bool;

    /// Open a session using the given settings.
    async fn connect(&self, settings: &ConnectionSettings) -> Result<Self::Connection>;
}

/// Connects over the instance's named pipe with integrated security.
#[derive(Debug, Clone)]
pub struct PipeConnector {
    tool: SqlLocalDb,
    application_name: String,
}

impl Default for PipeConnector {
    fn default() -> Self {
        Self::new(SqlLocalDb::new())
    }
}

impl PipeConnector {
    /// Create a connector that discovers pipes through the given tool.
    #[must_use]
    pub fn new(tool: SqlLocalDb) -> Self {
        Self {
            tool,
            application_name: DEFAULT_APPLICATION_NAME.to_string(),
        }
    }

    /// Set the application name reported at login.
    #[must_use]
    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = name.into();
        self
    }

    /// Application name reported at login.
    #[must_use]
    pub fn app_name(&self) -> &str {
        &self.application_name
    }

    /// The `sqllocaldb` client used for pipe discovery.
    #[must_use]
    pub fn tool(&self) -> &SqlLocalDb {
        &self.tool
    }

    #[cfg(windows)]
    async fn open_pipe(&self, instance: &str) -> Result<Box<dyn PipeStream>> {
        use tokio::net::windows::named_pipe::ClientOptions;

        const ERROR_PIPE_BUSY: i32 = 231;

        let mut info = self.tool.instance_info(instance).await?;
        if !info.is_running() {
            tracing::debug!(instance, state = ?info.state, "starting LocalDB instance");
            self.tool.start(instance).await?;
            info = self.tool.instance_info(instance).await?;
        }

        let pipe = info.pipe_name.ok_or_else(|| {
            Error::Connection(format!("LocalDB instance {instance} reported no pipe name"))
        })?;
        tracing::debug!(instance, pipe = %pipe, "opening LocalDB pipe");

        loop {
            match ClientOptions::new().open(&pipe) {
                Ok(client) => return Ok(Box::new(client)),
                Err(e) if e.raw_os_error() == Some(ERROR_PIPE_BUSY) => {}
                Err(e) => return Err(e.into()),
            }
            tokio::time::sleep(PIPE_BUSY_RETRY).await;
        }
    }

    #[cfg(windows)]
    async fn establish(&self, settings: &ConnectionSettings) -> Result<Connection> {
        use tiberius::{AuthMethod, EncryptionLevel};
        use tokio_util::compat::TokioAsyncWriteCompatExt;

        let stream = self.open_pipe(&settings.instance).await?;

        let mut config = tiberius::Config::new();
        config.database(&settings.database);
        config.application_name(&self.application_name);
        config.authentication(AuthMethod::Integrated);
        config.encryption(EncryptionLevel::NotSupported);

        let client = Client::connect(config, stream.compat_write()).await?;
        Ok(Connection {
            client,
            database: settings.database.clone(),
        })
    }
}

#[async_trait]
impl Connector for PipeConnector {
    type Connection = Connection;

    fn is_supported(&self) -> bool {
        cfg!(windows)
    }

    #[cfg(windows)]
    async fn connect(&self, settings: &ConnectionSettings) -> Result<Connection> {
        if !settings.integrated_security {
            return Err(Error::Config(
                "LocalDB connections require integrated security".into(),
            ));
        }
        if settings.multiple_active_result_sets {
            tracing::debug!("MultipleActiveResultSets is not supported by the native client; ignoring");
        }

        tracing::debug!(
            instance = %settings.instance,
            database = %settings.database,
            "connecting to LocalDB"
        );

        // ADO.NET treats a zero timeout as "wait forever".
        let timeout = settings.effective_connect_timeout();
        if timeout.is_zero() {
            return self.establish(settings).await;
        }
        tokio::time::timeout(timeout, self.establish(settings))
            .await
            .map_err(|_| Error::ConnectionTimeout(timeout))?
    }

    #[cfg(not(windows))]
    async fn connect(&self, _settings: &ConnectionSettings) -> Result<Connection> {
        Err(Error::UnsupportedPlatform)
    }
}

/// An open connection to a LocalDB database.
///
/// Dereferences to [`tiberius::Client`] for running arbitrary queries.
pub struct Connection {
    client: Client<Transport>,
    database: String,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("database", &self.database)
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Catalog this connection was opened against.
    #[must_use]
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Unwrap the underlying client.
    #[must_use]
    pub fn into_inner(self) -> Client<Transport> {
        self.client
    }
}

impl Deref for Connection {
    type Target = Client<Transport>;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

impl DerefMut for Connection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.client
    }
}

#[async_trait]
impl Session for Connection {
    async fn execute(&mut self, sql: &str) -> Result<()> {
        tracing::debug!(database = %self.database, sql, "executing");
        self.client.simple_query(sql).await?.into_results().await?;
        Ok(())
    }

    async fn database_id(&mut self, name: &str) -> Result<Option<i32>> {
        let row = self
            .client
            .query(DATABASE_ID_QUERY, &[&name])
            .await?
            .into_row()
            .await?;
        match row {
            Some(row) => Ok(row.try_get::<i32, _>(0)?),
            None => Ok(None),
        }
    }

    async fn close(self) -> Result<()> {
        self.client.close().await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_application_name() {
        let connector = PipeConnector::default();
        assert_eq!(connector.app_name(), DEFAULT_APPLICATION_NAME);

        let connector = connector.application_name("orders-tests");
        assert_eq!(connector.app_name(), "orders-tests");
    }

    #[test]
    fn test_supported_only_on_windows() {
        assert_eq!(PipeConnector::default().is_supported(), cfg!(windows));
    }

    #[cfg(not(windows))]
    #[tokio::test]
    async fn test_connect_off_windows() {
        let err = PipeConnector::default()
            .connect(&ConnectionSettings::admin("v11.0"))
            .await
            .unwrap_err();
        assert!(err.is_unsupported_platform());
    }
}
