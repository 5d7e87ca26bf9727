//! Ephemeral LocalDB databases.
//!
//! A [`LocalDb`] owns one database on a LocalDB instance together with its
//! `.mdf` and `_log.ldf` files. Construction attaches to the database if it
//! is already registered and creates it otherwise; [`LocalDb::dispose`] (or
//! dropping the handle) detaches it and deletes the files.
//!
//! ```rust,ignore
//! use mssql_localdb::{LocalDb, LocalDbConfig, LocalDbVersion};
//!
//! let db = LocalDb::with_config(
//!     LocalDbConfig::new()
//!         .version(LocalDbVersion::V13)
//!         .database_prefix("orders"),
//! )
//! .await?;
//!
//! let mut conn = db.open_connection().await?;
//! conn.simple_query("CREATE TABLE t (id INT)").await?;
//!
//! db.dispose().await;
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::LocalDbConfig;
use crate::connector::{Connector, PipeConnector, Session};
use crate::error::{Error, Result};
use crate::registry::{CachedRegistryProbe, VersionProbe};
use crate::settings::ConnectionSettings;
use crate::sql;
use crate::tool::SqlLocalDb;
use crate::version::LocalDbVersion;

/// Builder for [`LocalDb`].
///
/// Every external dependency can be replaced: the connector used for SQL,
/// the `sqllocaldb` client used to install instances and the probe used to
/// decide which engine versions are installed.
pub struct LocalDbBuilder<C: Connector = PipeConnector> {
    config: LocalDbConfig,
    connector: C,
    tool: SqlLocalDb,
    probe: Arc<dyn VersionProbe>,
}

impl Default for LocalDbBuilder<PipeConnector> {
    fn default() -> Self {
        let tool = SqlLocalDb::new();
        Self {
            config: LocalDbConfig::default(),
            connector: PipeConnector::new(tool.clone()),
            tool,
            probe: Arc::new(CachedRegistryProbe),
        }
    }
}

impl<C: Connector> std::fmt::Debug for LocalDbBuilder<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalDbBuilder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<C: Connector> LocalDbBuilder<C> {
    /// Set the database configuration.
    #[must_use]
    pub fn config(mut self, config: LocalDbConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a different connector.
    #[must_use]
    pub fn connector<D: Connector>(self, connector: D) -> LocalDbBuilder<D> {
        LocalDbBuilder {
            config: self.config,
            connector,
            tool: self.tool,
            probe: self.probe,
        }
    }

    /// Use a different `sqllocaldb` client for instance installation.
    #[must_use]
    pub fn tool(mut self, tool: SqlLocalDb) -> Self {
        self.tool = tool;
        self
    }

    /// Use a different installed-version probe.
    #[must_use]
    pub fn probe(mut self, probe: impl VersionProbe + 'static) -> Self {
        self.probe = Arc::new(probe);
        self
    }

    /// Provision the database.
    ///
    /// # Errors
    ///
    /// Fails if the platform has no LocalDB, the engine version is not
    /// installed, the name is invalid, the instance cannot be installed or
    /// the database cannot be created.
    pub async fn build(self) -> Result<LocalDb<C>> {
        let Self {
            config,
            connector,
            tool,
            probe,
        } = self;

        if !connector.is_supported() {
            return Err(Error::UnsupportedPlatform);
        }

        let version = config.version;
        if !probe.is_installed(version) {
            return Err(Error::VersionNotInstalled(version));
        }

        config.validate()?;
        let database_name = config.resolve_database_name()?;
        let instance = config.instance_name();

        if config.install_if_missing {
            tool.ensure_instance(&instance, version).await?;
        }

        let output_folder = config.output_folder()?;
        tokio::fs::create_dir_all(&output_folder).await?;
        let output_folder = std::path::absolute(&output_folder)?;
        let mdf_path = output_folder.join(format!("{database_name}.mdf"));
        let log_path = output_folder.join(format!("{database_name}_log.ldf"));

        let admin = ConnectionSettings::admin(&instance);
        let mut session = connector.connect(&admin).await?;
        match session.database_id(&database_name).await? {
            Some(id) => {
                tracing::debug!(database = %database_name, id, "attaching to existing database");
            }
            None => {
                tracing::info!(
                    database = %database_name,
                    instance = %instance,
                    mdf = %mdf_path.display(),
                    "creating LocalDB database"
                );
                session
                    .execute(&sql::create_database(&database_name, &mdf_path))
                    .await?;
            }
        }
        if let Err(e) = session.close().await {
            tracing::debug!(error = %e, "error closing administrative session");
        }

        let settings = ConnectionSettings::new(&instance, &database_name)
            .connect_timeout(config.connect_timeout)
            .multiple_active_result_sets(config.multiple_active_result_sets);
        let connection_string = settings.to_connection_string();

        Ok(LocalDb {
            connector: Arc::new(connector),
            database_name,
            version,
            instance,
            output_folder,
            mdf_path,
            log_path,
            settings,
            connection_string,
            cleanup_on_drop: config.cleanup_on_drop,
            disposed: AtomicBool::new(false),
        })
    }
}

/// An ephemeral database on a LocalDB instance.
pub struct LocalDb<C: Connector = PipeConnector> {
    connector: Arc<C>,
    database_name: String,
    version: LocalDbVersion,
    instance: String,
    output_folder: PathBuf,
    mdf_path: PathBuf,
    log_path: PathBuf,
    settings: ConnectionSettings,
    connection_string: String,
    cleanup_on_drop: bool,
    disposed: AtomicBool,
}

impl<C: Connector> std::fmt::Debug for LocalDb<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalDb")
            .field("database_name", &self.database_name)
            .field("version", &self.version)
            .field("instance", &self.instance)
            .field("mdf_path", &self.mdf_path)
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}

impl LocalDb<PipeConnector> {
    /// Builder with the default connector, tool and registry probe.
    #[must_use]
    pub fn builder() -> LocalDbBuilder<PipeConnector> {
        LocalDbBuilder::default()
    }

    /// Provision a database with the default configuration.
    pub async fn new() -> Result<Self> {
        Self::builder().build().await
    }

    /// Provision a database with the given configuration.
    pub async fn with_config(config: LocalDbConfig) -> Result<Self> {
        Self::builder().config(config).build().await
    }

    /// Provision a database configured from the `LOCALDB_*` environment variables.
    pub async fn from_env() -> Result<Self> {
        Self::with_config(LocalDbConfig::from_env()?).await
    }
}

impl<C: Connector> LocalDb<C> {
    /// Open a connection to the database.
    pub async fn open_connection(&self) -> Result<C::Connection> {
        if self.is_disposed() {
            return Err(Error::Disposed(self.database_name.clone()));
        }
        self.connector.connect(&self.settings).await
    }

    /// Check whether the database is registered on its instance.
    pub async fn is_attached(&self) -> Result<bool> {
        Self::is_database_attached(&*self.connector, &self.instance, &self.database_name).await
    }

    /// Check whether a database is registered on an instance.
    pub async fn is_database_attached(
        connector: &C,
        instance: &str,
        database_name: &str,
    ) -> Result<bool> {
        if !connector.is_supported() {
            return Err(Error::UnsupportedPlatform);
        }
        let mut session = connector.connect(&ConnectionSettings::admin(instance)).await?;
        let id = session.database_id(database_name).await?;
        if let Err(e) = session.close().await {
            tracing::debug!(error = %e, "error closing administrative session");
        }
        Ok(id.is_some())
    }

    /// Detach the database and delete its files.
    ///
    /// Calling this more than once has no further effect. Failures are
    /// logged and otherwise ignored.
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.teardown().run().await;
    }

    /// Whether [`dispose`](Self::dispose) has run.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn teardown(&self) -> Teardown<C> {
        Teardown {
            connector: Arc::clone(&self.connector),
            instance: self.instance.clone(),
            database_name: self.database_name.clone(),
            files: [self.mdf_path.clone(), self.log_path.clone()],
        }
    }

    /// Connection string for the database.
    #[must_use]
    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    /// Connection settings for the database.
    #[must_use]
    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    /// Database name.
    #[must_use]
    pub fn database_name(&self) -> &str {
        &self.database_name
    }

    /// Engine version.
    #[must_use]
    pub fn version(&self) -> LocalDbVersion {
        self.version
    }

    /// Instance name.
    #[must_use]
    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Folder holding the database files.
    #[must_use]
    pub fn output_folder(&self) -> &Path {
        &self.output_folder
    }

    /// Primary data file.
    #[must_use]
    pub fn mdf_path(&self) -> &Path {
        &self.mdf_path
    }

    /// Log file.
    #[must_use]
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Connect timeout in seconds, if configured.
    #[must_use]
    pub fn connect_timeout(&self) -> Option<u32> {
        self.settings.connect_timeout
    }

    /// Whether Multiple Active Result Sets is requested.
    #[must_use]
    pub fn multiple_active_result_sets(&self) -> bool {
        self.settings.multiple_active_result_sets
    }

    /// The connector used by this database.
    #[must_use]
    pub fn connector(&self) -> &C {
        &self.connector
    }
}

impl<C: Connector> Drop for LocalDb<C> {
    fn drop(&mut self) {
        if !self.cleanup_on_drop || self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        // Drop cannot await, and may run inside or outside a runtime.
        let teardown = self.teardown();
        let handle = std::thread::Builder::new()
            .name("localdb-cleanup".into())
            .spawn(move || {
                match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt.block_on(teardown.run()),
                    Err(e) => {
                        tracing::warn!(
                            database = %teardown.database_name,
                            error = %e,
                            "cannot start cleanup runtime"
                        );
                    }
                }
            });

        match handle {
            Ok(handle) => {
                if handle.join().is_err() {
                    tracing::warn!(database = %self.database_name, "cleanup thread panicked");
                }
            }
            Err(e) => {
                tracing::warn!(
                    database = %self.database_name,
                    error = %e,
                    "cannot spawn cleanup thread"
                );
            }
        }
    }
}

struct Teardown<C: Connector> {
    connector: Arc<C>,
    instance: String,
    database_name: String,
    files: [PathBuf; 2],
}

impl<C: Connector> Teardown<C> {
    async fn run(&self) {
        match self.detach().await {
            Ok(true) => tracing::info!(database = %self.database_name, "detached LocalDB database"),
            Ok(false) => tracing::debug!(database = %self.database_name, "database was not attached"),
            Err(e) => tracing::warn!(
                database = %self.database_name,
                error = %e,
                "failed to detach LocalDB database"
            ),
        }

        for path in &self.files {
            match tokio::fs::remove_file(path).await {
                Ok(()) => tracing::debug!(path = %path.display(), "deleted database file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to delete database file"
                ),
            }
        }
    }

    async fn detach(&self) -> Result<bool> {
        let mut session = self
            .connector
            .connect(&ConnectionSettings::admin(&self.instance))
            .await?;

        let attached = session.database_id(&self.database_name).await?.is_some();
        if attached {
            session
                .execute(&sql::detach_database(&self.database_name))
                .await?;
        }
        if let Err(e) = session.close().await {
            tracing::debug!(error = %e, "error closing administrative session");
        }
        Ok(attached)
    }
}

/// Check whether a database is registered on the default instance of `version`.
pub async fn is_attached(database_name: &str, version: LocalDbVersion) -> Result<bool> {
    LocalDb::is_database_attached(&PipeConnector::default(), version.as_str(), database_name).await
}
