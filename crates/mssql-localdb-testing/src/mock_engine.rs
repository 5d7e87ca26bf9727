//! In-memory LocalDB engine.
//!
//! [`MockEngine`] implements [`Connector`] without a server. It keeps a
//! catalog of attached databases, understands the `CREATE DATABASE` and
//! detach statements issued by [`LocalDb`](mssql_localdb::LocalDb), and
//! creates the `.mdf`/`_log.ldf` files on disk the way the engine would.
//!
//! ```rust,ignore
//! use mssql_localdb::{LocalDb, LocalDbConfig};
//! use mssql_localdb_testing::{MockEngine, StaticProbe};
//!
//! let engine = MockEngine::new();
//! let db = LocalDb::builder()
//!     .connector(engine.clone())
//!     .probe(StaticProbe::all())
//!     .config(LocalDbConfig::new().location(dir.path()))
//!     .build()
//!     .await?;
//!
//! assert!(engine.is_attached(db.database_name()));
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use mssql_localdb::settings::ADMIN_CATALOG;
use mssql_localdb::{ConnectionSettings, Connector, Error, Result, Session};
use parking_lot::Mutex;

/// A statement received by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedStatement {
    /// Instance the session was connected to.
    pub instance: String,
    /// Catalog the session was connected to.
    pub database: String,
    /// Statement text.
    pub sql: String,
}

#[derive(Debug, Clone)]
struct AttachedDatabase {
    name: String,
    mdf: Option<PathBuf>,
}

#[derive(Debug, Default)]
struct EngineState {
    // Keyed by lowercase name; catalog names are case-insensitive.
    databases: BTreeMap<String, AttachedDatabase>,
    statements: Vec<RecordedStatement>,
    connections: Vec<ConnectionSettings>,
    fail_connect: bool,
    fail_create: bool,
    fail_detach: bool,
}

/// In-memory stand-in for a LocalDB engine.
///
/// Clones share the same catalog.
#[derive(Debug, Clone)]
pub struct MockEngine {
    state: Arc<Mutex<EngineState>>,
    supported: bool,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    /// Create an engine with an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(EngineState::default())),
            supported: true,
        }
    }

    /// Create an engine that reports the platform as unsupported.
    #[must_use]
    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::new()
        }
    }

    /// Register a database as already attached, without files.
    #[must_use]
    pub fn with_database(self, name: impl Into<String>) -> Self {
        self.attach(name, None);
        self
    }

    /// Make every connection attempt fail.
    pub fn fail_connections(&self, fail: bool) {
        self.state.lock().fail_connect = fail;
    }

    /// Make `CREATE DATABASE` fail.
    pub fn fail_create(&self, fail: bool) {
        self.state.lock().fail_create = fail;
    }

    /// Make detaching fail.
    pub fn fail_detach(&self, fail: bool) {
        self.state.lock().fail_detach = fail;
    }

    /// Attach a database directly, bypassing SQL.
    pub fn attach(&self, name: impl Into<String>, mdf: Option<PathBuf>) {
        let name = name.into();
        self.state
            .lock()
            .databases
            .insert(name.to_lowercase(), AttachedDatabase { name, mdf });
    }

    /// Detach a database directly, bypassing SQL. Returns whether it was attached.
    pub fn detach(&self, name: &str) -> bool {
        self.state
            .lock()
            .databases
            .remove(&name.to_lowercase())
            .is_some()
    }

    /// Check whether a database is attached.
    #[must_use]
    pub fn is_attached(&self, name: &str) -> bool {
        self.state
            .lock()
            .databases
            .contains_key(&name.to_lowercase())
    }

    /// Names of all attached databases.
    #[must_use]
    pub fn databases(&self) -> Vec<String> {
        self.state
            .lock()
            .databases
            .values()
            .map(|db| db.name.clone())
            .collect()
    }

    /// Data file of an attached database, if it was created through SQL.
    #[must_use]
    pub fn mdf_path(&self, name: &str) -> Option<PathBuf> {
        self.state
            .lock()
            .databases
            .get(&name.to_lowercase())
            .and_then(|db| db.mdf.clone())
    }

    /// Every statement executed so far.
    #[must_use]
    pub fn statements(&self) -> Vec<RecordedStatement> {
        self.state.lock().statements.clone()
    }

    /// Number of executed statements starting with `prefix` (case-insensitive).
    #[must_use]
    pub fn count_statements(&self, prefix: &str) -> usize {
        let prefix = prefix.to_lowercase();
        self.state
            .lock()
            .statements
            .iter()
            .filter(|s| s.sql.to_lowercase().starts_with(&prefix))
            .count()
    }

    /// Settings of every successful connection, in order.
    #[must_use]
    pub fn connections(&self) -> Vec<ConnectionSettings> {
        self.state.lock().connections.clone()
    }

    fn database_id(&self, name: &str) -> Option<i32> {
        let state = self.state.lock();
        state
            .databases
            .keys()
            .position(|key| *key == name.to_lowercase())
            .and_then(|pos| i32::try_from(pos).ok())
            // User databases start after the four system databases.
            .map(|pos| pos + 5)
    }

    fn run(&self, statement: RecordedStatement) -> Result<()> {
        tracing::trace!(database = %statement.database, sql = %statement.sql, "mock statement");
        let sql = statement.sql.clone();
        let (fail_create, fail_detach) = {
            let mut state = self.state.lock();
            state.statements.push(statement);
            (state.fail_create, state.fail_detach)
        };

        if let Some(rest) = strip_prefix_ci(&sql, "CREATE DATABASE ") {
            if fail_create {
                return Err(Error::Connection("simulated CREATE DATABASE failure".into()));
            }
            let (name, rest) = parse_identifier(rest)?;
            let mdf = rest
                .find("FILENAME = N'")
                .map(|i| &rest[i + "FILENAME = N'".len()..])
                .map(parse_literal)
                .transpose()?
                .map(|(path, _)| PathBuf::from(path))
                .ok_or_else(|| Error::Connection("CREATE DATABASE without FILENAME".into()))?;

            if self.is_attached(&name) {
                return Err(Error::Connection(format!("database '{name}' already exists")));
            }
            create_files(&name, &mdf)?;
            self.attach(name, Some(mdf));
        } else if let Some(rest) = strip_prefix_ci(&sql, "ALTER DATABASE ") {
            if fail_detach {
                return Err(Error::Connection("simulated detach failure".into()));
            }
            let (name, rest) = parse_identifier(rest)?;
            if !self.is_attached(&name) {
                return Err(Error::Connection(format!("database '{name}' does not exist")));
            }
            if rest.contains("sp_detach_db") {
                self.detach(&name);
            }
        }

        Ok(())
    }
}

#[async_trait]
impl Connector for MockEngine {
    type Connection = MockSession;

    fn is_supported(&self) -> bool {
        self.supported
    }

    async fn connect(&self, settings: &ConnectionSettings) -> Result<MockSession> {
        if !self.supported {
            return Err(Error::UnsupportedPlatform);
        }
        if self.state.lock().fail_connect {
            return Err(Error::Connection("simulated connection failure".into()));
        }
        if !settings.database.eq_ignore_ascii_case(ADMIN_CATALOG)
            && !self.is_attached(&settings.database)
        {
            return Err(Error::Connection(format!(
                "cannot open database \"{}\" requested by the login",
                settings.database
            )));
        }

        self.state.lock().connections.push(settings.clone());
        Ok(MockSession {
            engine: self.clone(),
            instance: settings.instance.clone(),
            database: settings.database.clone(),
        })
    }
}

/// A session opened by [`MockEngine`].
#[derive(Debug)]
pub struct MockSession {
    engine: MockEngine,
    instance: String,
    database: String,
}

impl MockSession {
    /// Catalog this session was opened against.
    #[must_use]
    pub fn database(&self) -> &str {
        &self.database
    }
}

#[async_trait]
impl Session for MockSession {
    async fn execute(&mut self, sql: &str) -> Result<()> {
        self.engine.run(RecordedStatement {
            instance: self.instance.clone(),
            database: self.database.clone(),
            sql: sql.to_string(),
        })
    }

    async fn database_id(&mut self, name: &str) -> Result<Option<i32>> {
        Ok(self.engine.database_id(name))
    }

    async fn close(self) -> Result<()> {
        Ok(())
    }
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &s[prefix.len()..])
}

/// Parse `[name]` with `]]` escapes; returns the name and the remaining text.
fn parse_identifier(s: &str) -> Result<(String, &str)> {
    parse_quoted(s.strip_prefix('[').ok_or_else(|| malformed(s))?, ']')
}

/// Parse the body of `N'...'` with `''` escapes, starting after the opening quote.
fn parse_literal(s: &str) -> Result<(String, &str)> {
    parse_quoted(s, '\'')
}

fn parse_quoted(s: &str, close: char) -> Result<(String, &str)> {
    let mut out = String::new();
    let mut chars = s.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c == close {
            if chars.peek().is_some_and(|&(_, next)| next == close) {
                chars.next();
                out.push(close);
            } else {
                return Ok((out, &s[i + c.len_utf8()..]));
            }
        } else {
            out.push(c);
        }
    }
    Err(malformed(s))
}

fn malformed(s: &str) -> Error {
    Error::Connection(format!("incorrect syntax near '{s}'"))
}

fn create_files(name: &str, mdf: &Path) -> Result<()> {
    std::fs::write(mdf, b"")?;
    let ldf = mdf.with_file_name(format!("{name}_log.ldf"));
    std::fs::write(ldf, b"")?;
    Ok(())
}
