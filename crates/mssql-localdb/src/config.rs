//! LocalDB database configuration.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::sql::{CONNECTION_STRING_SEPARATOR, validate_database_name};
use crate::version::LocalDbVersion;

/// Default prefix for generated database names.
pub const DEFAULT_DATABASE_PREFIX: &str = "localdb";

/// Environment variable overriding the database name.
pub const ENV_DATABASE: &str = "LOCALDB_DATABASE";
/// Environment variable overriding the engine version.
pub const ENV_VERSION: &str = "LOCALDB_VERSION";
/// Environment variable overriding the instance name.
pub const ENV_INSTANCE: &str = "LOCALDB_INSTANCE";
/// Environment variable overriding the output folder.
pub const ENV_LOCATION: &str = "LOCALDB_LOCATION";
/// Environment variable overriding the generated name prefix.
pub const ENV_PREFIX: &str = "LOCALDB_PREFIX";
/// Environment variable overriding the connect timeout (seconds).
pub const ENV_CONNECT_TIMEOUT: &str = "LOCALDB_CONNECT_TIMEOUT";
/// Environment variable enabling Multiple Active Result Sets.
pub const ENV_MARS: &str = "LOCALDB_MARS";
/// Environment variable enabling instance creation.
pub const ENV_INSTALL: &str = "LOCALDB_INSTALL";

/// Produces the unique part of a generated database name.
pub type SuffixGenerator = Arc<dyn Fn() -> String + Send + Sync>;

/// Default suffix: 32 lowercase hex characters of a random UUID.
#[must_use]
pub fn random_suffix() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Configuration for one ephemeral LocalDB database.
///
/// This struct is marked `#[non_exhaustive]`; use [`LocalDbConfig::new`]
/// and the builder methods, or [`LocalDbConfig::from_env`].
#[derive(Clone)]
#[non_exhaustive]
pub struct LocalDbConfig {
    /// Database name. `None` or a blank name means one is generated.
    pub database_name: Option<String>,

    /// Engine version.
    pub version: LocalDbVersion,

    /// Instance name. Defaults to the version string, e.g. `v11.0`.
    pub instance: Option<String>,

    /// Folder for the `.mdf` and `_log.ldf` files.
    ///
    /// Defaults to the directory of the running executable.
    pub location: Option<PathBuf>,

    /// Prefix for generated database names.
    pub database_prefix: String,

    /// Suffix for generated database names.
    pub suffix_generator: SuffixGenerator,

    /// Connect timeout in seconds written to the connection string.
    pub connect_timeout: Option<u32>,

    /// Whether `MultipleActiveResultSets=true` is written to the connection string.
    pub multiple_active_result_sets: bool,

    /// Create and start the instance through `sqllocaldb` if it does not exist.
    pub install_if_missing: bool,

    /// Detach the database and delete its files when the handle is dropped
    /// without being disposed.
    ///
    /// `Drop` cannot await, so the cleanup runs on a helper thread and the
    /// dropping thread blocks until it finishes. With the default connector
    /// that can take up to the connect timeout plus the `sqllocaldb` calls,
    /// and inside a Tokio runtime it stalls a worker thread for that long.
    /// Call [`LocalDb::dispose`](crate::LocalDb::dispose) in async code.
    pub cleanup_on_drop: bool,
}

impl fmt::Debug for LocalDbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalDbConfig")
            .field("database_name", &self.database_name)
            .field("version", &self.version)
            .field("instance", &self.instance)
            .field("location", &self.location)
            .field("database_prefix", &self.database_prefix)
            .field("connect_timeout", &self.connect_timeout)
            .field("multiple_active_result_sets", &self.multiple_active_result_sets)
            .field("install_if_missing", &self.install_if_missing)
            .field("cleanup_on_drop", &self.cleanup_on_drop)
            .finish_non_exhaustive()
    }
}

impl Default for LocalDbConfig {
    fn default() -> Self {
        Self {
            database_name: None,
            version: LocalDbVersion::default(),
            instance: None,
            location: None,
            database_prefix: DEFAULT_DATABASE_PREFIX.to_string(),
            suffix_generator: Arc::new(random_suffix),
            connect_timeout: None,
            multiple_active_result_sets: false,
            install_if_missing: false,
            cleanup_on_drop: true,
        }
    }
}

impl LocalDbConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration from the `LOCALDB_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(name) = lookup(ENV_DATABASE) {
            config.database_name = Some(name);
        }
        if let Some(version) = lookup(ENV_VERSION) {
            config.version = version.parse()?;
        }
        if let Some(instance) = lookup(ENV_INSTANCE) {
            config.instance = Some(instance);
        }
        if let Some(location) = lookup(ENV_LOCATION) {
            config.location = Some(PathBuf::from(location));
        }
        if let Some(prefix) = lookup(ENV_PREFIX) {
            config.database_prefix = prefix;
        }
        if let Some(timeout) = lookup(ENV_CONNECT_TIMEOUT) {
            let secs = timeout.trim().parse().map_err(|_| {
                Error::Config(format!("{ENV_CONNECT_TIMEOUT} must be a number: {timeout}"))
            })?;
            config.connect_timeout = Some(secs);
        }
        if let Some(mars) = lookup(ENV_MARS) {
            config.multiple_active_result_sets = parse_flag(ENV_MARS, &mars)?;
        }
        if let Some(install) = lookup(ENV_INSTALL) {
            config.install_if_missing = parse_flag(ENV_INSTALL, &install)?;
        }

        Ok(config)
    }

    /// Use a fixed database name instead of a generated one.
    #[must_use]
    pub fn database_name(mut self, name: impl Into<String>) -> Self {
        self.database_name = Some(name.into());
        self
    }

    /// Set the engine version.
    #[must_use]
    pub fn version(mut self, version: LocalDbVersion) -> Self {
        self.version = version;
        self
    }

    /// Set the instance name.
    #[must_use]
    pub fn instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    /// Set the folder for the database files.
    #[must_use]
    pub fn location(mut self, location: impl Into<PathBuf>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Set the prefix for generated database names.
    #[must_use]
    pub fn database_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.database_prefix = prefix.into();
        self
    }

    /// Set the suffix generator for generated database names.
    #[must_use]
    pub fn suffix_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.suffix_generator = Arc::new(generator);
        self
    }

    /// Set the connect timeout in seconds.
    #[must_use]
    pub fn connect_timeout(mut self, seconds: u32) -> Self {
        self.connect_timeout = Some(seconds);
        self
    }

    /// Enable or disable Multiple Active Result Sets.
    #[must_use]
    pub fn multiple_active_result_sets(mut self, enabled: bool) -> Self {
        self.multiple_active_result_sets = enabled;
        self
    }

    /// Create the instance if it does not exist.
    #[must_use]
    pub fn install_if_missing(mut self, enabled: bool) -> Self {
        self.install_if_missing = enabled;
        self
    }

    /// Enable or disable cleanup when the handle is dropped.
    #[must_use]
    pub fn cleanup_on_drop(mut self, enabled: bool) -> Self {
        self.cleanup_on_drop = enabled;
        self
    }

    /// Supplied database name, if it is not blank.
    fn explicit_name(&self) -> Option<&str> {
        self.database_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        match self.explicit_name() {
            Some(name) => validate_database_name(name)?,
            None if self.database_prefix.is_empty() => {
                return Err(Error::Config(
                    "database_prefix cannot be empty when the name is generated".into(),
                ));
            }
            None => {}
        }

        if self.instance.as_deref().is_some_and(|i| i.trim().is_empty()) {
            return Err(Error::Config("instance name cannot be blank".into()));
        }
        if let Some(instance) = self
            .instance
            .as_deref()
            .filter(|i| i.contains(CONNECTION_STRING_SEPARATOR))
        {
            return Err(Error::Config(format!(
                "instance name {instance:?} cannot contain {CONNECTION_STRING_SEPARATOR:?}"
            )));
        }

        Ok(())
    }

    /// Resolve the database name, generating `<prefix>_<suffix>` if needed.
    ///
    /// Each call to a generated configuration invokes the suffix generator again.
    pub fn resolve_database_name(&self) -> Result<String> {
        let name = match self.explicit_name() {
            Some(name) => name.to_string(),
            None => format!("{}_{}", self.database_prefix, (self.suffix_generator)()),
        };
        validate_database_name(&name)?;
        Ok(name)
    }

    /// Instance name to connect to.
    #[must_use]
    pub fn instance_name(&self) -> String {
        self.instance
            .clone()
            .unwrap_or_else(|| self.version.as_str().to_string())
    }

    /// Folder for the database files.
    pub fn output_folder(&self) -> Result<PathBuf> {
        if let Some(location) = &self.location {
            return Ok(location.clone());
        }

        let exe = std::env::current_exe()?;
        exe.parent().map(PathBuf::from).ok_or_else(|| {
            Error::Config(format!(
                "cannot determine the folder of {}",
                exe.display()
            ))
        })
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" | "" => Ok(false),
        _ => Err(Error::Config(format!("{key} must be a boolean: {value}"))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = LocalDbConfig::default();
        assert_eq!(config.version, LocalDbVersion::V11);
        assert_eq!(config.database_prefix, "localdb");
        assert_eq!(config.instance_name(), "v11.0");
        assert!(config.cleanup_on_drop);
        assert!(!config.install_if_missing);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = LocalDbConfig::new()
            .database_name("fixture")
            .version(LocalDbVersion::V13)
            .instance("MSSQLLocalDB")
            .connect_timeout(30)
            .multiple_active_result_sets(true)
            .install_if_missing(true)
            .cleanup_on_drop(false);

        assert_eq!(config.database_name.as_deref(), Some("fixture"));
        assert_eq!(config.instance_name(), "MSSQLLocalDB");
        assert_eq!(config.connect_timeout, Some(30));
        assert!(config.multiple_active_result_sets);
        assert!(config.install_if_missing);
        assert!(!config.cleanup_on_drop);
    }

    #[test]
    fn test_generated_name_uses_prefix_and_suffix() {
        let config = LocalDbConfig::new()
            .database_prefix("orders")
            .suffix_generator(|| "0001".to_string());
        assert_eq!(config.resolve_database_name().unwrap(), "orders_0001");
    }

    #[test]
    fn test_default_suffix_is_hex() {
        let name = LocalDbConfig::new().resolve_database_name().unwrap();
        let suffix = name.strip_prefix("localdb_").unwrap();
        assert_eq!(suffix.len(), 32);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_blank_name_is_generated() {
        let config = LocalDbConfig::new()
            .database_name("   ")
            .suffix_generator(|| "x".to_string());
        assert_eq!(config.resolve_database_name().unwrap(), "localdb_x");
    }

    #[test]
    fn test_explicit_name_wins() {
        let config = LocalDbConfig::new()
            .database_name("fixed")
            .database_prefix("ignored");
        assert_eq!(config.resolve_database_name().unwrap(), "fixed");
    }

    #[test]
    fn test_validate_rejects_empty_prefix() {
        let config = LocalDbConfig::new().database_prefix("");
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = config.database_name("named");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_name() {
        let config = LocalDbConfig::new().database_name("a/b");
        assert!(matches!(config.validate(), Err(Error::InvalidIdentifier(_))));
    }

    #[test]
    fn test_validate_rejects_separator_in_instance() {
        let config = LocalDbConfig::new().instance("shared;Pooling=false");
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_output_folder_override() {
        let config = LocalDbConfig::new().location("/tmp/dbs");
        assert_eq!(config.output_folder().unwrap(), PathBuf::from("/tmp/dbs"));
    }

    #[test]
    fn test_output_folder_defaults_to_exe_dir() {
        let folder = LocalDbConfig::new().output_folder().unwrap();
        let exe = std::env::current_exe().unwrap();
        assert_eq!(Some(folder.as_path()), exe.parent());
    }

    #[test]
    fn test_from_lookup() {
        let config = LocalDbConfig::from_lookup(lookup(&[
            (ENV_VERSION, "v12.0"),
            (ENV_PREFIX, "ci"),
            (ENV_CONNECT_TIMEOUT, "45"),
            (ENV_MARS, "true"),
            (ENV_INSTALL, "1"),
        ]))
        .unwrap();

        assert_eq!(config.version, LocalDbVersion::V12);
        assert_eq!(config.instance_name(), "v12.0");
        assert_eq!(config.database_prefix, "ci");
        assert_eq!(config.connect_timeout, Some(45));
        assert!(config.multiple_active_result_sets);
        assert!(config.install_if_missing);
    }

    #[test]
    fn test_from_lookup_rejects_bad_version() {
        let result = LocalDbConfig::from_lookup(lookup(&[(ENV_VERSION, "vBad")]));
        assert!(matches!(result, Err(Error::UnsupportedVersion(_))));
    }

    #[test]
    fn test_from_lookup_rejects_bad_values() {
        assert!(LocalDbConfig::from_lookup(lookup(&[(ENV_CONNECT_TIMEOUT, "soon")])).is_err());
        assert!(LocalDbConfig::from_lookup(lookup(&[(ENV_MARS, "maybe")])).is_err());
    }

    #[test]
    fn test_debug_omits_generator() {
        let debug = format!("{:?}", LocalDbConfig::new());
        assert!(debug.contains("database_prefix"));
        assert!(!debug.contains("suffix_generator"));
    }
}
