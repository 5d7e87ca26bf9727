//! LocalDB connection strings.
//!
//! LocalDB is addressed with an ADO.NET data source of the form
//! `(LocalDB)\<instance>` and always uses integrated security. Two strings
//! are built from [`ConnectionSettings`]:
//!
//! ```text
//! Data Source=(LocalDB)\v11.0;Initial Catalog=master;Integrated Security=True;
//! Data Source=(LocalDB)\v11.0;Initial Catalog=localdb_1f2e;Integrated Security=True;Connection Timeout=30;MultipleActiveResultSets=true;
//! ```

use std::fmt;
use std::time::Duration;

use crate::error::{Error, Result};

/// Data source prefix that selects a LocalDB instance.
pub const LOCALDB_DATA_SOURCE_PREFIX: &str = r"(LocalDB)\";

/// Administrative catalog used to create and detach databases.
pub const ADMIN_CATALOG: &str = "master";

/// Connect timeout used when none is configured (seconds).
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u32 = 15;

/// Settings for one connection to a LocalDB instance.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct ConnectionSettings {
    /// LocalDB instance name, e.g. `v11.0`.
    pub instance: String,

    /// Initial catalog.
    pub database: String,

    /// Whether integrated (Windows) security is requested.
    pub integrated_security: bool,

    /// Connect timeout in seconds, if configured.
    pub connect_timeout: Option<u32>,

    /// Whether Multiple Active Result Sets is requested.
    pub multiple_active_result_sets: bool,
}

impl ConnectionSettings {
    /// Settings for the given instance and catalog.
    #[must_use]
    pub fn new(instance: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
            database: database.into(),
            integrated_security: true,
            connect_timeout: None,
            multiple_active_result_sets: false,
        }
    }

    /// Settings for the administrative catalog of an instance.
    #[must_use]
    pub fn admin(instance: impl Into<String>) -> Self {
        Self::new(instance, ADMIN_CATALOG)
    }

    /// Set the connect timeout in seconds.
    #[must_use]
    pub fn connect_timeout(mut self, seconds: Option<u32>) -> Self {
        self.connect_timeout = seconds;
        self
    }

    /// Enable or disable Multiple Active Result Sets.
    #[must_use]
    pub fn multiple_active_result_sets(mut self, enabled: bool) -> Self {
        self.multiple_active_result_sets = enabled;
        self
    }

    /// Check whether these settings target the administrative catalog.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.database.eq_ignore_ascii_case(ADMIN_CATALOG)
    }

    /// Connect timeout to enforce, falling back to the ADO.NET default.
    #[must_use]
    pub fn effective_connect_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(
            self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
        ))
    }

    /// Data source portion, e.g. `(LocalDB)\v11.0`.
    #[must_use]
    pub fn data_source(&self) -> String {
        format!("{LOCALDB_DATA_SOURCE_PREFIX}{}", self.instance)
    }

    /// Render the ADO.NET connection string.
    #[must_use]
    pub fn to_connection_string(&self) -> String {
        let mut s = format!(
            "Data Source={};Initial Catalog={};Integrated Security={};",
            self.data_source(),
            self.database,
            if self.integrated_security { "True" } else { "False" },
        );
        if let Some(timeout) = self.connect_timeout {
            s.push_str(&format!("Connection Timeout={timeout};"));
        }
        if self.multiple_active_result_sets {
            s.push_str("MultipleActiveResultSets=true;");
        }
        s
    }

    /// Parse an ADO.NET connection string that targets a LocalDB instance.
    pub fn from_connection_string(conn_str: &str) -> Result<Self> {
        let mut instance = None;
        let mut settings = Self::admin("");

        for part in conn_str.split(';') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }

            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| Error::Config(format!("invalid key-value: {part}")))?;

            let key = key.trim().to_lowercase();
            let value = value.trim();

            match key.as_str() {
                "data source" | "server" | "address" | "addr" => {
                    instance = Some(parse_data_source(value)?);
                }
                "initial catalog" | "database" => {
                    settings.database = value.to_string();
                }
                "integrated security" | "trusted_connection" => {
                    settings.integrated_security = parse_bool(value)
                        || value.eq_ignore_ascii_case("sspi");
                }
                "connection timeout" | "connect timeout" | "timeout" => {
                    let secs: u32 = value
                        .parse()
                        .map_err(|_| Error::Config(format!("invalid timeout: {value}")))?;
                    settings.connect_timeout = Some(secs);
                }
                "multipleactiveresultsets" | "multiple active result sets" | "mars" => {
                    settings.multiple_active_result_sets = parse_bool(value);
                }
                _ => {
                    tracing::debug!(
                        key = key,
                        value = value,
                        "ignoring unknown connection string option"
                    );
                }
            }
        }

        settings.instance =
            instance.ok_or_else(|| Error::Config("missing Data Source".to_string()))?;
        Ok(settings)
    }
}

impl fmt::Display for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_connection_string())
    }
}

fn parse_data_source(value: &str) -> Result<String> {
    let prefix_len = LOCALDB_DATA_SOURCE_PREFIX.len();
    let is_localdb = value
        .get(..prefix_len)
        .is_some_and(|p| p.eq_ignore_ascii_case(LOCALDB_DATA_SOURCE_PREFIX));
    if !is_localdb {
        return Err(Error::Config(format!(
            "not a LocalDB data source: {value}"
        )));
    }

    let instance = value[prefix_len..].trim();
    if instance.is_empty() {
        return Err(Error::Config("missing LocalDB instance name".to_string()));
    }
    Ok(instance.to_string())
}

fn parse_bool(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("yes") || value == "1"
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_connection_string() {
        let settings = ConnectionSettings::admin("v11.0");
        assert_eq!(
            settings.to_connection_string(),
            r"Data Source=(LocalDB)\v11.0;Initial Catalog=master;Integrated Security=True;"
        );
        assert!(settings.is_admin());
    }

    #[test]
    fn test_database_connection_string_plain() {
        let settings = ConnectionSettings::new("v12.0", "localdb_42");
        assert_eq!(
            settings.to_string(),
            r"Data Source=(LocalDB)\v12.0;Initial Catalog=localdb_42;Integrated Security=True;"
        );
        assert!(!settings.is_admin());
    }

    #[test]
    fn test_database_connection_string_options() {
        let settings = ConnectionSettings::new("v11.0", "db")
            .connect_timeout(Some(30))
            .multiple_active_result_sets(true);
        let s = settings.to_connection_string();
        assert!(s.ends_with("Connection Timeout=30;MultipleActiveResultSets=true;"));
    }

    #[test]
    fn test_parse_roundtrip() {
        let settings = ConnectionSettings::new("v13.0", "roundtrip")
            .connect_timeout(Some(5))
            .multiple_active_result_sets(true);
        let parsed = ConnectionSettings::from_connection_string(&settings.to_string()).unwrap();
        assert_eq!(parsed, settings);
    }

    #[test]
    fn test_parse_defaults_to_master() {
        let settings =
            ConnectionSettings::from_connection_string(r"Server=(localdb)\MSSQLLocalDB").unwrap();
        assert_eq!(settings.instance, "MSSQLLocalDB");
        assert_eq!(settings.database, ADMIN_CATALOG);
        assert!(settings.integrated_security);
    }

    #[test]
    fn test_parse_rejects_network_server() {
        let result = ConnectionSettings::from_connection_string("Server=localhost,1433;");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_parse_rejects_missing_data_source() {
        let result = ConnectionSettings::from_connection_string("Initial Catalog=db;");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_parse_invalid_timeout() {
        let result = ConnectionSettings::from_connection_string(
            r"Data Source=(LocalDB)\v11.0;Connection Timeout=soon;",
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_effective_connect_timeout() {
        let settings = ConnectionSettings::admin("v11.0");
        assert_eq!(settings.effective_connect_timeout(), Duration::from_secs(15));

        let settings = settings.connect_timeout(Some(3));
        assert_eq!(settings.effective_connect_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_trusted_connection_sspi() {
        let settings = ConnectionSettings::from_connection_string(
            r"Data Source=(LocalDB)\v11.0;Trusted_Connection=SSPI;",
        )
        .unwrap();
        assert!(settings.integrated_security);
    }
}
