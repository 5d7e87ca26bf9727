//! T-SQL statements issued against the administrative catalog.

use std::path::Path;

use crate::error::{Error, Result};

/// Longest database name accepted.
///
/// The log file's logical name is `<name>_log` and SQL Server limits logical
/// file names to 128 characters.
pub const MAX_DATABASE_NAME_LEN: usize = 123;

/// Characters that may not appear in a Windows file name.
const INVALID_FILE_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Separates key/value pairs in a connection string.
pub(crate) const CONNECTION_STRING_SEPARATOR: char = ';';

/// Query returning the database id for the name bound as `@P1`, or NULL.
pub const DATABASE_ID_QUERY: &str = "SELECT db_id(@P1)";

/// Quote an identifier with brackets, doubling any closing bracket.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

/// Quote a Unicode string literal, doubling any single quote.
#[must_use]
pub fn quote_literal(value: &str) -> String {
    format!("N'{}'", value.replace('\'', "''"))
}

/// Check that a name can be used both as a database name and in a file name.
pub fn validate_database_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidIdentifier(
            "database name cannot be empty".into(),
        ));
    }

    let len = name.chars().count();
    if len > MAX_DATABASE_NAME_LEN {
        return Err(Error::InvalidIdentifier(format!(
            "database name is {len} characters, at most {MAX_DATABASE_NAME_LEN} allowed"
        )));
    }

    if let Some(c) = name
        .chars()
        .find(|c| {
            c.is_control() || INVALID_FILE_CHARS.contains(c) || *c == CONNECTION_STRING_SEPARATOR
        })
    {
        return Err(Error::InvalidIdentifier(format!(
            "database name {name:?} contains invalid character {c:?}"
        )));
    }

    Ok(())
}

/// `CREATE DATABASE` with the primary data file at `mdf`.
///
/// The log file is placed next to it by the engine as `<name>_log.ldf`.
#[must_use]
pub fn create_database(name: &str, mdf: &Path) -> String {
    format!(
        "CREATE DATABASE {} ON (NAME = {}, FILENAME = {})",
        quote_identifier(name),
        quote_literal(name),
        quote_literal(&mdf.to_string_lossy()),
    )
}

/// Force the database into single-user mode and detach it.
#[must_use]
pub fn detach_database(name: &str) -> String {
    format!(
        "ALTER DATABASE {} SET SINGLE_USER WITH ROLLBACK IMMEDIATE; EXEC sp_detach_db {}",
        quote_identifier(name),
        quote_literal(name),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("users"), "[users]");
        assert_eq!(quote_identifier("a]b"), "[a]]b]");
    }

    #[test]
    fn test_quote_literal() {
        assert_eq!(quote_literal("db"), "N'db'");
        assert_eq!(quote_literal("o'brien"), "N'o''brien'");
    }

    #[test]
    fn test_create_database() {
        let mdf = PathBuf::from(r"C:\out\localdb_1.mdf");
        assert_eq!(
            create_database("localdb_1", &mdf),
            r"CREATE DATABASE [localdb_1] ON (NAME = N'localdb_1', FILENAME = N'C:\out\localdb_1.mdf')"
        );
    }

    #[test]
    fn test_detach_database() {
        assert_eq!(
            detach_database("localdb_1"),
            "ALTER DATABASE [localdb_1] SET SINGLE_USER WITH ROLLBACK IMMEDIATE; \
             EXEC sp_detach_db N'localdb_1'"
        );
    }

    #[test]
    fn test_validate_database_name() {
        assert!(validate_database_name("localdb_abc").is_ok());
        assert!(validate_database_name("with space and ] bracket").is_ok());
        assert!(validate_database_name(&"x".repeat(MAX_DATABASE_NAME_LEN)).is_ok());

        assert!(validate_database_name("").is_err());
        assert!(validate_database_name(&"x".repeat(MAX_DATABASE_NAME_LEN + 1)).is_err());
        assert!(validate_database_name("a/b").is_err());
        assert!(validate_database_name("a:b").is_err());
        assert!(validate_database_name("tab\there").is_err());
    }

    #[test]
    fn test_validate_rejects_separator() {
        let err = validate_database_name("orders;Pooling=false");
        assert!(matches!(err, Err(Error::InvalidIdentifier(_))));
        assert!(validate_database_name(";").is_err());
    }

    #[test]
    fn test_invalid_identifier_variant() {
        let err = validate_database_name("a|b");
        assert!(matches!(err, Err(Error::InvalidIdentifier(_))));
    }
}
