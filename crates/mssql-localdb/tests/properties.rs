//! Property tests for naming, quoting and connection strings.

#![allow(clippy::unwrap_used)]

use mssql_localdb::sql::{
    MAX_DATABASE_NAME_LEN, create_database, quote_identifier, quote_literal,
    validate_database_name,
};
use mssql_localdb::{ConnectionSettings, LocalDbConfig};
use proptest::prelude::*;

fn identifier() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_ .\\-\\]']{1,40}"
}

proptest! {
    #[test]
    fn generated_name_keeps_prefix_and_suffix(
        prefix in "[A-Za-z][A-Za-z0-9_]{0,20}",
        suffix in "[A-Za-z0-9\\-]{1,32}",
    ) {
        let expected = suffix.clone();
        let config = LocalDbConfig::new()
            .database_prefix(prefix.clone())
            .suffix_generator(move || expected.clone());
        let name = config.resolve_database_name().unwrap();
        prop_assert_eq!(name, format!("{prefix}_{suffix}"));
    }

    #[test]
    fn quoted_identifier_is_balanced(name in identifier()) {
        let quoted = quote_identifier(&name);
        prop_assert!(quoted.starts_with('[') && quoted.ends_with(']'));
        let inner = &quoted[1..quoted.len() - 1];
        prop_assert_eq!(inner.replace("]]", "]"), name);
    }

    #[test]
    fn quoted_literal_round_trips(value in ".{0,40}") {
        let quoted = quote_literal(&value);
        prop_assert!(quoted.starts_with("N'") && quoted.ends_with('\''));
        let inner = &quoted[2..quoted.len() - 1];
        prop_assert_eq!(inner.replace("''", "'"), value);
    }

    #[test]
    fn create_statement_names_database(name in identifier()) {
        let sql = create_database(&name, std::path::Path::new("C:\\dbs\\x.mdf"));
        let expected = format!("CREATE DATABASE {} ON", quote_identifier(&name));
        prop_assert!(sql.starts_with(&expected));
    }

    #[test]
    fn valid_names_have_bounded_length(name in "[a-z_]{1,200}") {
        let ok = validate_database_name(&name).is_ok();
        prop_assert_eq!(ok, name.len() <= MAX_DATABASE_NAME_LEN);
    }

    #[test]
    fn connection_string_parses_back(
        instance in "[A-Za-z0-9.]{1,20}",
        database in "[A-Za-z0-9_]{1,40}",
        timeout in proptest::option::of(0u32..3600),
        mars in any::<bool>(),
    ) {
        let settings = ConnectionSettings::new(instance, database)
            .connect_timeout(timeout)
            .multiple_active_result_sets(mars);
        let parsed = ConnectionSettings::from_connection_string(&settings.to_string()).unwrap();
        prop_assert_eq!(parsed, settings);
    }
}
