#![no_main]

use libfuzzer_sys::fuzz_target;
use mssql_localdb::ConnectionSettings;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Anything that parses must render back to an equivalent string.
        if let Ok(settings) = ConnectionSettings::from_connection_string(s) {
            let rendered = settings.to_connection_string();
            let reparsed = ConnectionSettings::from_connection_string(&rendered);
            assert!(reparsed.is_ok(), "rendered string failed to parse: {rendered}");
        }
    }
});
