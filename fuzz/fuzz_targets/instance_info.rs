#![no_main]

use libfuzzer_sys::fuzz_target;
use mssql_localdb::InstanceInfo;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let Some(info) = InstanceInfo::parse(&text) else {
        return;
    };

    // The last non-empty pipe line wins.
    let raw = text
        .lines()
        .filter_map(|line| line.split_once(':'))
        .filter(|(key, value)| {
            key.trim().to_lowercase() == "instance pipe name" && !value.trim().is_empty()
        })
        .map(|(_, value)| value.trim())
        .last();

    match (raw, info.pipe_name.as_deref()) {
        (Some(raw), Some(pipe)) => assert_eq!(pipe, raw.strip_prefix("np:").unwrap_or(raw)),
        (None, None) => {}
        (raw, pipe) => panic!("pipe line {raw:?} parsed as {pipe:?}"),
    }
});
