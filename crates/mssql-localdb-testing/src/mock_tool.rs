//! Scripted `sqllocaldb` utility.

use std::sync::Arc;

use async_trait::async_trait;
use mssql_localdb::tool::started_message;
use mssql_localdb::{SqlLocalDb, ToolOutput, ToolRunner};
use parking_lot::Mutex;

#[derive(Debug)]
struct ToolState {
    instances: Vec<(String, bool)>,
    calls: Vec<Vec<String>>,
    report_started: bool,
    stderr: Option<String>,
}

/// A [`ToolRunner`] that simulates `sqllocaldb` against an in-memory list
/// of instances.
///
/// Supports `info`, `info <instance>`, `create <instance> <version> [-s]`
/// and `start <instance>`. Clones share state.
#[derive(Debug, Clone)]
pub struct MockTool {
    state: Arc<Mutex<ToolState>>,
}

impl Default for MockTool {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTool {
    /// A tool with no instances.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ToolState {
                instances: Vec::new(),
                calls: Vec::new(),
                report_started: true,
                stderr: None,
            })),
        }
    }

    /// Add an existing, stopped instance.
    #[must_use]
    pub fn with_instance(self, name: impl Into<String>) -> Self {
        self.state.lock().instances.push((name.into(), false));
        self
    }

    /// Never print the "started" line after `create -s`.
    #[must_use]
    pub fn never_starts(self) -> Self {
        self.state.lock().report_started = false;
        self
    }

    /// Write `message` to standard error on every invocation.
    #[must_use]
    pub fn fail_with(self, message: impl Into<String>) -> Self {
        self.state.lock().stderr = Some(message.into());
        self
    }

    /// A [`SqlLocalDb`] client backed by this tool.
    #[must_use]
    pub fn client(&self) -> SqlLocalDb {
        SqlLocalDb::with_runner(Arc::new(self.clone()))
    }

    /// Every argument list the tool was invoked with.
    #[must_use]
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.state.lock().calls.clone()
    }

    /// Names of all instances.
    #[must_use]
    pub fn instances(&self) -> Vec<String> {
        self.state
            .lock()
            .instances
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Check whether an instance is running.
    #[must_use]
    pub fn is_running(&self, name: &str) -> bool {
        self.state
            .lock()
            .instances
            .iter()
            .any(|(n, running)| n.eq_ignore_ascii_case(name) && *running)
    }
}

#[async_trait]
impl ToolRunner for MockTool {
    async fn run(&self, args: &[String]) -> std::io::Result<ToolOutput> {
        let mut state = self.state.lock();
        state.calls.push(args.to_vec());

        if let Some(stderr) = &state.stderr {
            return Ok(ToolOutput::failure(stderr.clone()));
        }

        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = match args.as_slice() {
            ["info"] => {
                let mut out = String::new();
                for (name, _) in &state.instances {
                    out.push_str(name);
                    out.push_str("\r\n");
                }
                ToolOutput::success(out)
            }
            ["info", name] => match find(&state.instances, name) {
                Some(i) => {
                    let (name, running) = &state.instances[i];
                    ToolOutput::success(info_text(name, *running))
                }
                None => ToolOutput::failure(format!(
                    "Printing of LocalDB instance \"{name}\" information failed because of the following error:\r\nThe specified LocalDB instance does not exist.\r\n"
                )),
            },
            ["create", name, version, rest @ ..] => {
                if find(&state.instances, name).is_some() {
                    return Ok(ToolOutput::failure(format!(
                        "Creation of LocalDB instance \"{name}\" failed because of the following error:\r\nThe specified LocalDB instance already exists.\r\n"
                    )));
                }
                let start = rest.contains(&"-s") && state.report_started;
                state.instances.push(((*name).to_string(), start));

                let mut out = format!("LocalDB instance \"{name}\" created with version {version}.\r\n");
                if start {
                    out.push_str(&started_message(name));
                    out.push_str("\r\n");
                }
                ToolOutput::success(out)
            }
            ["start", name] => match find(&state.instances, name) {
                Some(i) => {
                    state.instances[i].1 = true;
                    ToolOutput::success(format!("{}\r\n", started_message(name)))
                }
                None => ToolOutput::failure(format!(
                    "Start of LocalDB instance \"{name}\" failed because of the following error:\r\nThe specified LocalDB instance does not exist.\r\n"
                )),
            },
            other => ToolOutput::failure(format!("unsupported command: {other:?}")),
        };

        Ok(output)
    }
}

fn find(instances: &[(String, bool)], name: &str) -> Option<usize> {
    instances
        .iter()
        .position(|(n, _)| n.eq_ignore_ascii_case(name))
}

fn info_text(name: &str, running: bool) -> String {
    let mut out = format!(
        "Name:               {name}\r\n\
         Version:            11.0.3000.0\r\n\
         Shared name:        \r\n\
         Owner:              BUILD\\agent\r\n\
         Auto-create:        No\r\n\
         State:              {}\r\n",
        if running { "Running" } else { "Stopped" },
    );
    if running {
        out.push_str(&format!(
            "Instance pipe name: np:\\\\.\\pipe\\LOCALDB#{:08X}\\tsql\\query\r\n",
            name.len()
        ));
    } else {
        out.push_str("Instance pipe name: \r\n");
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use mssql_localdb::InstanceInfo;

    #[test]
    fn test_info_text_parses() {
        let info = InstanceInfo::parse(&info_text("v11.0", true)).unwrap();
        assert_eq!(info.name, "v11.0");
        assert!(info.is_running());
        assert_eq!(
            info.pipe_name.as_deref(),
            Some(r"\\.\pipe\LOCALDB#00000005\tsql\query")
        );

        let info = InstanceInfo::parse(&info_text("v11.0", false)).unwrap();
        assert!(!info.is_running());
        assert_eq!(info.pipe_name, None);
    }
}
