//! `sqllocaldb.exe` command-line wrapper.
//!
//! The LocalDB management utility is used to list, create and start
//! instances, and to discover the named pipe a running instance listens on.
//! All output is line-oriented text; any text on standard error is treated
//! as a failure.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{Error, Result};
use crate::version::LocalDbVersion;

/// Default executable name; resolved through `PATH`.
pub const SQLLOCALDB_EXE: &str = "sqllocaldb.exe";

/// Captured output of one tool invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Standard output text.
    pub stdout: String,
    /// Standard error text.
    pub stderr: String,
    /// Exit code, if the process exited normally.
    pub status: Option<i32>,
}

impl ToolOutput {
    /// Output with the given standard output and a zero exit code.
    #[must_use]
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            status: Some(0),
        }
    }

    /// Output with the given standard error and a non-zero exit code.
    #[must_use]
    pub fn failure(stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            status: Some(1),
        }
    }
}

/// Runs the LocalDB management utility.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Run the utility with the given arguments and capture its output.
    async fn run(&self, args: &[String]) -> std::io::Result<ToolOutput>;
}

/// Runs `sqllocaldb.exe` as a child process.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: PathBuf,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self {
            program: PathBuf::from(SQLLOCALDB_EXE),
        }
    }
}

impl ProcessRunner {
    /// Create a runner for the executable on `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific executable.
    #[must_use]
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// The executable this runner launches.
    #[must_use]
    pub fn program(&self) -> &std::path::Path {
        &self.program
    }
}

#[async_trait]
impl ToolRunner for ProcessRunner {
    async fn run(&self, args: &[String]) -> std::io::Result<ToolOutput> {
        tracing::debug!(program = %self.program.display(), ?args, "running sqllocaldb");

        // Both pipes are drained concurrently until the process exits.
        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        Ok(ToolOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            status: output.status.code(),
        })
    }
}

/// Running state of a LocalDB instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceState {
    /// Instance is running and accepting connections.
    Running,
    /// Instance exists but is stopped.
    Stopped,
    /// Any other state text reported by the utility.
    Other(String),
}

impl InstanceState {
    fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("running") {
            Self::Running
        } else if s.eq_ignore_ascii_case("stopped") {
            Self::Stopped
        } else {
            Self::Other(s.to_string())
        }
    }
}

/// Details reported by `sqllocaldb info <instance>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceInfo {
    /// Instance name.
    pub name: String,
    /// Engine build, e.g. `11.0.3000.0`.
    pub version: Option<String>,
    /// Current state.
    pub state: InstanceState,
    /// Named pipe path while running, with the `np:` prefix removed.
    pub pipe_name: Option<String>,
}

impl InstanceInfo {
    /// Parse the `Key: Value` lines printed by `sqllocaldb info <instance>`.
    #[must_use]
    pub fn parse(output: &str) -> Option<Self> {
        let mut name = None;
        let mut version = None;
        let mut state = None;
        let mut pipe_name = None;

        for line in output.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match key.trim().to_lowercase().as_str() {
                "name" => name = Some(value.to_string()),
                "version" if !value.is_empty() => version = Some(value.to_string()),
                "state" => state = Some(InstanceState::parse(value)),
                "instance pipe name" if !value.is_empty() => {
                    let pipe = value.strip_prefix("np:").unwrap_or(value);
                    pipe_name = Some(pipe.to_string());
                }
                _ => {}
            }
        }

        Some(Self {
            name: name?,
            version,
            state: state.unwrap_or(InstanceState::Other(String::new())),
            pipe_name,
        })
    }

    /// Check whether the instance is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == InstanceState::Running
    }
}

/// The exact line `sqllocaldb create ... -s` prints once the instance is up.
#[must_use]
pub fn started_message(instance: &str) -> String {
    format!("LocalDB instance \"{instance}\" started.")
}

/// Client for the LocalDB management utility.
#[derive(Clone)]
pub struct SqlLocalDb {
    runner: Arc<dyn ToolRunner>,
}

impl std::fmt::Debug for SqlLocalDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlLocalDb").finish_non_exhaustive()
    }
}

impl Default for SqlLocalDb {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlLocalDb {
    /// Use `sqllocaldb.exe` from `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_runner(Arc::new(ProcessRunner::new()))
    }

    /// Use a custom runner.
    #[must_use]
    pub fn with_runner(runner: Arc<dyn ToolRunner>) -> Self {
        Self { runner }
    }

    async fn invoke(&self, args: &[&str]) -> Result<String> {
        let args: Vec<String> = args.iter().map(|a| (*a).to_string()).collect();
        let output = self.runner.run(&args).await?;

        let stderr = output.stderr.trim();
        if !stderr.is_empty() {
            return Err(Error::Tool(stderr.to_string()));
        }
        Ok(output.stdout)
    }

    /// List instance names (`sqllocaldb info`).
    pub async fn instances(&self) -> Result<Vec<String>> {
        let stdout = self.invoke(&["info"]).await?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Check whether an instance with this name exists.
    pub async fn instance_exists(&self, instance: &str) -> Result<bool> {
        let instances = self.instances().await?;
        Ok(instances.iter().any(|i| i.eq_ignore_ascii_case(instance)))
    }

    /// Create an instance (`sqllocaldb create "<instance>" <number> [-s]`).
    ///
    /// Returns `true` if the utility reported the instance as started.
    pub async fn create(
        &self,
        instance: &str,
        version: LocalDbVersion,
        start: bool,
    ) -> Result<bool> {
        let mut args = vec!["create", instance, version.number()];
        if start {
            args.push("-s");
        }
        let stdout = self.invoke(&args).await?;
        Ok(stdout.contains(&started_message(instance)))
    }

    /// Start an existing instance (`sqllocaldb start "<instance>"`).
    pub async fn start(&self, instance: &str) -> Result<()> {
        self.invoke(&["start", instance]).await?;
        Ok(())
    }

    /// Query details of one instance (`sqllocaldb info "<instance>"`).
    pub async fn instance_info(&self, instance: &str) -> Result<InstanceInfo> {
        let stdout = self.invoke(&["info", instance]).await?;
        InstanceInfo::parse(&stdout).ok_or_else(|| {
            Error::Connection(format!("unrecognized sqllocaldb info output for {instance}"))
        })
    }

    /// Create and start the instance unless it already exists.
    pub async fn ensure_instance(&self, instance: &str, version: LocalDbVersion) -> Result<()> {
        if self.instance_exists(instance).await? {
            tracing::debug!(instance, "LocalDB instance already exists");
            return Ok(());
        }

        tracing::info!(instance, %version, "creating LocalDB instance");
        if self.create(instance, version, true).await? {
            Ok(())
        } else {
            Err(Error::InstanceStartFailed {
                instance: instance.to_string(),
                version,
            })
        }
    }
}
