//! Developer tasks for the mssql-localdb workspace.
//!
//! Run with `cargo xtask <command>`:
//!
//! - `ci`: format check, clippy, tests and docs, in that order
//! - `fmt [--fix]`
//! - `clippy [--fix]`
//! - `test [--package <name>] [--integration]`
//! - `doc [--open]`
//! - `fuzz [target] [--max-time <secs>] [--list]` (cargo-fuzz + nightly)
//! - `instances`: print `sqllocaldb info` for every LocalDB instance (Windows)
//! - `sweep [--dir <path>] [--prefix <prefix>]`: delete database files left
//!   behind by test runs that never reached cleanup

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use xshell::{Shell, cmd};

const DEFAULT_FUZZ_TARGET: &str = "connection_string";
const DEFAULT_DATABASE_PREFIX: &str = "localdb";

#[derive(Parser)]
#[command(name = "xtask", about = "Developer tasks for mssql-localdb")]
struct Cli {
    #[command(subcommand)]
    command: Task,
}

#[derive(Subcommand)]
enum Task {
    /// Format check, clippy, tests and docs
    Ci,
    /// Check formatting
    Fmt {
        /// Rewrite files instead of checking
        #[arg(long)]
        fix: bool,
    },
    /// Lint every target with warnings denied
    Clippy {
        /// Apply machine-applicable suggestions
        #[arg(long)]
        fix: bool,
    },
    /// Run the test suite
    Test {
        /// Restrict to one package
        #[arg(short, long)]
        package: Option<String>,
        /// Include the tests that need SQL Server LocalDB
        #[arg(long)]
        integration: bool,
    },
    /// Build API documentation
    Doc {
        /// Open in a browser afterwards
        #[arg(long)]
        open: bool,
    },
    /// Run a fuzz target
    Fuzz {
        #[arg(default_value = DEFAULT_FUZZ_TARGET)]
        target: String,
        /// Stop after this many seconds
        #[arg(long, default_value_t = 60)]
        max_time: u64,
        /// Only list the targets
        #[arg(long)]
        list: bool,
    },
    /// Show the LocalDB instances on this machine
    Instances,
    /// Delete leftover `<prefix>_*.mdf` / `_log.ldf` files
    Sweep {
        /// Folder holding the files; defaults to the test binaries' folder
        #[arg(long)]
        dir: Option<PathBuf>,
        /// Database name prefix the files were created with
        #[arg(long, default_value = DEFAULT_DATABASE_PREFIX)]
        prefix: String,
        /// List the files without deleting them
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let sh = Shell::new()?;
    let root = workspace_root()?;
    sh.change_dir(&root);

    match cli.command {
        Task::Ci => {
            step("fmt", || fmt(&sh, false))?;
            step("clippy", || clippy(&sh, false))?;
            step("test", || test(&sh, None, false))?;
            step("doc", || doc(&sh, false))?;
            println!("ci passed");
        }
        Task::Fmt { fix } => fmt(&sh, fix)?,
        Task::Clippy { fix } => clippy(&sh, fix)?,
        Task::Test {
            package,
            integration,
        } => test(&sh, package.as_deref(), integration)?,
        Task::Doc { open } => doc(&sh, open)?,
        Task::Fuzz {
            target,
            max_time,
            list,
        } => fuzz(&sh, &root.join("fuzz"), &target, max_time, list)?,
        Task::Instances => instances(&sh)?,
        Task::Sweep {
            dir,
            prefix,
            dry_run,
        } => {
            let dir = dir.unwrap_or_else(|| root.join("target").join("debug").join("deps"));
            sweep(&dir, &prefix, dry_run)?;
        }
    }

    Ok(())
}

fn step(name: &str, run: impl FnOnce() -> Result<()>) -> Result<()> {
    println!("==> {name}");
    run().with_context(|| format!("{name} failed"))
}

fn workspace_root() -> Result<PathBuf> {
    let output = std::process::Command::new(env_cargo())
        .args(["locate-project", "--workspace", "--message-format=plain"])
        .output()
        .context("could not run cargo locate-project")?;
    let manifest = String::from_utf8(output.stdout).context("cargo printed invalid UTF-8")?;

    Path::new(manifest.trim())
        .parent()
        .map(Path::to_path_buf)
        .context("workspace manifest has no parent folder")
}

fn env_cargo() -> String {
    std::env::var("CARGO").unwrap_or_else(|_| "cargo".to_string())
}

fn fmt(sh: &Shell, fix: bool) -> Result<()> {
    let check: &[&str] = if fix { &[] } else { &["--", "--check"] };
    cmd!(sh, "cargo fmt --all {check...}").run()?;
    Ok(())
}

fn clippy(sh: &Shell, fix: bool) -> Result<()> {
    if fix {
        cmd!(sh, "cargo clippy --workspace --all-targets --fix --allow-dirty").run()?;
    } else {
        cmd!(sh, "cargo clippy --workspace --all-targets -- -D warnings").run()?;
    }
    Ok(())
}

fn test(sh: &Shell, package: Option<&str>, integration: bool) -> Result<()> {
    let scope = match package {
        Some(name) => vec!["-p", name],
        None => vec!["--workspace"],
    };

    // The LocalDB tests are #[ignore]d and compiled on Windows only.
    let extra: &[&str] = if integration {
        if !cfg!(windows) {
            bail!("--integration needs Windows with SQL Server LocalDB installed");
        }
        &["--", "--include-ignored"]
    } else {
        &[]
    };

    cmd!(sh, "cargo test {scope...} {extra...}").run()?;
    Ok(())
}

fn doc(sh: &Shell, open: bool) -> Result<()> {
    let open = open.then_some("--open");
    cmd!(sh, "cargo doc --workspace --no-deps {open...}")
        .env("RUSTDOCFLAGS", "-D warnings")
        .run()?;
    Ok(())
}

fn fuzz(sh: &Shell, fuzz_dir: &Path, target: &str, max_time: u64, list: bool) -> Result<()> {
    if !fuzz_dir.is_dir() {
        bail!("no fuzz folder at {}", fuzz_dir.display());
    }

    if list {
        let mut targets = fs::read_dir(fuzz_dir.join("fuzz_targets"))?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                entry
                    .path()
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
            })
            .collect::<Vec<_>>();
        targets.sort();
        for target in targets {
            println!("{target}");
        }
        return Ok(());
    }

    let max_time = format!("-max_total_time={max_time}");
    cmd!(sh, "cargo +nightly fuzz run {target} -- {max_time}").run()?;
    Ok(())
}

fn instances(sh: &Shell) -> Result<()> {
    if !cfg!(windows) {
        bail!("SQL Server LocalDB is only available on Windows");
    }

    let names = cmd!(sh, "sqllocaldb info").read()?;
    for name in names.lines().map(str::trim).filter(|n| !n.is_empty()) {
        println!("{}", cmd!(sh, "sqllocaldb info {name}").read()?);
        println!();
    }
    Ok(())
}

/// Remove data and log files whose name starts with `<prefix>_`.
///
/// Files still attached to an instance are locked and are reported instead.
fn sweep(dir: &Path, prefix: &str, dry_run: bool) -> Result<()> {
    let stem_prefix = format!("{prefix}_");
    let mut removed = 0usize;

    for entry in fs::read_dir(dir).with_context(|| format!("cannot read {}", dir.display()))? {
        let path = entry?.path();
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let is_database_file = file_name.ends_with(".mdf") || file_name.ends_with("_log.ldf");
        if !is_database_file || !file_name.starts_with(&stem_prefix) {
            continue;
        }

        if dry_run {
            println!("would remove {}", path.display());
            continue;
        }
        match fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(err) => eprintln!("kept {}: {err}", path.display()),
        }
    }

    if !dry_run {
        println!("removed {removed} file(s) from {}", dir.display());
    }
    Ok(())
}
