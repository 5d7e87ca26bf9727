//! Test fixture utilities.

use mssql_localdb::{LocalDbVersion, VersionProbe};

/// Version probe with a fixed set of installed versions.
#[derive(Debug, Clone, Default)]
pub struct StaticProbe {
    installed: Vec<LocalDbVersion>,
}

impl StaticProbe {
    /// Every known version is installed.
    #[must_use]
    pub fn all() -> Self {
        Self {
            installed: LocalDbVersion::ALL.to_vec(),
        }
    }

    /// Nothing is installed.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Only the given versions are installed.
    #[must_use]
    pub fn only(versions: &[LocalDbVersion]) -> Self {
        Self {
            installed: versions.to_vec(),
        }
    }
}

impl VersionProbe for StaticProbe {
    fn is_installed(&self, version: LocalDbVersion) -> bool {
        self.installed.contains(&version)
    }
}

/// Create a scratch folder for database files, removed when dropped.
pub fn scratch_dir() -> std::io::Result<tempfile::TempDir> {
    tempfile::Builder::new().prefix("localdb-test-").tempdir()
}

/// Install a `tracing` subscriber that writes to the test output.
///
/// Honours `RUST_LOG`; safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("mssql_localdb=debug")),
        )
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_probe() {
        assert!(StaticProbe::all().is_installed(LocalDbVersion::V16));
        assert!(!StaticProbe::none().is_installed(LocalDbVersion::V11));

        let probe = StaticProbe::only(&[LocalDbVersion::V12]);
        assert!(probe.is_installed(LocalDbVersion::V12));
        assert!(!probe.is_installed(LocalDbVersion::V11));
    }
}
