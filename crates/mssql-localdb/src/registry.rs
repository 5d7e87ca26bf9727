//! Installed LocalDB version detection.
//!
//! The LocalDB installer registers each engine version under
//! `HKLM\SOFTWARE\Microsoft\Microsoft SQL Server Local DB\Installed Versions`.
//! A version counts as installed when its key carries a `ParentInstance`
//! value. The registry is read once per process; see [`installed_versions`].

use once_cell::sync::Lazy;

use crate::version::LocalDbVersion;

/// Registry value that marks an engine version as installed.
pub const PARENT_INSTANCE_VALUE: &str = "ParentInstance";

/// Source of truth for which LocalDB engine versions are installed.
pub trait VersionProbe: Send + Sync {
    /// Check whether the given engine version is installed.
    fn is_installed(&self, version: LocalDbVersion) -> bool;
}

/// Probe backed by the Windows registry.
///
/// On platforms other than Windows no version is ever reported as installed.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegistryProbe;

impl RegistryProbe {
    /// Create a new registry probe.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl VersionProbe for RegistryProbe {
    #[cfg(windows)]
    fn is_installed(&self, version: LocalDbVersion) -> bool {
        let path = version.registry_path();
        let parent = windows_registry::LOCAL_MACHINE
            .open(&path)
            .and_then(|key| key.get_string(PARENT_INSTANCE_VALUE));

        match parent {
            Ok(parent) => {
                tracing::trace!(%version, parent = %parent, "found LocalDB registration");
                true
            }
            Err(e) => {
                tracing::trace!(%version, error = %e, "LocalDB version not registered");
                false
            }
        }
    }

    #[cfg(not(windows))]
    fn is_installed(&self, _version: LocalDbVersion) -> bool {
        false
    }
}

/// Return the installed subset of [`LocalDbVersion::ALL`], oldest first.
#[must_use]
pub fn detect_installed(probe: &dyn VersionProbe) -> Vec<LocalDbVersion> {
    LocalDbVersion::ALL
        .into_iter()
        .filter(|v| probe.is_installed(*v))
        .collect()
}

static INSTALLED: Lazy<Vec<LocalDbVersion>> = Lazy::new(|| {
    let versions = detect_installed(&RegistryProbe);
    tracing::debug!(?versions, "detected installed LocalDB versions");
    versions
});

/// Installed engine versions according to the registry.
///
/// The registry is only consulted on the first call; later calls return the
/// cached list.
#[must_use]
pub fn installed_versions() -> &'static [LocalDbVersion] {
    &INSTALLED
}

/// Probe that answers from the cached registry lookup.
#[derive(Debug, Clone, Copy, Default)]
pub struct CachedRegistryProbe;

impl VersionProbe for CachedRegistryProbe {
    fn is_installed(&self, version: LocalDbVersion) -> bool {
        installed_versions().contains(&version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Only(&'static [LocalDbVersion]);

    impl VersionProbe for Only {
        fn is_installed(&self, version: LocalDbVersion) -> bool {
            self.0.contains(&version)
        }
    }

    #[test]
    fn test_detect_installed_keeps_order() {
        let probe = Only(&[LocalDbVersion::V13, LocalDbVersion::V11]);
        assert_eq!(
            detect_installed(&probe),
            vec![LocalDbVersion::V11, LocalDbVersion::V13]
        );
    }

    #[test]
    fn test_detect_installed_none() {
        assert!(detect_installed(&Only(&[])).is_empty());
    }

    #[test]
    fn test_installed_versions_is_cached() {
        let first = installed_versions();
        let second = installed_versions();
        assert!(std::ptr::eq(first, second));
    }

    #[cfg(not(windows))]
    #[test]
    fn test_registry_probe_off_windows() {
        assert!(installed_versions().is_empty());
        assert!(!CachedRegistryProbe.is_installed(LocalDbVersion::V11));
    }
}
