//! LocalDB engine version definitions.

use core::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Registry key under `HKEY_LOCAL_MACHINE` listing installed LocalDB engines.
pub const INSTALLED_VERSIONS_KEY: &str =
    r"SOFTWARE\Microsoft\Microsoft SQL Server Local DB\Installed Versions";

/// LocalDB engine version.
///
/// Each version doubles as the default instance name (`v11.0`, `v12.0`, ...),
/// which is how the classic per-version LocalDB instances are addressed in a
/// `(LocalDB)\v11.0` data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum LocalDbVersion {
    /// LocalDB 11.0 (SQL Server 2012).
    #[default]
    V11,
    /// LocalDB 12.0 (SQL Server 2014).
    V12,
    /// LocalDB 13.0 (SQL Server 2016).
    V13,
    /// LocalDB 14.0 (SQL Server 2017).
    V14,
    /// LocalDB 15.0 (SQL Server 2019).
    V15,
    /// LocalDB 16.0 (SQL Server 2022).
    V16,
}

impl LocalDbVersion {
    /// Every version this crate knows how to detect, oldest first.
    pub const ALL: [Self; 6] = [
        Self::V11,
        Self::V12,
        Self::V13,
        Self::V14,
        Self::V15,
        Self::V16,
    ];

    /// Version string as used in instance names, e.g. `v11.0`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::V11 => "v11.0",
            Self::V12 => "v12.0",
            Self::V13 => "v13.0",
            Self::V14 => "v14.0",
            Self::V15 => "v15.0",
            Self::V16 => "v16.0",
        }
    }

    /// Version number without the `v` prefix, e.g. `11.0`.
    ///
    /// This is the form `sqllocaldb create` expects.
    #[must_use]
    pub const fn number(self) -> &'static str {
        match self {
            Self::V11 => "11.0",
            Self::V12 => "12.0",
            Self::V13 => "13.0",
            Self::V14 => "14.0",
            Self::V15 => "15.0",
            Self::V16 => "16.0",
        }
    }

    /// Major engine version.
    #[must_use]
    pub const fn major(self) -> u8 {
        match self {
            Self::V11 => 11,
            Self::V12 => 12,
            Self::V13 => 13,
            Self::V14 => 14,
            Self::V15 => 15,
            Self::V16 => 16,
        }
    }

    /// Get the SQL Server product name for this engine version.
    #[must_use]
    pub const fn product_name(self) -> &'static str {
        match self {
            Self::V11 => "SQL Server 2012",
            Self::V12 => "SQL Server 2014",
            Self::V13 => "SQL Server 2016",
            Self::V14 => "SQL Server 2017",
            Self::V15 => "SQL Server 2019",
            Self::V16 => "SQL Server 2022",
        }
    }

    /// Registry path (relative to `HKEY_LOCAL_MACHINE`) that exists when this
    /// engine version is installed.
    #[must_use]
    pub fn registry_path(self) -> String {
        format!(r"{}\{}", INSTALLED_VERSIONS_KEY, self.number())
    }

    /// Parse a version from a string representation.
    ///
    /// Accepts `v11.0`, `V11.0` and `11.0`. Returns `None` for anything else.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let number = s
            .strip_prefix('v')
            .or_else(|| s.strip_prefix('V'))
            .unwrap_or(s);
        Self::ALL.into_iter().find(|v| v.number() == number)
    }
}

impl fmt::Display for LocalDbVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LocalDbVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| Error::UnsupportedVersion(s.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_version_strings() {
        assert_eq!(LocalDbVersion::V11.as_str(), "v11.0");
        assert_eq!(LocalDbVersion::V12.as_str(), "v12.0");
        assert_eq!(LocalDbVersion::V13.as_str(), "v13.0");
        assert_eq!(LocalDbVersion::V11.number(), "11.0");
        assert_eq!(LocalDbVersion::V16.major(), 16);
    }

    #[test]
    fn test_default_is_v11() {
        assert_eq!(LocalDbVersion::default(), LocalDbVersion::V11);
    }

    #[test]
    fn test_number_is_version_without_prefix() {
        for version in LocalDbVersion::ALL {
            assert_eq!(version.as_str().replace('v', ""), version.number());
        }
    }

    #[test]
    fn test_parse_accepted_forms() {
        assert_eq!(LocalDbVersion::parse("v11.0"), Some(LocalDbVersion::V11));
        assert_eq!(LocalDbVersion::parse("V12.0"), Some(LocalDbVersion::V12));
        assert_eq!(LocalDbVersion::parse("13.0"), Some(LocalDbVersion::V13));
        assert_eq!(LocalDbVersion::parse(" v15.0 "), Some(LocalDbVersion::V15));
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert_eq!(LocalDbVersion::parse("vBad"), None);
        assert_eq!(LocalDbVersion::parse("v10.0"), None);
        assert_eq!(LocalDbVersion::parse("v11"), None);
        assert_eq!(LocalDbVersion::parse(""), None);
    }

    #[test]
    fn test_from_str_error() {
        let err = "vBad".parse::<LocalDbVersion>().unwrap_err();
        assert!(matches!(err, Error::UnsupportedVersion(ref s) if s == "vBad"));

        let version: LocalDbVersion = "v13.0".parse().unwrap();
        assert_eq!(version, LocalDbVersion::V13);
    }

    #[test]
    fn test_registry_path() {
        assert_eq!(
            LocalDbVersion::V11.registry_path(),
            r"SOFTWARE\Microsoft\Microsoft SQL Server Local DB\Installed Versions\11.0"
        );
    }

    #[test]
    fn test_display_roundtrip() {
        for version in LocalDbVersion::ALL {
            assert_eq!(version.to_string().parse::<LocalDbVersion>().unwrap(), version);
        }
    }

    #[test]
    fn test_product_names() {
        assert_eq!(LocalDbVersion::V11.product_name(), "SQL Server 2012");
        assert_eq!(LocalDbVersion::V16.product_name(), "SQL Server 2022");
    }
}
