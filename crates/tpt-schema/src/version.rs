use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A package version string.
///
/// Upstream packages use a mix of SemVer, PEP-440-ish, and ad-hoc dotted
/// schemes. `Version` stores the original string verbatim (it is what gets
/// written back into the installed-db and shown to the user) and compares by:
///
/// 1. Parsing both sides as [`semver::Version`] when possible.
/// 2. Otherwise falling back to a left-to-right comparison of the leading
///    run of dot-separated numeric components, treating a missing or
///    non-numeric component as `0`.
///
/// Most upstream versions aren't valid SemVer, but nearly all of them start
/// with a dotted-numeric run that sorts correctly under this scheme.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(String);

/// Sentinel used when a package's manifest omits a version entirely.
pub const UNKNOWN_VERSION: &str = "0.0.0";

/// Sentinel used when a handler cannot report an installed version (e.g. a
/// patch applied in place with no version metadata of its own).
pub const CONVENTIONAL_VERSION: &str = "0.0.0-conv";

impl Version {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn unknown() -> Self {
        Self(UNKNOWN_VERSION.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn semver(&self) -> Option<semver::Version> {
        semver::Version::parse(&self.0)
            .ok()
            .or_else(|| semver::Version::parse(&normalize_for_semver(&self.0)).ok())
    }

    fn dotted_numeric(&self) -> Vec<u64> {
        self.0
            .split(|c: char| c == '.' || c == '-' || c == '+' || c == '_')
            .map(|part| part.chars().take_while(|c| c.is_ascii_digit()).collect::<String>())
            .map(|digits| digits.parse::<u64>().unwrap_or(0))
            .collect()
    }
}

/// Strips a leading `v`/`V` and any non-numeric suffix components beyond the
/// first three, which is enough to make most three-part upstream versions
/// parse as SemVer without being a full PEP-440 implementation.
fn normalize_for_semver(s: &str) -> String {
    let s = s.strip_prefix('v').or_else(|| s.strip_prefix('V')).unwrap_or(s);
    let parts: Vec<&str> = s.splitn(4, '.').collect();
    match parts.len() {
        0 => "0.0.0".to_string(),
        1 => format!("{}.0.0", parts[0]),
        2 => format!("{}.{}.0", parts[0], parts[1]),
        _ => format!("{}.{}.{}", parts[0], parts[1], parts[2]),
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Version {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Version {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        if let (Some(a), Some(b)) = (self.semver(), other.semver()) {
            return a.cmp(&b);
        }
        let a = self.dotted_numeric();
        let b = other.dotted_numeric();
        let len = a.len().max(b.len());
        for i in 0..len {
            let ai = a.get(i).copied().unwrap_or(0);
            let bi = b.get(i).copied().unwrap_or(0);
            match ai.cmp(&bi) {
                Ordering::Equal => continue,
                other => return other,
            }
        }
        Ordering::Equal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn semver_compares_normally() {
        assert!(Version::new("1.2.3") < Version::new("1.3.0"));
    }

    #[test]
    fn dotted_fallback_handles_non_semver() {
        assert!(Version::new("2021.10") < Version::new("2021.11"));
    }

    #[test]
    fn v_prefix_is_ignored() {
        assert_eq!(
            Version::new("v1.0.0").cmp(&Version::new("1.0.0")),
            Ordering::Equal
        );
    }

    #[test]
    fn missing_components_treated_as_zero() {
        assert!(Version::new("1.2") < Version::new("1.2.1"));
    }

    #[test]
    fn unknown_sentinel_sorts_lowest() {
        assert!(Version::unknown() < Version::new("0.0.1"));
    }

    #[test]
    fn equal_versions_compare_equal() {
        assert_eq!(Version::new("3.0.0"), Version::new("3.0.0"));
    }
}
