use serde::{Deserialize, Serialize};

/// The package format a [`crate::package::PackageDescriptor`] names, and the
/// tag the orchestrator dispatches on to pick a handler.
///
/// Closed: adding a new format means adding a variant here, a matching
/// handler impl, and a matching [`crate::installed::InstallationDetails`]
/// variant -- the compiler enforces all three stay in sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    Deb,
    DebXz,
    Script,
    AppImage,
    Archive,
    Rpm,
    Flatpak,
    Snap,
    AlpineApk,
    AndroidApk,
    Exe,
    Msi,
    Powershell,
    NemasPatchZip,
    MetaZip,
}

impl Format {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deb => "deb",
            Self::DebXz => "deb_xz",
            Self::Script => "script",
            Self::AppImage => "appimage",
            Self::Archive => "archive",
            Self::Rpm => "rpm",
            Self::Flatpak => "flatpak",
            Self::Snap => "snap",
            Self::AlpineApk => "alpine_apk",
            Self::AndroidApk => "android_apk",
            Self::Exe => "exe",
            Self::Msi => "msi",
            Self::Powershell => "powershell",
            Self::NemasPatchZip => "nemas_patch_zip",
            Self::MetaZip => "meta_zip",
        }
    }

    /// Whether this format's handler is unable to uninstall what it
    /// installs (an explicit documented contract, not a bug: patch zips
    /// overwrite files in place with no record of what they replaced).
    pub fn supports_uninstall(self) -> bool {
        !matches!(self, Self::NemasPatchZip)
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a [`crate::package::PackageDescriptor`] was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Tpt,
    Apt,
    Flatpak,
    Snap,
    Convention,
    Git,
}

impl Default for Source {
    /// A repository manifest entry with no explicit `source` is always
    /// `tpt` -- the field only varies for descriptors the resolver builds
    /// itself from the apt/flatpak/snap backends.
    fn default() -> Self {
        Self::Tpt
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Tpt => "tpt",
            Self::Apt => "apt",
            Self::Flatpak => "flatpak",
            Self::Snap => "snap",
            Self::Convention => "convention",
            Self::Git => "git",
        };
        write!(f, "{s}")
    }
}

/// The native package manager driving a `sys_update` AADPO action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NativeManager {
    Apt,
    Flatpak,
    Snap,
}

impl std::fmt::Display for NativeManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Apt => "apt",
            Self::Flatpak => "flatpak",
            Self::Snap => "snap",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_round_trips_through_json() {
        let f = Format::AndroidApk;
        let json = serde_json::to_string(&f).unwrap();
        assert_eq!(json, "\"android_apk\"");
        let back: Format = serde_json::from_str(&json).unwrap();
        assert_eq!(back, f);
    }

    #[test]
    fn patch_zip_does_not_support_uninstall() {
        assert!(!Format::NemasPatchZip.supports_uninstall());
        assert!(Format::Deb.supports_uninstall());
    }
}
