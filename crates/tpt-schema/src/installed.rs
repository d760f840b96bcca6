use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::handler::{Format, Source};
use crate::package::PackageName;
use crate::version::Version;

/// One entry in the installed-db, keyed by package name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstalledRecord {
    pub version: Version,
    pub source: Source,
    #[serde(default)]
    pub repository_url: Option<String>,
    pub installation_details: InstallationDetails,
}

/// The handler-specific bookkeeping `uninstall` needs later, expressed as a
/// sum type so the set of fields a given handler may persist is closed and
/// checked at compile time instead of being an untyped JSON blob with a
/// runtime-enforced schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "handler", rename_all = "snake_case")]
pub enum InstallationDetails {
    Deb { package_name: String },
    DebXz { package_name: String },
    Script { install_dir: String, manifest_entries: Vec<String> },
    AppImage { binary_path: String, desktop_file: Option<String> },
    Archive { install_dir: String, manifest_entries: Vec<String> },
    Rpm { package_name: String },
    Flatpak { app_id: String, remote: String },
    Snap { snap_name: String, classic: bool },
    AlpineApk { package_name: String },
    AndroidApk { package_name: String },
    Exe {
        wineprefix: String,
        launcher_path: String,
        desktop_file: Option<String>,
        uninstall_as_root: bool,
    },
    Msi {
        wineprefix: String,
        launcher_path: String,
        desktop_file: Option<String>,
        uninstall_as_root: bool,
    },
    Powershell { install_dir: String, manifest_entries: Vec<String> },
    /// Patch zips overwrite files in place and do not support uninstall;
    /// this variant exists so the record still exists for `list` and
    /// `upgrade`, even though no `Handler::uninstall` ever consumes it.
    NemasPatchZip { applied_at: String },
    MetaZip { installed_sub_packages: Vec<PackageName> },
}

impl InstallationDetails {
    /// The handler that produced this record, so `uninstall` can dispatch
    /// without consulting the (possibly stale) descriptor the package was
    /// originally installed from.
    pub fn handler_tag(&self) -> Format {
        match self {
            Self::Deb { .. } => Format::Deb,
            Self::DebXz { .. } => Format::DebXz,
            Self::Script { .. } => Format::Script,
            Self::AppImage { .. } => Format::AppImage,
            Self::Archive { .. } => Format::Archive,
            Self::Rpm { .. } => Format::Rpm,
            Self::Flatpak { .. } => Format::Flatpak,
            Self::Snap { .. } => Format::Snap,
            Self::AlpineApk { .. } => Format::AlpineApk,
            Self::AndroidApk { .. } => Format::AndroidApk,
            Self::Exe { .. } => Format::Exe,
            Self::Msi { .. } => Format::Msi,
            Self::Powershell { .. } => Format::Powershell,
            Self::NemasPatchZip { .. } => Format::NemasPatchZip,
            Self::MetaZip { .. } => Format::MetaZip,
        }
    }
}

/// The on-disk shape of the installed-db file: a flat map, pretty-printed,
/// written via a temp-file-then-rename so a crash mid-write never leaves a
/// truncated file in place.
pub type InstalledDb = HashMap<PackageName, InstalledRecord>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn installation_details_round_trip_flatpak() {
        let d = InstallationDetails::Flatpak {
            app_id: "org.gnome.Calculator".into(),
            remote: "flathub".into(),
        };
        let json = serde_json::to_string(&d).unwrap();
        assert!(json.contains("\"handler\":\"flatpak\""));
        let back: InstallationDetails = serde_json::from_str(&json).unwrap();
        match back {
            InstallationDetails::Flatpak { app_id, remote } => {
                assert_eq!(app_id, "org.gnome.Calculator");
                assert_eq!(remote, "flathub");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn handler_tag_matches_variant() {
        let d = InstallationDetails::Snap { snap_name: "foo".into(), classic: false };
        assert_eq!(d.handler_tag(), crate::handler::Format::Snap);
    }

    #[test]
    fn meta_zip_lists_installed_sub_packages() {
        let d = InstallationDetails::MetaZip {
            installed_sub_packages: vec!["foo".into(), "bar".into()],
        };
        let json = serde_json::to_string(&d).unwrap();
        let back: InstallationDetails = serde_json::from_str(&json).unwrap();
        match back {
            InstallationDetails::MetaZip { installed_sub_packages } => {
                assert_eq!(installed_sub_packages, vec!["foo", "bar"]);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
