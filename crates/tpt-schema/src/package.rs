use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::handler::{Format, Source};
use crate::hash::Sha256Hex;
use crate::version::Version;

/// A package name as it appears in a repository manifest, the installed-db,
/// and on the command line. Not newtyped beyond a plain `String` alias: the
/// spec treats it as an opaque key, and a newtype would buy nothing over
/// the extra `.as_str()` noise at every call site.
pub type PackageName = String;

/// Everything TPT knows about a package before it is installed: the result
/// of a resolver lookup or a manifest-file entry.
///
/// `name` and `source` default when absent so a [`RepositoryManifest`]'s
/// object-keyed wire form -- where the name is the map key and every entry
/// is implicitly `tpt`-sourced -- deserializes straight into this type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageDescriptor {
    #[serde(default)]
    pub name: PackageName,
    #[serde(default = "Version::unknown")]
    pub version: Version,
    #[serde(default)]
    pub source: Source,
    #[serde(default)]
    pub format: Option<Format>,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub sha256: Option<Sha256Hex>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub repository_url: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Handler-specific hints carried alongside a descriptor. Every field is
/// optional because only the handler named by `format` reads its own
/// subset; the rest are `None` for any given package. Unknown manifest
/// fields are kept in `extra` rather than rejected, so a repository ahead
/// of this binary's schema version still loads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    /// Flatpak application id, e.g. `org.gnome.Calculator`.
    #[serde(default)]
    pub app_id: Option<String>,
    /// Flatpak remote name, defaults to `flathub` when format is `flatpak`.
    #[serde(default)]
    pub remote: Option<String>,
    /// Snap channel, e.g. `stable`, `edge`.
    #[serde(default)]
    pub channel: Option<String>,
    /// Whether a snap needs `--classic` confinement.
    #[serde(default)]
    pub classic: bool,
    /// Arguments appended to a silent Windows installer invocation.
    #[serde(default)]
    pub silent_args: Option<Vec<String>>,
    /// `.desktop` entry fields to generate after install.
    #[serde(default)]
    pub desktop_entry: Option<DesktopEntrySpec>,
    /// Path inside an archive/zip to the Android `.apk` to install via
    /// Waydroid.
    #[serde(default)]
    pub apk_path: Option<String>,
    /// Path inside a `meta_zip` archive to its inner `manifest.json`.
    #[serde(default)]
    pub inner_manifest: Option<String>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Fields used by the Desktop-file helper to generate a `.desktop` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesktopEntrySpec {
    pub name: String,
    #[serde(default)]
    pub comment: String,
    pub exec: String,
    #[serde(default = "default_icon")]
    pub icon: String,
    #[serde(default)]
    pub terminal: bool,
    #[serde(default = "default_categories")]
    pub categories: String,
}

fn default_icon() -> String {
    "application-x-executable".to_string()
}

fn default_categories() -> String {
    "Utility;".to_string()
}

/// The wire format of a repository's `packages.json`: a flat list of
/// descriptors plus a schema version the Manifest Fetcher checks before
/// trusting the rest of the file.
///
/// Deserializing also accepts the older object-keyed form
/// (`{"repository_name", "last_updated", "packages": {"<name>": {...}}}`),
/// normalizing it to this shape with `source` defaulted to `tpt` and
/// `schema_version` defaulted to 1. Emission always produces the canonical
/// array form; only reading tolerates the variant.
#[derive(Debug, Clone, Serialize)]
pub struct RepositoryManifest {
    pub schema_version: u32,
    pub packages: Vec<PackageDescriptor>,
}

impl<'de> Deserialize<'de> for RepositoryManifest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Canonical {
                schema_version: u32,
                packages: Vec<PackageDescriptor>,
            },
            ObjectKeyed {
                #[serde(default)]
                #[allow(dead_code)]
                repository_name: Option<String>,
                #[serde(default)]
                #[allow(dead_code)]
                last_updated: Option<String>,
                packages: HashMap<PackageName, PackageDescriptor>,
            },
        }

        Ok(match Wire::deserialize(deserializer)? {
            Wire::Canonical { schema_version, packages } => {
                RepositoryManifest { schema_version, packages }
            }
            Wire::ObjectKeyed { packages, .. } => {
                let packages = packages
                    .into_iter()
                    .map(|(name, mut descriptor)| {
                        descriptor.name = name;
                        descriptor.source = Source::Tpt;
                        descriptor
                    })
                    .collect();
                RepositoryManifest { schema_version: 1, packages }
            }
        })
    }
}

impl RepositoryManifest {
    pub fn index_by_name(&self) -> HashMap<&str, &PackageDescriptor> {
        self.packages.iter().map(|p| (p.name.as_str(), p)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_defaults_version_when_absent() {
        let json = r#"{"name":"foo","source":"tpt"}"#;
        let d: PackageDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(d.version, Version::unknown());
        assert!(d.format.is_none());
    }

    #[test]
    fn unknown_metadata_fields_are_kept_in_extra() {
        let json = r#"{"app_id":"org.foo.Bar","future_field":true}"#;
        let m: Metadata = serde_json::from_str(json).unwrap();
        assert_eq!(m.app_id.as_deref(), Some("org.foo.Bar"));
        assert_eq!(m.extra.get("future_field").unwrap(), true);
    }

    #[test]
    fn manifest_indexes_by_name() {
        let manifest = RepositoryManifest {
            schema_version: 1,
            packages: vec![PackageDescriptor {
                name: "foo".into(),
                version: Version::unknown(),
                source: Source::Tpt,
                format: None,
                download_url: None,
                sha256: None,
                description: String::new(),
                keywords: vec![],
                repository_url: None,
                metadata: Metadata::default(),
            }],
        };
        let idx = manifest.index_by_name();
        assert!(idx.contains_key("foo"));
    }

    #[test]
    fn manifest_accepts_object_keyed_wire_form() {
        let json = r#"{
            "repository_name": "example",
            "last_updated": "2024-01-01T00:00:00Z",
            "packages": {
                "foo": {
                    "version": "1.2.3",
                    "description": "a package",
                    "download_url": "https://example.com/foo.deb",
                    "format": "deb"
                }
            }
        }"#;
        let manifest: RepositoryManifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.packages.len(), 1);
        let pkg = &manifest.packages[0];
        assert_eq!(pkg.name, "foo");
        assert_eq!(pkg.source, Source::Tpt);
        assert_eq!(pkg.format, Some(Format::Deb));
    }

    #[test]
    fn manifest_still_accepts_canonical_array_form() {
        let json = r#"{"schema_version":1,"packages":[{"name":"foo","source":"tpt"}]}"#;
        let manifest: RepositoryManifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.schema_version, 1);
        assert_eq!(manifest.packages.len(), 1);
    }
}
