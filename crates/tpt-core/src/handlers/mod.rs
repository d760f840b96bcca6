//! Package-format handlers.
//!
//! One `Handler` trait, one small struct per format, dispatched on
//! [`tpt_schema::Format`] -- the same shape as
//! `apl_core::strategies::Strategy`, generalized from "fetch build
//! artifacts for one of a handful of source kinds" to "install/uninstall
//! one of fifteen package formats."

mod alpine_apk;
mod android_apk;
mod appimage;
mod archive;
mod deb;
mod deb_xz;
mod exe;
mod flatpak;
mod meta_zip;
mod msi;
mod nemas_patch_zip;
mod powershell;
mod rpm;
mod script;
mod snap;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tpt_schema::{Error, Format, InstallationDetails, PackageDescriptor};

use crate::config::Config;
use crate::reporter::Reporter;

/// Lets [`meta_zip`] install and uninstall the sub-packages it unpacks
/// without `handlers` depending on `orchestrator` (which depends on
/// `handlers` for [`dispatch`]). The orchestrator's `PackageManager`
/// implements this and hands itself in as an `Arc<dyn SubInstaller>`.
#[async_trait]
pub trait SubInstaller: Send + Sync {
    async fn install_local_package(&self, descriptor: &PackageDescriptor) -> Result<(), Error>;

    async fn uninstall_package(&self, name: &str) -> Result<(), Error>;
}

/// Everything a handler needs to install a package: the resolved
/// descriptor, the downloaded artifact (when the format needs one), and
/// the shared config/reporter.
pub struct InstallCtx {
    pub descriptor: PackageDescriptor,
    pub artifact_path: Option<PathBuf>,
    pub config: Arc<Config>,
    pub reporter: Arc<dyn Reporter>,
    /// Only populated for handlers that need to recurse back into the
    /// orchestrator (currently just `meta_zip`).
    pub sub_installer: Option<Arc<dyn SubInstaller>>,
}

/// Everything a handler needs to uninstall a package: its name and the
/// bookkeeping it returned from `install`.
pub struct UninstallCtx {
    pub name: String,
    pub config: Arc<Config>,
    pub reporter: Arc<dyn Reporter>,
    pub sub_installer: Option<Arc<dyn SubInstaller>>,
}

#[async_trait]
pub trait Handler: Send + Sync {
    async fn install(&self, ctx: &InstallCtx) -> Result<InstallationDetails, Error>;

    async fn uninstall(&self, ctx: &UninstallCtx, details: &InstallationDetails) -> Result<(), Error>;
}

/// Resolve a format tag to its handler implementation. `install_packages`
/// (in `orchestrator`) calls this once per package after the artifact (if
/// any) has been downloaded.
///
/// # Errors
///
/// Returns [`Error::UnsupportedFormat`] for a format with no registered
/// handler (there is currently one for every [`Format`] variant, so this
/// is unreachable in practice but kept as a closed `match` arm rather than
/// a `_ => unreachable!()` so a future format addition fails loudly here
/// instead of panicking at dispatch time).
pub fn dispatch(format: Format) -> Result<Box<dyn Handler>, Error> {
    Ok(match format {
        Format::Deb => Box::new(deb::DebHandler),
        Format::DebXz => Box::new(deb_xz::DebXzHandler),
        Format::Script => Box::new(script::ScriptHandler),
        Format::AppImage => Box::new(appimage::AppImageHandler),
        Format::Archive => Box::new(archive::ArchiveHandler),
        Format::Rpm => Box::new(rpm::RpmHandler),
        Format::Flatpak => Box::new(flatpak::FlatpakHandler),
        Format::Snap => Box::new(snap::SnapHandler),
        Format::AlpineApk => Box::new(alpine_apk::AlpineApkHandler),
        Format::AndroidApk => Box::new(android_apk::AndroidApkHandler),
        Format::Exe => Box::new(exe::ExeHandler),
        Format::Msi => Box::new(msi::MsiHandler),
        Format::Powershell => Box::new(powershell::PowershellHandler),
        Format::NemasPatchZip => Box::new(nemas_patch_zip::NemasPatchZipHandler),
        Format::MetaZip => Box::new(meta_zip::MetaZipHandler),
    })
}

/// Infer a format from a download URL's suffix when a descriptor doesn't
/// name one explicitly, compound suffixes first so `.deb.xz`/`.tar.gz`/
/// `.tar.xz` don't get shadowed by a bare `.xz`/`.gz` rule that doesn't
/// exist here anyway -- listed in the same order `core/package_manager.py`'s
/// `handler_map` tries them.
pub fn infer_format(url: &str) -> Option<Format> {
    const RULES: &[(&str, Format)] = &[
        (".deb.xz", Format::DebXz),
        (".tar.gz", Format::Archive),
        (".tar.xz", Format::Archive),
        (".tgz", Format::Archive),
        (".deb", Format::Deb),
        (".sh", Format::Script),
        (".py", Format::Script),
        (".appimage", Format::AppImage),
        (".rpm", Format::Rpm),
        (".ps1", Format::Powershell),
        (".exe", Format::Exe),
        (".msi", Format::Msi),
        (".apk", Format::AndroidApk),
    ];
    let lower = url.to_lowercase();
    RULES.iter().find(|(suffix, _)| lower.ends_with(suffix)).map(|(_, f)| *f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_covers_every_format() {
        for format in [
            Format::Deb,
            Format::DebXz,
            Format::Script,
            Format::AppImage,
            Format::Archive,
            Format::Rpm,
            Format::Flatpak,
            Format::Snap,
            Format::AlpineApk,
            Format::AndroidApk,
            Format::Exe,
            Format::Msi,
            Format::Powershell,
            Format::NemasPatchZip,
            Format::MetaZip,
        ] {
            assert!(dispatch(format).is_ok());
        }
    }

    #[test]
    fn infer_format_prefers_compound_suffixes() {
        assert_eq!(infer_format("https://x/app.deb.xz"), Some(Format::DebXz));
        assert_eq!(infer_format("https://x/app.tar.gz"), Some(Format::Archive));
        assert_eq!(infer_format("https://x/app.deb"), Some(Format::Deb));
        assert_eq!(infer_format("https://x/app.unknown"), None);
    }
}
