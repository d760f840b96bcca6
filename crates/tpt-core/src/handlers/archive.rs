//! Generic tar archives, grounded on `handlers/archive_handler.py`: extract
//! into `/opt/<name>`, find an executable heuristically, symlink it.

use std::path::Path;

use async_trait::async_trait;
use tpt_schema::{Error, InstallationDetails, Metadata};

use super::{Handler, InstallCtx, UninstallCtx};
use crate::desktop;
use crate::exec::SystemCommand;

pub struct ArchiveHandler;

fn tar_flags(filename: &str) -> &'static str {
    if filename.ends_with(".tar.gz") || filename.ends_with(".tgz") {
        "xzf"
    } else if filename.ends_with(".tar.xz") {
        "xJf"
    } else if filename.ends_with(".tar.bz2") {
        "xjf"
    } else {
        "xf"
    }
}

/// `metadata.strip_components`, falling back to `1` (the conventional
/// "drop the single top-level directory a tarball extracts into") when
/// absent.
fn strip_components(metadata: &Metadata) -> u64 {
    metadata.extra.get("strip_components").and_then(|v| v.as_u64()).unwrap_or(1)
}

fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        path.metadata()
            .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        path.is_file()
    }
}

/// Find the package's main executable: first by the app's own name, then
/// in a `bin/` subdirectory, then the first executable file at the top
/// level -- the same three-step heuristic as the original.
fn find_executable(extract_dir: &Path, app_name: &str) -> Option<std::path::PathBuf> {
    let by_name = extract_dir.join(app_name);
    if is_executable(&by_name) {
        return Some(by_name);
    }

    let bin_dir = extract_dir.join("bin");
    if bin_dir.is_dir() {
        if let Ok(entries) = std::fs::read_dir(&bin_dir) {
            for entry in entries.flatten() {
                if is_executable(&entry.path()) {
                    return Some(entry.path());
                }
            }
        }
    }

    if let Ok(entries) = std::fs::read_dir(extract_dir) {
        for entry in entries.flatten() {
            if is_executable(&entry.path()) {
                return Some(entry.path());
            }
        }
    }
    None
}

#[async_trait]
impl Handler for ArchiveHandler {
    async fn install(&self, ctx: &InstallCtx) -> Result<InstallationDetails, Error> {
        let path = ctx
            .artifact_path
            .as_ref()
            .ok_or_else(|| Error::Other("archive handler requires a downloaded artifact".into()))?;

        let extract_dir = ctx.config.opt_dir.join(&ctx.descriptor.name);
        if extract_dir.exists() {
            SystemCommand::new(["rm", "-rf", &extract_dir.to_string_lossy()])
                .as_root(true)
                .run()
                .await?;
        }
        SystemCommand::new(["mkdir", "-p", &extract_dir.to_string_lossy()])
            .as_root(true)
            .run()
            .await?;

        let filename = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let flags = tar_flags(&filename);
        let strip_components = strip_components(&ctx.descriptor.metadata);
        SystemCommand::new([
            "tar",
            flags,
            &path.to_string_lossy(),
            "-C",
            &extract_dir.to_string_lossy(),
            &format!("--strip-components={strip_components}"),
        ])
        .as_root(true)
        .run()
        .await?;

        let executable = find_executable(&extract_dir, &ctx.descriptor.name);
        let symlink_path = if let Some(exe) = &executable {
            let symlink = ctx.config.bin_dir.join(&ctx.descriptor.name);
            if symlink.exists() || symlink.is_symlink() {
                SystemCommand::new(["rm", "-f", &symlink.to_string_lossy()])
                    .as_root(true)
                    .run()
                    .await?;
            }
            SystemCommand::new(["ln", "-s", &exe.to_string_lossy(), &symlink.to_string_lossy()])
                .as_root(true)
                .run()
                .await?;
            Some(symlink)
        } else {
            None
        };

        let desktop_file = desktop::create(
            &ctx.config.applications_dir,
            &ctx.descriptor.name,
            ctx.descriptor.metadata.desktop_entry.as_ref(),
        )
        .await?
        .map(|p| p.to_string_lossy().into_owned());

        let mut manifest_entries = vec![extract_dir.to_string_lossy().into_owned()];
        if let Some(s) = &symlink_path {
            manifest_entries.push(s.to_string_lossy().into_owned());
        }
        if let Some(d) = &desktop_file {
            manifest_entries.push(d.clone());
        }

        Ok(InstallationDetails::Archive {
            install_dir: extract_dir.to_string_lossy().into_owned(),
            manifest_entries,
        })
    }

    async fn uninstall(&self, _ctx: &UninstallCtx, details: &InstallationDetails) -> Result<(), Error> {
        let InstallationDetails::Archive { install_dir, manifest_entries } = details else {
            return Err(Error::Other("installation details do not match ArchiveHandler".into()));
        };
        if Path::new(install_dir).exists() {
            SystemCommand::new(["rm", "-rf", install_dir]).as_root(true).run().await?;
        }
        for entry in manifest_entries {
            let p = Path::new(entry);
            if p != Path::new(install_dir) && (p.exists() || p.is_symlink()) {
                SystemCommand::new(["rm", "-f", entry]).as_root(true).run().await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_tar_flags_by_extension() {
        assert_eq!(tar_flags("foo.tar.gz"), "xzf");
        assert_eq!(tar_flags("foo.tgz"), "xzf");
        assert_eq!(tar_flags("foo.tar.xz"), "xJf");
        assert_eq!(tar_flags("foo.tar.bz2"), "xjf");
        assert_eq!(tar_flags("foo.bin"), "xf");
    }

    #[test]
    fn strip_components_defaults_to_one() {
        assert_eq!(strip_components(&Metadata::default()), 1);
    }

    #[test]
    fn strip_components_honors_metadata_override() {
        let mut metadata = Metadata::default();
        metadata.extra.insert("strip_components".to_string(), serde_json::json!(2));
        assert_eq!(strip_components(&metadata), 2);
    }
}
