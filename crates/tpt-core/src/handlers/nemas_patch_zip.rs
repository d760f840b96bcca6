//! "Nemas" patches: a zip containing an executable script, run once and
//! discarded. Grounded on `handlers/nemas_patch_zip_handler.py`.
//!
//! Patches overwrite files in place with no record of what they touched,
//! so -- unlike every other handler -- this one does not support uninstall;
//! see [`tpt_schema::Format::supports_uninstall`].

use async_trait::async_trait;
use tpt_schema::{Error, InstallationDetails};

use super::{Handler, InstallCtx, UninstallCtx};
use crate::exec::SystemCommand;

pub struct NemasPatchZipHandler;

fn find_patch_script(extract_dir: &std::path::Path) -> Option<std::path::PathBuf> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        for entry in walkdir::WalkDir::new(extract_dir).into_iter().flatten() {
            let path = entry.path();
            if let Ok(meta) = path.metadata() {
                if meta.is_file() && meta.permissions().mode() & 0o111 != 0 {
                    return Some(path.to_path_buf());
                }
            }
        }
        None
    }
    #[cfg(not(unix))]
    {
        None
    }
}

#[async_trait]
impl Handler for NemasPatchZipHandler {
    async fn install(&self, ctx: &InstallCtx) -> Result<InstallationDetails, Error> {
        let path = ctx
            .artifact_path
            .as_ref()
            .ok_or_else(|| Error::Other("nemas_patch_zip handler requires a downloaded artifact".into()))?;

        let extract_dir = tempfile::Builder::new().prefix("tpt_patch_").tempdir()?;
        SystemCommand::new(["unzip", &path.to_string_lossy(), "-d", &extract_dir.path().to_string_lossy()])
            .run()
            .await?;

        let patch_script = find_patch_script(extract_dir.path())
            .ok_or_else(|| Error::Other("no executable script found inside the patch .zip".into()))?;

        ctx.reporter.info("running patch script");
        SystemCommand::new([patch_script.to_string_lossy().into_owned()])
            .as_root(true)
            .cwd(extract_dir.path())
            .run()
            .await?;

        Ok(InstallationDetails::NemasPatchZip {
            applied_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    async fn uninstall(&self, _ctx: &UninstallCtx, _details: &InstallationDetails) -> Result<(), Error> {
        Err(Error::UnsupportedFormat(
            "nemas_patch_zip packages cannot be uninstalled automatically; revert manually if needed".into(),
        ))
    }
}
