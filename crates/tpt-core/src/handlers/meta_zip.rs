//! "Meta" packages: a zip bundling several already-packaged sub-packages
//! plus a manifest naming them, grounded on `handlers/meta_zip_handler.py`.
//!
//! Installing one recurses back into the orchestrator for each entry,
//! which is why [`super::SubInstaller`] exists: this is the one handler
//! that is not a leaf.

use async_trait::async_trait;
use serde::Deserialize;
use tpt_schema::{Error, InstallationDetails, PackageDescriptor};

use super::{Handler, InstallCtx, UninstallCtx};
use crate::exec::SystemCommand;

pub struct MetaZipHandler;

#[derive(Debug, Deserialize)]
struct InnerManifest {
    packages: Vec<InnerPackageEntry>,
}

#[derive(Debug, Deserialize)]
struct InnerPackageEntry {
    #[serde(flatten)]
    descriptor: PackageDescriptor,
    file: String,
}

#[async_trait]
impl Handler for MetaZipHandler {
    async fn install(&self, ctx: &InstallCtx) -> Result<InstallationDetails, Error> {
        let path = ctx
            .artifact_path
            .as_ref()
            .ok_or_else(|| Error::Other("meta_zip handler requires a downloaded artifact".into()))?;
        let sub_installer = ctx
            .sub_installer
            .clone()
            .ok_or_else(|| Error::Other("meta_zip handler requires a sub_installer".into()))?;

        let extract_dir = tempfile::Builder::new().prefix("tpt_meta_").tempdir()?;
        SystemCommand::new(["unzip", &path.to_string_lossy(), "-d", &extract_dir.path().to_string_lossy()])
            .run()
            .await?;

        let manifest_path = extract_dir.path().join("manifest.json");
        let manifest_bytes = tokio::fs::read(&manifest_path).await.map_err(|e| {
            Error::Other(format!("meta_zip is missing an inner manifest.json: {e}"))
        })?;
        let manifest: InnerManifest = serde_json::from_slice(&manifest_bytes)?;

        let mut installed_sub_packages = Vec::new();
        for entry in manifest.packages {
            let sub_path = extract_dir.path().join(&entry.file);
            ctx.reporter.installing(&entry.descriptor.name);

            let mut sub_descriptor = entry.descriptor;
            sub_descriptor.download_url = Some(format!("file://{}", sub_path.display()));

            match sub_installer.install_local_package(&sub_descriptor).await {
                Ok(()) => installed_sub_packages.push(sub_descriptor.name),
                Err(e) => {
                    tracing::warn!(
                        package = %sub_descriptor.name,
                        error = %e,
                        "sub-package install failed, continuing with remaining meta_zip entries"
                    );
                }
            }
        }

        Ok(InstallationDetails::MetaZip { installed_sub_packages })
    }

    async fn uninstall(&self, ctx: &UninstallCtx, details: &InstallationDetails) -> Result<(), Error> {
        let InstallationDetails::MetaZip { installed_sub_packages } = details else {
            return Err(Error::Other("installation details do not match MetaZipHandler".into()));
        };
        let sub_installer = ctx
            .sub_installer
            .clone()
            .ok_or_else(|| Error::Other("meta_zip handler requires a sub_installer".into()))?;

        for name in installed_sub_packages {
            if let Err(e) = sub_installer.uninstall_package(name).await {
                tracing::warn!(package = %name, error = %e, "sub-package uninstall failed, continuing");
            }
        }
        Ok(())
    }
}
