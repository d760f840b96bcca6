//! Alpine Linux `.apk` packages, grounded on
//! `handlers/alpine_apk_handler.py`. Only functional on Alpine itself,
//! guarded by the presence of `/etc/alpine-release`.

use async_trait::async_trait;
use tpt_schema::{Error, InstallationDetails};

use super::{Handler, InstallCtx, UninstallCtx};
use crate::exec::{check_dependency, SystemCommand};

pub struct AlpineApkHandler;

fn ensure_alpine() -> Result<(), Error> {
    if !std::path::Path::new("/etc/alpine-release").exists() {
        return Err(Error::Other("this system is not Alpine Linux; AlpineApkHandler cannot operate".into()));
    }
    if check_dependency("apk").is_none() {
        return Err(Error::MissingDependency("apk".into()));
    }
    Ok(())
}

#[async_trait]
impl Handler for AlpineApkHandler {
    async fn install(&self, ctx: &InstallCtx) -> Result<InstallationDetails, Error> {
        ensure_alpine()?;
        let package_name = ctx.descriptor.name.clone();

        let command = if let Some(path) = &ctx.artifact_path {
            vec!["apk".to_string(), "add".to_string(), "--allow-untrusted".to_string(), path.to_string_lossy().into_owned()]
        } else {
            vec!["apk".to_string(), "add".to_string(), package_name.clone()]
        };
        SystemCommand::new(command).as_root(true).run().await?;

        Ok(InstallationDetails::AlpineApk { package_name })
    }

    async fn uninstall(&self, _ctx: &UninstallCtx, details: &InstallationDetails) -> Result<(), Error> {
        ensure_alpine()?;
        let InstallationDetails::AlpineApk { package_name } = details else {
            return Err(Error::Other("installation details do not match AlpineApkHandler".into()));
        };
        SystemCommand::new(["apk", "del", package_name]).as_root(true).run().await?;
        Ok(())
    }
}
