//! Standalone executable scripts, grounded on `handlers/script_handler.py`.

use async_trait::async_trait;
use tpt_schema::{Error, InstallationDetails};

use super::{Handler, InstallCtx, UninstallCtx};
use crate::desktop;
use crate::exec::SystemCommand;

pub struct ScriptHandler;

#[async_trait]
impl Handler for ScriptHandler {
    async fn install(&self, ctx: &InstallCtx) -> Result<InstallationDetails, Error> {
        let path = ctx
            .artifact_path
            .as_ref()
            .ok_or_else(|| Error::Other("script handler requires a downloaded artifact".into()))?;
        let install_path = ctx.config.bin_dir.join(&ctx.descriptor.name);

        SystemCommand::new(["mv", &path.to_string_lossy(), &install_path.to_string_lossy()])
            .as_root(true)
            .run()
            .await?;
        SystemCommand::new(["chmod", "+x", &install_path.to_string_lossy()])
            .as_root(true)
            .run()
            .await?;

        let desktop_file = desktop::create(
            &ctx.config.applications_dir,
            &ctx.descriptor.name,
            ctx.descriptor.metadata.desktop_entry.as_ref(),
        )
        .await?
        .map(|p| p.to_string_lossy().into_owned());

        Ok(InstallationDetails::Script {
            install_dir: install_path.to_string_lossy().into_owned(),
            manifest_entries: desktop_file.into_iter().collect(),
        })
    }

    async fn uninstall(&self, _ctx: &UninstallCtx, details: &InstallationDetails) -> Result<(), Error> {
        let InstallationDetails::Script { install_dir, manifest_entries } = details else {
            return Err(Error::Other("installation details do not match ScriptHandler".into()));
        };
        if std::path::Path::new(install_dir).exists() {
            SystemCommand::new(["rm", "-f", install_dir]).as_root(true).run().await?;
        }
        desktop::cleanup(manifest_entries.first().map(String::as_str)).await;
        Ok(())
    }
}
