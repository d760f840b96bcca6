//! PowerShell `.ps1` scripts run via `pwsh`, grounded on
//! `handlers/powershell_handler.py`.

use async_trait::async_trait;
use tpt_schema::{Error, InstallationDetails};

use super::{Handler, InstallCtx, UninstallCtx};
use crate::desktop;
use crate::exec::SystemCommand;

pub struct PowershellHandler;

#[async_trait]
impl Handler for PowershellHandler {
    async fn install(&self, ctx: &InstallCtx) -> Result<InstallationDetails, Error> {
        let path = ctx
            .artifact_path
            .as_ref()
            .ok_or_else(|| Error::Other("powershell handler requires a downloaded artifact".into()))?;

        let install_dir = ctx.config.opt_dir.join("tpt_ps1_scripts").join(&ctx.descriptor.name);
        let filename = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let install_path = install_dir.join(&filename);
        let launcher_path = ctx.config.bin_dir.join(&ctx.descriptor.name);

        SystemCommand::new(["mkdir", "-p", &install_dir.to_string_lossy()])
            .as_root(true)
            .run()
            .await?;
        SystemCommand::new(["mv", &path.to_string_lossy(), &install_path.to_string_lossy()])
            .as_root(true)
            .run()
            .await?;

        let launcher_content = format!("#!/bin/sh\npwsh \"{}\" \"$@\"\n", install_path.display());
        SystemCommand::new(["tee", &launcher_path.to_string_lossy()])
            .as_root(true)
            .stdin(launcher_content)
            .run()
            .await?;
        SystemCommand::new(["chmod", "+x", &launcher_path.to_string_lossy()])
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

        Ok(InstallationDetails::Powershell {
            install_dir: install_path.to_string_lossy().into_owned(),
            manifest_entries: [Some(launcher_path.to_string_lossy().into_owned()), desktop_file]
                .into_iter()
                .flatten()
                .collect(),
        })
    }

    async fn uninstall(&self, _ctx: &UninstallCtx, details: &InstallationDetails) -> Result<(), Error> {
        let InstallationDetails::Powershell { install_dir, manifest_entries } = details else {
            return Err(Error::Other("installation details do not match PowershellHandler".into()));
        };
        if let Some(parent) = std::path::Path::new(install_dir).parent() {
            if parent.exists() {
                SystemCommand::new(["rm", "-rf", &parent.to_string_lossy()])
                    .as_root(true)
                    .run()
                    .await?;
            }
        }
        if let Some(launcher) = manifest_entries.first() {
            if std::path::Path::new(launcher).exists() {
                SystemCommand::new(["rm", "-f", launcher]).as_root(true).run().await?;
            }
        }
        desktop::cleanup(manifest_entries.get(1).map(String::as_str)).await;
        Ok(())
    }
}
