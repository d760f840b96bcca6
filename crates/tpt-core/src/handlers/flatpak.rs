//! Flatpak applications, grounded on `handlers/flatpak_handler.py`.
//!
//! Flatpak installs `--user`, so unlike most other handlers this one never
//! runs its commands as root.

use async_trait::async_trait;
use tpt_schema::{Error, InstallationDetails};

use super::{Handler, InstallCtx, UninstallCtx};
use crate::exec::SystemCommand;

pub struct FlatpakHandler;

#[async_trait]
impl Handler for FlatpakHandler {
    async fn install(&self, ctx: &InstallCtx) -> Result<InstallationDetails, Error> {
        let app_id = ctx
            .descriptor
            .metadata
            .app_id
            .clone()
            .ok_or_else(|| Error::Other("flatpak package metadata is missing 'app_id'".into()))?;
        let remote = ctx.descriptor.metadata.remote.clone().unwrap_or_else(|| "flathub".to_string());

        SystemCommand::new(["flatpak", "install", "--user", "--noninteractive", &remote, &app_id])
            .run()
            .await?;

        Ok(InstallationDetails::Flatpak { app_id, remote })
    }

    async fn uninstall(&self, _ctx: &UninstallCtx, details: &InstallationDetails) -> Result<(), Error> {
        let InstallationDetails::Flatpak { app_id, .. } = details else {
            return Err(Error::Other("installation details do not match FlatpakHandler".into()));
        };
        SystemCommand::new(["flatpak", "uninstall", "--user", "--noninteractive", app_id])
            .run()
            .await?;
        Ok(())
    }
}
