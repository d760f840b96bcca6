//! Snap packages, grounded on `handlers/snap_handler.py`.

use async_trait::async_trait;
use tpt_schema::{Error, InstallationDetails};

use super::{Handler, InstallCtx, UninstallCtx};
use crate::exec::SystemCommand;

pub struct SnapHandler;

#[async_trait]
impl Handler for SnapHandler {
    async fn install(&self, ctx: &InstallCtx) -> Result<InstallationDetails, Error> {
        let snap_name = ctx.descriptor.name.clone();
        let mut argv = vec!["snap".to_string(), "install".to_string(), snap_name.clone()];

        if let Some(channel) = &ctx.descriptor.metadata.channel {
            argv.push("--channel".to_string());
            argv.push(channel.clone());
        }
        let classic = ctx.descriptor.metadata.classic;
        if classic {
            ctx.reporter
                .warning("this snap requires classic confinement, granting broader system access");
            argv.push("--classic".to_string());
        }

        SystemCommand::new(argv).as_root(true).run().await?;

        Ok(InstallationDetails::Snap { snap_name, classic })
    }

    async fn uninstall(&self, _ctx: &UninstallCtx, details: &InstallationDetails) -> Result<(), Error> {
        let InstallationDetails::Snap { snap_name, .. } = details else {
            return Err(Error::Other("installation details do not match SnapHandler".into()));
        };
        SystemCommand::new(["snap", "remove", snap_name]).as_root(true).run().await?;
        Ok(())
    }
}
