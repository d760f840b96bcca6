//! `.deb` packages via `dpkg`, grounded on `handlers/deb_handler.py`.

use async_trait::async_trait;
use tpt_schema::{Error, InstallationDetails};

use super::{Handler, InstallCtx, UninstallCtx};
use crate::exec::SystemCommand;

pub struct DebHandler;

#[async_trait]
impl Handler for DebHandler {
    async fn install(&self, ctx: &InstallCtx) -> Result<InstallationDetails, Error> {
        let path = ctx
            .artifact_path
            .as_ref()
            .ok_or_else(|| Error::Other("deb handler requires a downloaded artifact".into()))?;

        let install_result = SystemCommand::new(["dpkg", "-i", &path.to_string_lossy()])
            .as_root(true)
            .run()
            .await;

        if install_result.is_err() {
            ctx.reporter
                .warning("dpkg install failed, attempting to repair broken dependencies");
            repair().await;
            install_result?;
        }

        ctx.reporter.info("running apt-get install -f to repair any broken dependencies");
        repair().await;

        Ok(InstallationDetails::Deb {
            package_name: ctx.descriptor.name.clone(),
        })
    }

    async fn uninstall(&self, _ctx: &UninstallCtx, details: &InstallationDetails) -> Result<(), Error> {
        let InstallationDetails::Deb { package_name } = details else {
            return Err(Error::Other("installation details do not match DebHandler".into()));
        };
        SystemCommand::new(["dpkg", "-P", package_name]).as_root(true).run().await?;
        Ok(())
    }
}

/// `apt-get install -f -y`, run once after every install attempt
/// (successful or not) to fix dependencies `dpkg -i` left broken. Failure
/// here is logged, never propagated: the caller already has the real
/// error if the install itself failed.
async fn repair() {
    if crate::exec::check_dependency("apt-get").is_none() {
        tracing::warn!("apt-get not found, skipping dependency repair");
        return;
    }
    if let Err(e) = SystemCommand::new(["apt-get", "install", "-f", "-y"])
        .as_root(true)
        .run()
        .await
    {
        tracing::warn!(error = %e, "apt-get install -f failed; dependencies may still be broken");
    }
}
