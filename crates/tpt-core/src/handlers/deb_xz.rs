//! `.deb.xz` packages: decompress then delegate to [`super::deb::DebHandler`],
//! grounded on `handlers/deb_xz_handler.py`.

use async_trait::async_trait;
use tpt_schema::{Error, InstallationDetails};

use super::deb::DebHandler;
use super::{Handler, InstallCtx, UninstallCtx};
use crate::exec::SystemCommand;

pub struct DebXzHandler;

#[async_trait]
impl Handler for DebXzHandler {
    async fn install(&self, ctx: &InstallCtx) -> Result<InstallationDetails, Error> {
        let path = ctx
            .artifact_path
            .as_ref()
            .ok_or_else(|| Error::Other("deb_xz handler requires a downloaded artifact".into()))?;

        SystemCommand::new(["unxz", &path.to_string_lossy()]).run().await?;

        let decompressed = path.with_extension("");
        let inner_ctx = InstallCtx {
            descriptor: ctx.descriptor.clone(),
            artifact_path: Some(decompressed),
            config: ctx.config.clone(),
            reporter: ctx.reporter.clone(),
            sub_installer: ctx.sub_installer.clone(),
        };
        // The decompressed path replaces the original `.xz` artifact; the
        // rest of the install is handled identically to a plain `.deb`.
        DebHandler.install(&inner_ctx).await
    }

    async fn uninstall(&self, ctx: &UninstallCtx, details: &InstallationDetails) -> Result<(), Error> {
        // Uninstall is handled directly by DebHandler via the stored
        // installation details; this handler is never invoked for
        // uninstall in practice (matches the original's explicit
        // NotImplementedError), but delegates rather than panics.
        DebHandler.uninstall(ctx, details).await
    }
}
