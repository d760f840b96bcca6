//! AppImage packages, grounded on `handlers/appimage_handler.py`: move into
//! `/opt/AppImages`, symlink into the bin dir, generate a `.desktop` entry.

use async_trait::async_trait;
use tpt_schema::{Error, InstallationDetails};

use super::{Handler, InstallCtx, UninstallCtx};
use crate::desktop;
use crate::exec::SystemCommand;

pub struct AppImageHandler;

#[async_trait]
impl Handler for AppImageHandler {
    async fn install(&self, ctx: &InstallCtx) -> Result<InstallationDetails, Error> {
        let path = ctx
            .artifact_path
            .as_ref()
            .ok_or_else(|| Error::Other("appimage handler requires a downloaded artifact".into()))?;

        let install_dir = ctx.config.opt_dir.join("AppImages");
        let install_path = install_dir.join(format!("{}.AppImage", ctx.descriptor.name));
        let symlink_path = ctx.config.bin_dir.join(&ctx.descriptor.name);

        SystemCommand::new(["mkdir", "-p", &install_dir.to_string_lossy()])
            .as_root(true)
            .run()
            .await?;
        SystemCommand::new(["mv", &path.to_string_lossy(), &install_path.to_string_lossy()])
            .as_root(true)
            .run()
            .await?;
        SystemCommand::new(["chmod", "+x", &install_path.to_string_lossy()])
            .as_root(true)
            .run()
            .await?;
        if symlink_path.exists() || symlink_path.is_symlink() {
            SystemCommand::new(["rm", "-f", &symlink_path.to_string_lossy()])
                .as_root(true)
                .run()
                .await?;
        }
        SystemCommand::new(["ln", "-s", &install_path.to_string_lossy(), &symlink_path.to_string_lossy()])
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

        Ok(InstallationDetails::AppImage {
            binary_path: install_path.to_string_lossy().into_owned(),
            desktop_file,
        })
    }

    async fn uninstall(&self, ctx: &UninstallCtx, details: &InstallationDetails) -> Result<(), Error> {
        let InstallationDetails::AppImage { binary_path, desktop_file } = details else {
            return Err(Error::Other("installation details do not match AppImageHandler".into()));
        };
        let symlink_path = ctx.config.bin_dir.join(&ctx.name);

        for path in [binary_path.as_str(), &symlink_path.to_string_lossy()] {
            if std::path::Path::new(path).exists() || std::path::Path::new(path).is_symlink() {
                SystemCommand::new(["rm", "-f", path]).as_root(true).run().await?;
            }
        }
        desktop::cleanup(desktop_file.as_deref()).await;
        Ok(())
    }
}
