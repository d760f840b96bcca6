//! Windows `.exe` installers run through Wine, grounded on
//! `handlers/exe_handler.py`.

use async_trait::async_trait;
use tpt_schema::{Error, InstallationDetails};

use super::{Handler, InstallCtx, UninstallCtx};
use crate::desktop;
use crate::exec::SystemCommand;

pub struct ExeHandler;

#[async_trait]
impl Handler for ExeHandler {
    async fn install(&self, ctx: &InstallCtx) -> Result<InstallationDetails, Error> {
        let path = ctx
            .artifact_path
            .as_ref()
            .ok_or_else(|| Error::Other("exe handler requires a downloaded artifact".into()))?;

        let silent_args = ctx
            .descriptor
            .metadata
            .silent_args
            .clone()
            .ok_or_else(|| Error::Other("exe package metadata is missing 'silent_args'".into()))?;
        let exe_in_prefix = ctx
            .descriptor
            .metadata
            .extra
            .get("executable_path_in_prefix")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Other("exe package metadata is missing 'executable_path_in_prefix'".into()))?
            .to_string();

        let wine_prefix = ctx.config.wine_prefix_dir().join(&ctx.descriptor.name);
        tokio::fs::create_dir_all(wine_prefix.parent().unwrap_or(&wine_prefix)).await?;

        SystemCommand::new(["wineboot", "-u"])
            .env("WINEPREFIX", wine_prefix.to_string_lossy())
            .env("WINEDEBUG", "-all")
            .run()
            .await?;

        let mut install_argv = vec!["wine".to_string(), path.to_string_lossy().into_owned()];
        install_argv.extend(silent_args);
        SystemCommand::new(install_argv)
            .env("WINEPREFIX", wine_prefix.to_string_lossy())
            .env("WINEDEBUG", "-all")
            .run()
            .await?;

        let launcher_path = create_launcher(ctx, &wine_prefix, &exe_in_prefix).await?;
        let desktop_file = desktop::create(
            &ctx.config.applications_dir,
            &ctx.descriptor.name,
            ctx.descriptor.metadata.desktop_entry.as_ref(),
        )
        .await?
        .map(|p| p.to_string_lossy().into_owned());

        Ok(InstallationDetails::Exe {
            wineprefix: wine_prefix.to_string_lossy().into_owned(),
            launcher_path: launcher_path.to_string_lossy().into_owned(),
            desktop_file,
            uninstall_as_root: wine_prefix.to_string_lossy().starts_with("/var/lib"),
        })
    }

    async fn uninstall(&self, _ctx: &UninstallCtx, details: &InstallationDetails) -> Result<(), Error> {
        let InstallationDetails::Exe { wineprefix, launcher_path, desktop_file, uninstall_as_root } = details else {
            return Err(Error::Other("installation details do not match ExeHandler".into()));
        };
        uninstall_wine_app(wineprefix, launcher_path, *uninstall_as_root).await?;
        desktop::cleanup(desktop_file.as_deref()).await;
        Ok(())
    }
}

async fn create_launcher(
    ctx: &InstallCtx,
    wine_prefix: &std::path::Path,
    exe_in_prefix: &str,
) -> Result<std::path::PathBuf, Error> {
    let launcher_path = ctx.config.bin_dir.join(&ctx.descriptor.name);
    let full_exe_path = wine_prefix.join(exe_in_prefix);
    let script = format!(
        "#!/bin/sh\nexport WINEPREFIX='{}'\nexport WINEDEBUG='-all'\nwine \"{}\" \"$@\"\n",
        wine_prefix.display(),
        full_exe_path.display(),
    );

    SystemCommand::new(["tee", &launcher_path.to_string_lossy()])
        .as_root(true)
        .stdin(script)
        .run()
        .await?;
    SystemCommand::new(["chmod", "+x", &launcher_path.to_string_lossy()])
        .as_root(true)
        .run()
        .await?;
    Ok(launcher_path)
}

/// Shared by [`ExeHandler`] and [`super::msi::MsiHandler`]: remove the
/// entire wineprefix, the launcher script, and any `.desktop` file.
/// Whether the prefix removal needs root depends on where it lives, not
/// on who's running `tpt` right now -- a prefix under `/var/lib` was
/// created by a privileged install and can only be removed as root.
pub(super) async fn uninstall_wine_app(
    wineprefix: &str,
    launcher_path: &str,
    as_root: bool,
) -> Result<(), Error> {
    if std::path::Path::new(wineprefix).exists() {
        if let Err(e) = SystemCommand::new(["rm", "-rf", wineprefix]).as_root(as_root).run().await {
            tracing::warn!(%wineprefix, error = %e, "failed to remove wineprefix");
        }
    }
    if std::path::Path::new(launcher_path).exists() {
        if let Err(e) = SystemCommand::new(["rm", "-f", launcher_path]).as_root(true).run().await {
            tracing::warn!(%launcher_path, error = %e, "failed to remove launcher");
        }
    }
    Ok(())
}
