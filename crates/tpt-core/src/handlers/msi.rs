//! Windows `.msi` packages run through `wine msiexec`, grounded on
//! `handlers/msi_handler.py`.

use async_trait::async_trait;
use tpt_schema::{Error, InstallationDetails};

use super::exe::uninstall_wine_app;
use super::{Handler, InstallCtx, UninstallCtx};
use crate::desktop;
use crate::exec::SystemCommand;

pub struct MsiHandler;

#[async_trait]
impl Handler for MsiHandler {
    async fn install(&self, ctx: &InstallCtx) -> Result<InstallationDetails, Error> {
        let path = ctx
            .artifact_path
            .as_ref()
            .ok_or_else(|| Error::Other("msi handler requires a downloaded artifact".into()))?;

        let exe_in_prefix = ctx
            .descriptor
            .metadata
            .extra
            .get("executable_path_in_prefix")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Other("msi package metadata is missing 'executable_path_in_prefix'".into()))?
            .to_string();
        let silent_flags = ctx
            .descriptor
            .metadata
            .silent_args
            .clone()
            .unwrap_or_else(|| vec!["/qn".to_string()]);

        let wine_prefix = ctx.config.wine_prefix_dir().join(&ctx.descriptor.name);
        tokio::fs::create_dir_all(wine_prefix.parent().unwrap_or(&wine_prefix)).await?;

        SystemCommand::new(["wineboot", "-u"])
            .env("WINEPREFIX", wine_prefix.to_string_lossy())
            .env("WINEDEBUG", "-all")
            .run()
            .await?;

        let mut install_argv = vec![
            "wine".to_string(),
            "msiexec".to_string(),
            "/i".to_string(),
            path.to_string_lossy().into_owned(),
        ];
        install_argv.extend(silent_flags);
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

        Ok(InstallationDetails::Msi {
            wineprefix: wine_prefix.to_string_lossy().into_owned(),
            launcher_path: launcher_path.to_string_lossy().into_owned(),
            desktop_file,
            uninstall_as_root: wine_prefix.to_string_lossy().starts_with("/var/lib"),
        })
    }

    async fn uninstall(&self, _ctx: &UninstallCtx, details: &InstallationDetails) -> Result<(), Error> {
        let InstallationDetails::Msi { wineprefix, launcher_path, desktop_file, uninstall_as_root } = details else {
            return Err(Error::Other("installation details do not match MsiHandler".into()));
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
