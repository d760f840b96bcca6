//! `.desktop` file generation and cleanup.
//!
//! Grounded on `handlers/base_handler.py::_create_desktop_file`: writing
//! into `/usr/share/applications` needs root, and the original writes
//! around that by piping the file content through `sudo tee` rather than
//! `sudo cp`-ing a file it already wrote as the current user.

use std::path::{Path, PathBuf};

use tpt_schema::{DesktopEntrySpec, Error};

use crate::exec::SystemCommand;

/// Write a `.desktop` entry for `exec_path` at
/// `applications_dir/<app_name>.desktop`, returning the path written.
///
/// Returns `Ok(None)` (not an error) when `spec` is `None`: not every
/// package needs desktop integration, and skipping silently here mirrors
/// the original's "no metadata, no `.desktop` file, no problem" branch.
pub async fn create(
    applications_dir: &Path,
    app_name: &str,
    spec: Option<&DesktopEntrySpec>,
) -> Result<Option<PathBuf>, Error> {
    let Some(spec) = spec else {
        tracing::info!(%app_name, "no desktop-entry metadata, skipping .desktop file");
        return Ok(None);
    };

    SystemCommand::new(["mkdir", "-p", &applications_dir.to_string_lossy()])
        .as_root(true)
        .run()
        .await?;

    let path = applications_dir.join(format!("{app_name}.desktop"));
    let content = format!(
        "[Desktop Entry]\n\
         Version=1.0\n\
         Type=Application\n\
         Name={}\n\
         Comment={}\n\
         Exec={}\n\
         Icon={}\n\
         Terminal={}\n\
         Categories={}\n",
        spec.name,
        spec.comment,
        spec.exec,
        spec.icon,
        spec.terminal,
        spec.categories,
    );

    tracing::info!(path = %path.display(), "writing .desktop file");
    SystemCommand::new(["tee", &path.to_string_lossy()])
        .as_root(true)
        .stdin(content)
        .run()
        .await?;
    SystemCommand::new(["chmod", "644", &path.to_string_lossy()])
        .as_root(true)
        .run()
        .await?;

    Ok(Some(path))
}

/// Remove a previously-created `.desktop` file, if any. Failures are
/// logged and swallowed: a leftover launcher entry is cosmetic clutter,
/// not a reason to fail the whole uninstall.
pub async fn cleanup(desktop_file: Option<&str>) {
    let Some(path) = desktop_file else { return };
    tracing::info!(%path, "removing .desktop file");
    if let Err(e) = SystemCommand::new(["rm", "-f", path]).as_root(true).run().await {
        tracing::warn!(%path, error = %e, "failed to remove .desktop file");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_none_when_no_spec() {
        let dir = tempfile::tempdir().unwrap();
        let result = create(dir.path(), "myapp", None).await.unwrap();
        assert!(result.is_none());
    }
}
