//! AADPO staging: read/write the manifest and apply it, shared by
//! `PackageManager::upgrade` (which writes it) and `tpt-apply-updates`
//! (which reads and applies it).

use std::path::{Path, PathBuf};

use tpt_schema::{AadpoAction, AadpoActionOutcome, AadpoManifest, Error, NativeManager};

use crate::config::Config;
use crate::exec::SystemCommand;

pub struct AadpoStaging {
    manifest_path: PathBuf,
    files_dir: PathBuf,
}

impl AadpoStaging {
    pub fn new(config: &Config) -> Self {
        Self {
            manifest_path: config.staging_dir.join("aadpo_manifest.json"),
            files_dir: config.staging_dir.join("files"),
        }
    }

    pub fn files_dir(&self) -> &Path {
        &self.files_dir
    }

    /// Returns an empty manifest if none is staged, rather than failing --
    /// "no staged updates" is the common case, not an error.
    pub async fn read(&self) -> AadpoManifest {
        match tokio::fs::read(&self.manifest_path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
            Err(_) => AadpoManifest::default(),
        }
    }

    /// # Errors
    ///
    /// Returns [`Error::Io`] or [`Error::Json`] on failure.
    pub async fn write(&self, manifest: &AadpoManifest) -> Result<(), Error> {
        if let Some(parent) = self.manifest_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(manifest)?;
        tokio::fs::write(&self.manifest_path, json).await?;
        Ok(())
    }

    /// Remove the manifest and every staged file, once all actions have
    /// been applied (successfully or not -- the applier logs per-action
    /// failures but still clears the queue).
    pub async fn clear(&self) -> Result<(), Error> {
        let _ = tokio::fs::remove_file(&self.manifest_path).await;
        if self.files_dir.exists() {
            tokio::fs::remove_dir_all(&self.files_dir).await?;
        }
        Ok(())
    }

    pub fn staged_file_path(&self, relative_name: &str) -> PathBuf {
        self.files_dir.join(relative_name)
    }
}

/// Run the `sys_update` half of an AADPO action: the appropriate native
/// manager's non-interactive upgrade command.
///
/// # Errors
///
/// Returns [`Error::SystemCommand`] if the manager invocation fails.
pub async fn apply_sys_update(manager: NativeManager) -> Result<(), Error> {
    match manager {
        NativeManager::Apt => {
            SystemCommand::new(["apt-get", "upgrade", "-y"]).as_root(true).run().await?;
        }
        NativeManager::Flatpak => {
            SystemCommand::new(["flatpak", "update", "-y"]).run().await?;
        }
        NativeManager::Snap => {
            SystemCommand::new(["snap", "refresh"]).as_root(true).run().await?;
        }
    }
    Ok(())
}

/// Apply every staged action in order, continuing past individual
/// failures and logging each one rather than aborting the batch.
/// `install_tpt` actions are applied via a caller-supplied closure so this
/// module doesn't depend on `orchestrator` (mirroring the `SubInstaller`
/// trait the handlers use for the same reason).
pub async fn apply_all<F, Fut>(
    manifest: &AadpoManifest,
    install_tpt: F,
) -> Vec<AadpoActionOutcome>
where
    F: Fn(String, Option<String>) -> Fut,
    Fut: std::future::Future<Output = Result<(), Error>>,
{
    let mut outcomes = Vec::with_capacity(manifest.actions.len());
    for action in &manifest.actions {
        let result = match action {
            AadpoAction::InstallTpt { name, staged_file } => {
                install_tpt(name.clone(), staged_file.clone()).await
            }
            AadpoAction::SysUpdate { manager } => apply_sys_update(*manager).await,
        };
        match &result {
            Ok(()) => tracing::info!(?action, "aadpo action applied"),
            Err(e) => tracing::warn!(?action, error = %e, "aadpo action failed, continuing"),
        }
        outcomes.push(AadpoActionOutcome {
            action: action.clone(),
            succeeded: result.is_ok(),
            error: result.err().map(|e| e.to_string()),
        });
    }
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_returns_default_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let staging = AadpoStaging {
            manifest_path: dir.path().join("aadpo_manifest.json"),
            files_dir: dir.path().join("files"),
        };
        assert!(staging.read().await.is_empty());
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let staging = AadpoStaging {
            manifest_path: dir.path().join("aadpo_manifest.json"),
            files_dir: dir.path().join("files"),
        };
        let mut manifest = AadpoManifest::default();
        manifest.push(AadpoAction::SysUpdate { manager: NativeManager::Apt });
        staging.write(&manifest).await.unwrap();

        let reread = staging.read().await;
        assert_eq!(reread.actions.len(), 1);
    }

    #[tokio::test]
    async fn apply_all_continues_past_failures() {
        let mut manifest = AadpoManifest::default();
        manifest.push(AadpoAction::InstallTpt { name: "ok".into(), staged_file: None });
        manifest.push(AadpoAction::InstallTpt { name: "fails".into(), staged_file: None });

        let outcomes = apply_all(&manifest, |name, _file| async move {
            if name == "fails" {
                Err(Error::Other("boom".into()))
            } else {
                Ok(())
            }
        })
        .await;

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].succeeded);
        assert!(!outcomes[1].succeeded);
    }
}
