//! `PackageManager`: the install/uninstall/upgrade/AADPO pipeline that ties
//! every other component together, grounded in
//! `apl-cli::ops::install::install_packages`'s phase-separated
//! resolve -> plan -> execute -> report structure (here: resolve -> download
//! -> verify -> handler -> persist).

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use tpt_schema::{
    AadpoAction, Error, InstalledDb, InstalledRecord, NativeManager, PackageDescriptor,
    PackageName, Source, Version,
};

use crate::aadpo::AadpoStaging;
use crate::config::Config;
use crate::db::InstalledDbHandle;
use crate::exec::{check_dependency, SystemCommand};
use crate::handlers::{self, InstallCtx, SubInstaller, UninstallCtx};
use crate::io::download;
use crate::manifest::ManifestFetcher;
use crate::reporter::Reporter;
use crate::resolver::Resolver;

const SYSTEMD_UNIT_PATH: &str = "/etc/systemd/system/tpt-aadpo.service";

pub struct PackageManager {
    config: Arc<Config>,
    resolver: Resolver,
    client: reqwest::Client,
    db: InstalledDbHandle,
    reporter: Arc<dyn Reporter>,
    self_ref: Weak<PackageManager>,
}

/// Per-package outcome of a non-staged `upgrade`, so the caller can report
/// a per-package summary instead of aborting on the first failure.
pub struct UpgradeOutcome {
    pub name: PackageName,
    pub result: Result<(), Error>,
}

pub struct UpgradeCandidate {
    pub name: PackageName,
    pub installed: Version,
    pub latest: PackageDescriptor,
}

impl PackageManager {
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the shared HTTP client fails to build.
    pub fn new(config: Arc<Config>, reporter: Arc<dyn Reporter>) -> Result<Arc<Self>, Error> {
        let client = download::build_client(config.settings.network_timeout_secs, config.settings.ssl_verify)?;
        let fetcher = ManifestFetcher::new(client.clone(), config.repo_cache_dir.clone());
        let resolver = Resolver::new(fetcher, config.clone());
        let db = InstalledDbHandle::new(config.installed_db_path.clone());

        Ok(Arc::new_cyclic(|weak| Self {
            config,
            resolver,
            client,
            db,
            reporter,
            self_ref: weak.clone(),
        }))
    }

    fn sub_installer(&self) -> Arc<dyn SubInstaller> {
        self.self_ref
            .upgrade()
            .expect("PackageManager must be held in an Arc for the lifetime of any install/uninstall call")
    }

    pub async fn search(&self, term: &str) -> Vec<PackageDescriptor> {
        self.resolver.search(term).await
    }

    pub async fn list_installed(&self) -> InstalledDb {
        self.db.load().await
    }

    pub async fn get_aadpo_status(&self) -> tpt_schema::AadpoManifest {
        AadpoStaging::new(&self.config).read().await
    }

    /// Resolve, disambiguate, bypass to a native manager, or
    /// download + verify + handler.install + persist.
    ///
    /// # Errors
    ///
    /// [`Error::PackageNotFound`], [`Error::MultipleSourcesFound`], or
    /// anything the chosen handler/downloader surfaces.
    pub async fn install(
        &self,
        name: &str,
        source: Option<Source>,
        confirm_git: impl Fn(&str, &str) -> bool,
    ) -> Result<(), Error> {
        let descriptor = self.resolver.resolve_for_install(name, source, confirm_git).await?;
        self.perform_installation(descriptor, None).await
    }

    /// Installs a package whose artifact is already on disk, named only by
    /// its tpt-source descriptor -- used by the AADPO applier (the artifact
    /// was pre-downloaded during `upgrade --no-apply`).
    ///
    /// # Errors
    ///
    /// [`Error::PackageNotFound`] if `name` no longer resolves to a `tpt`
    /// source descriptor.
    pub async fn install_from_staged_file(
        &self,
        name: &str,
        staged_file: Option<String>,
    ) -> Result<(), Error> {
        let staging = AadpoStaging::new(&self.config);
        let artifact_path = staged_file.map(|f| staging.staged_file_path(&f));

        let descriptor = self
            .resolver
            .search(name)
            .await
            .into_iter()
            .find(|d| d.name == name && d.source == Source::Tpt)
            .ok_or_else(|| Error::PackageNotFound(name.to_string()))?;

        self.perform_installation(descriptor, artifact_path).await
    }

    /// Native-manager-sourced descriptors bypass the
    /// handler/DB machinery entirely; everything else downloads (unless
    /// `local_artifact` is already on disk), verifies, dispatches a
    /// handler, and persists an `InstalledRecord`.
    async fn perform_installation(
        &self,
        descriptor: PackageDescriptor,
        local_artifact: Option<PathBuf>,
    ) -> Result<(), Error> {
        match descriptor.source {
            Source::Apt => {
                SystemCommand::new(["apt-get", "install", "-y", &descriptor.name])
                    .as_root(true)
                    .run()
                    .await?;
                return Ok(());
            }
            Source::Flatpak => {
                let app_id = descriptor
                    .metadata
                    .app_id
                    .clone()
                    .unwrap_or_else(|| descriptor.name.clone());
                let remote = descriptor.metadata.remote.clone().unwrap_or_else(|| "flathub".to_string());
                SystemCommand::new(["flatpak", "install", "--user", "--noninteractive", &remote, &app_id])
                    .run()
                    .await?;
                return Ok(());
            }
            Source::Snap => {
                SystemCommand::new(["snap", "install", &descriptor.name])
                    .as_root(true)
                    .run()
                    .await?;
                return Ok(());
            }
            Source::Tpt | Source::Convention | Source::Git => {}
        }

        let format = descriptor
            .format
            .or_else(|| descriptor.download_url.as_deref().and_then(handlers::infer_format))
            .ok_or_else(|| Error::UnsupportedFormat(format!("no format for '{}'", descriptor.name)))?;

        let (artifact_path, owns_artifact) = if let Some(path) = local_artifact {
            (Some(path), false)
        } else if let Some(url) = &descriptor.download_url {
            if let Some(local_path) = url.strip_prefix("file://") {
                (Some(PathBuf::from(local_path)), false)
            } else {
                let filename = url.rsplit('/').next().unwrap_or(&descriptor.name);
                let dest = self.config.cache_dir.join("downloads").join(filename);
                download::download_and_verify(
                    &self.client,
                    url,
                    &dest,
                    descriptor.sha256.as_ref().map(tpt_schema::Sha256Hex::as_str),
                    &descriptor.name,
                    &self.reporter,
                )
                .await?;
                (Some(dest), true)
            }
        } else {
            (None, false)
        };

        let handler = handlers::dispatch(format)?;
        self.reporter.installing(&descriptor.name);
        let ctx = InstallCtx {
            descriptor: descriptor.clone(),
            artifact_path: artifact_path.clone(),
            config: self.config.clone(),
            reporter: self.reporter.clone(),
            sub_installer: Some(self.sub_installer()),
        };
        let install_result = handler.install(&ctx).await;

        if owns_artifact {
            if let Some(path) = &artifact_path {
                let _ = tokio::fs::remove_file(path).await;
            }
        }

        let details = install_result?;
        let record = InstalledRecord {
            version: descriptor.version,
            source: descriptor.source,
            repository_url: descriptor.repository_url,
            installation_details: details,
        };
        self.db
            .with_db(|db| {
                db.insert(descriptor.name.clone(), record);
                Ok(())
            })
            .await?;
        self.reporter.done(&descriptor.name);
        Ok(())
    }

    /// Prefer the TPT-DB path; fall back to probing native
    /// managers for ownership when the name is unknown to TPT.
    ///
    /// # Errors
    ///
    /// [`Error::PackageNotFound`] if no TPT record and no native manager
    /// claims the name.
    pub async fn uninstall(&self, name: &str) -> Result<(), Error> {
        let _lock = self.db.lock().await?;
        let mut db = self.db.load().await;

        if let Some(record) = db.get(name).cloned() {
            let handler = handlers::dispatch(record.installation_details.handler_tag())?;
            self.reporter.removing(name);
            let ctx = UninstallCtx {
                name: name.to_string(),
                config: self.config.clone(),
                reporter: self.reporter.clone(),
                sub_installer: Some(self.sub_installer()),
            };
            handler.uninstall(&ctx, &record.installation_details).await?;
            db.remove(name);
            self.db.save(&db).await?;
            self.reporter.done(name);
            return Ok(());
        }
        drop(_lock);

        if probe_dpkg(name).await {
            SystemCommand::new(["apt-get", "remove", "-y", name]).as_root(true).run().await?;
            return Ok(());
        }
        if probe_flatpak(name).await {
            SystemCommand::new(["flatpak", "uninstall", "--user", "--noninteractive", name]).run().await?;
            return Ok(());
        }
        if probe_snap(name).await {
            SystemCommand::new(["snap", "remove", name]).as_root(true).run().await?;
            return Ok(());
        }
        Err(Error::PackageNotFound(name.to_string()))
    }

    /// Upgrade pipeline. When `no_apply`, pre-downloads each TPT
    /// update and writes the AADPO staging manifest instead of installing
    /// immediately; the DB is left untouched either way until an install
    /// actually runs.
    ///
    /// # Errors
    ///
    /// Only top-level staging I/O failures (building the manifest, running
    /// `apt update`) are propagated; per-package install failures are
    /// captured in the returned outcomes instead.
    pub async fn upgrade(&self, no_apply: bool) -> Result<Vec<UpgradeOutcome>, Error> {
        self.refresh_git_clones().await;
        let mut candidates = self.collect_tpt_updates().await;
        candidates.extend(self.collect_git_updates().await);
        let present_managers = present_sys_managers().await;

        if no_apply {
            let staging = AadpoStaging::new(&self.config);
            let mut manifest = tpt_schema::AadpoManifest::default();

            for candidate in &candidates {
                let staged_file = if let Some(url) = &candidate.latest.download_url {
                    let filename = url.rsplit('/').next().unwrap_or(&candidate.name).to_string();
                    let dest = staging.staged_file_path(&filename);
                    download::download_and_verify(
                        &self.client,
                        url,
                        &dest,
                        candidate.latest.sha256.as_ref().map(tpt_schema::Sha256Hex::as_str),
                        &candidate.name,
                        &self.reporter,
                    )
                    .await?;
                    Some(filename)
                } else {
                    None
                };
                manifest.push(AadpoAction::InstallTpt { name: candidate.name.clone(), staged_file });
            }
            for manager in &present_managers {
                manifest.push(AadpoAction::SysUpdate { manager: *manager });
            }
            staging.write(&manifest).await?;
            return Ok(Vec::new());
        }

        if present_managers.contains(&NativeManager::Apt) {
            let _ = SystemCommand::new(["apt-get", "update"]).as_root(true).run().await;
        }

        let mut outcomes = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let result = self.perform_installation(candidate.latest, None).await;
            outcomes.push(UpgradeOutcome { name: candidate.name, result });
        }

        if present_managers.contains(&NativeManager::Apt) {
            let _ = SystemCommand::new(["apt-get", "upgrade", "-y"]).as_root(true).run().await;
            let _ = SystemCommand::new(["apt-get", "autoclean", "-y"]).as_root(true).run().await;
        }
        if present_managers.contains(&NativeManager::Flatpak) {
            let _ = SystemCommand::new(["flatpak", "update", "-y"]).run().await;
        }
        if present_managers.contains(&NativeManager::Snap) {
            let _ = SystemCommand::new(["snap", "refresh"]).as_root(true).run().await;
        }

        Ok(outcomes)
    }

    async fn collect_tpt_updates(&self) -> Vec<UpgradeCandidate> {
        let db = self.db.load().await;
        let mut out = Vec::new();
        for (name, record) in &db {
            if record.source != Source::Tpt {
                continue;
            }
            let latest = self
                .resolver
                .search(name)
                .await
                .into_iter()
                .filter(|d| d.source == Source::Tpt && d.name == *name)
                .max_by(|a, b| a.version.cmp(&b.version));
            if let Some(latest) = latest {
                if latest.version > record.version {
                    out.push(UpgradeCandidate {
                        name: name.clone(),
                        installed: record.version.clone(),
                        latest,
                    });
                }
            }
        }
        out
    }

    /// Companion to [`Self::collect_tpt_updates`] for `Source::Git` records:
    /// re-reads each clone's `packages.json` (already pulled by
    /// [`Self::refresh_git_clones`]) and compares against the installed
    /// version, same as the tpt-repository path.
    async fn collect_git_updates(&self) -> Vec<UpgradeCandidate> {
        let db = self.db.load().await;
        let clones_dir = self.config.state_dir.join("git_clones");
        let mut out = Vec::new();
        for (name, record) in &db {
            if record.source != Source::Git {
                continue;
            }
            let Some(repo) = &record.repository_url else { continue };
            let slug = repo.trim_end_matches('/').rsplit('/').next().unwrap_or("repo");
            let manifest_path = clones_dir.join(slug).join("packages.json");
            let Ok(bytes) = tokio::fs::read(&manifest_path).await else { continue };
            let Ok(manifest) = serde_json::from_slice::<tpt_schema::RepositoryManifest>(&bytes) else { continue };
            let Some(mut latest) = manifest.packages.into_iter().find(|p| &p.name == name) else { continue };
            if latest.version > record.version {
                latest.source = Source::Git;
                latest.repository_url = Some(repo.clone());
                out.push(UpgradeCandidate {
                    name: name.clone(),
                    installed: record.version.clone(),
                    latest,
                });
            }
        }
        out
    }

    async fn refresh_git_clones(&self) {
        let db = self.db.load().await;
        let clones_dir = self.config.state_dir.join("git_clones");
        let mut seen = HashSet::new();
        for record in db.values() {
            if record.source != Source::Git {
                continue;
            }
            let Some(repo) = &record.repository_url else { continue };
            if !seen.insert(repo.clone()) {
                continue;
            }
            let slug = repo.trim_end_matches('/').rsplit('/').next().unwrap_or("repo");
            let path = clones_dir.join(slug);
            if path.exists() {
                if let Err(e) = SystemCommand::new(["git", "-C", &path.to_string_lossy(), "pull"]).run().await {
                    tracing::warn!(%repo, error = %e, "failed to refresh git clone");
                }
            }
        }
    }

    /// Writes the `tpt-aadpo.service` systemd unit and enables it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] or [`Error::SystemCommand`] on failure.
    pub async fn system_integrate_install(&self, apply_updates_bin: &std::path::Path) -> Result<(), Error> {
        let unit = format!(
            "[Unit]\n\
             Description=TPT deferred update applier\n\
             DefaultDependencies=no\n\
             Before=shutdown.target reboot.target halt.target kexec.target\n\
             \n\
             [Service]\n\
             Type=oneshot\n\
             RemainAfterExit=true\n\
             ExecStart=/bin/true\n\
             ExecStop={}\n\
             TimeoutStopSec=900s\n\
             \n\
             [Install]\n\
             WantedBy=shutdown.target reboot.target halt.target kexec.target\n",
            apply_updates_bin.display()
        );
        SystemCommand::new(["tee", SYSTEMD_UNIT_PATH]).as_root(true).stdin(unit).run().await?;
        SystemCommand::new(["systemctl", "daemon-reload"]).as_root(true).run().await?;
        SystemCommand::new(["systemctl", "enable", "tpt-aadpo.service"]).as_root(true).run().await?;
        Ok(())
    }

    /// Reverses [`Self::system_integrate_install`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::SystemCommand`] if `systemctl` fails.
    pub async fn system_integrate_uninstall(&self) -> Result<(), Error> {
        let _ = SystemCommand::new(["systemctl", "disable", "tpt-aadpo.service"]).as_root(true).run().await;
        if std::path::Path::new(SYSTEMD_UNIT_PATH).exists() {
            SystemCommand::new(["rm", "-f", SYSTEMD_UNIT_PATH]).as_root(true).run().await?;
        }
        SystemCommand::new(["systemctl", "daemon-reload"]).as_root(true).run().await?;
        Ok(())
    }
}

#[async_trait]
impl SubInstaller for PackageManager {
    async fn install_local_package(&self, descriptor: &PackageDescriptor) -> Result<(), Error> {
        self.perform_installation(descriptor.clone(), None).await
    }

    async fn uninstall_package(&self, name: &str) -> Result<(), Error> {
        self.uninstall(name).await
    }
}

async fn probe_dpkg(name: &str) -> bool {
    if check_dependency("dpkg-query").is_none() {
        return false;
    }
    SystemCommand::new(["dpkg-query", "-W", "-f=${Status}", name])
        .run()
        .await
        .is_ok_and(|out| out.stdout.contains("install ok installed"))
}

async fn probe_flatpak(name: &str) -> bool {
    if check_dependency("flatpak").is_none() {
        return false;
    }
    SystemCommand::new(["flatpak", "list", "--app", "--columns=application"])
        .run()
        .await
        .is_ok_and(|out| out.stdout.lines().any(|l| l.trim() == name))
}

async fn probe_snap(name: &str) -> bool {
    if check_dependency("snap").is_none() {
        return false;
    }
    SystemCommand::new(["snap", "list", name]).run().await.is_ok()
}

async fn present_sys_managers() -> Vec<NativeManager> {
    let mut present = Vec::new();
    if check_dependency("apt").is_some() || check_dependency("apt-get").is_some() {
        present.push(NativeManager::Apt);
    }
    if check_dependency("flatpak").is_some() {
        present.push(NativeManager::Flatpak);
    }
    if check_dependency("snap").is_some() {
        present.push(NativeManager::Snap);
    }
    present
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Arc<Config> {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("XDG_STATE_HOME", dir.path().join("state"));
        std::env::set_var("XDG_CACHE_HOME", dir.path().join("cache"));
        std::env::set_var("XDG_CONFIG_HOME", dir.path().join("config"));
        Arc::new(Config::load().unwrap())
    }

    #[tokio::test]
    async fn new_builds_without_error() {
        let config = test_config();
        let pm = PackageManager::new(config, Arc::new(crate::reporter::NullReporter));
        assert!(pm.is_ok());
    }

    #[tokio::test]
    async fn uninstall_unknown_package_is_not_found() {
        let config = test_config();
        let pm = PackageManager::new(config, Arc::new(crate::reporter::NullReporter)).unwrap();
        let err = pm.uninstall("definitely-not-installed-xyz").await.unwrap_err();
        assert!(matches!(err, Error::PackageNotFound(_)));
    }
}
