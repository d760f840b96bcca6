//! Path layout and persistent settings.
//!
//! Running as root puts TPT's state under `/var`/`/etc`; running as a
//! normal user puts it under the XDG base directories.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tpt_schema::Error;

/// Default upstream repositories consulted by the Manifest Fetcher when no
/// `tpt-repos.list` is present.
pub const DEFAULT_REPOS: &[&str] = &[
    "https://raw.githubusercontent.com/tovicito/NemasOS/regular/",
    "https://raw.githubusercontent.com/tovicito/Nemas-community/main/",
];

pub const REPO_MANIFEST_FILENAME: &str = "packages.json";
pub const DEFAULT_BRANCH: &str = "regular";

/// All the paths and user-tunable settings TPT needs, computed once at
/// startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub state_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub log_dir: PathBuf,
    pub config_dir: PathBuf,

    pub bin_dir: PathBuf,
    pub applications_dir: PathBuf,
    pub opt_dir: PathBuf,

    pub installed_db_path: PathBuf,
    pub repo_cache_dir: PathBuf,
    pub staging_dir: PathBuf,
    pub icon_cache_dir: PathBuf,
    pub log_file: PathBuf,
    pub applied_patches_list: PathBuf,
    pub repos_file: PathBuf,
    pub branch_file: PathBuf,

    pub settings: Settings,

    running_as_root: bool,
}

/// User-tunable knobs, persisted as `settings.json` under `config_dir`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_true")]
    pub use_rich: bool,
    #[serde(default = "default_true")]
    pub confirm_actions: bool,
    #[serde(default)]
    pub aadpo_enabled: bool,
    #[serde(default = "default_timeout")]
    pub network_timeout_secs: u64,
    #[serde(default = "default_true")]
    pub ssl_verify: bool,
}

fn default_true() -> bool {
    true
}

fn default_timeout() -> u64 {
    30
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            use_rich: true,
            confirm_actions: true,
            aadpo_enabled: false,
            network_timeout_secs: default_timeout(),
            ssl_verify: true,
        }
    }
}

fn running_as_root() -> bool {
    // SAFETY: `geteuid` takes no arguments and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

fn xdg_dir(env_var: &str, fallback_rel: &str) -> PathBuf {
    if let Ok(v) = std::env::var(env_var) {
        if !v.is_empty() {
            return PathBuf::from(v);
        }
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(fallback_rel)
}

impl Config {
    /// Load the configuration for the current process, branching on
    /// effective UID, then load (or default) `settings.json`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Critical`] if `settings.json` exists but cannot be
    /// parsed as JSON.
    pub fn load() -> Result<Self, Error> {
        let root = running_as_root();

        let (state_dir, cache_dir, log_dir, config_dir) = if root {
            (
                PathBuf::from("/var/lib/tpt"),
                PathBuf::from("/var/cache/tpt"),
                PathBuf::from("/var/log/tpt"),
                PathBuf::from("/etc/tpt"),
            )
        } else {
            let state = xdg_dir("XDG_STATE_HOME", ".local/state").join("tpt");
            let cache = xdg_dir("XDG_CACHE_HOME", ".cache").join("tpt");
            let config = xdg_dir("XDG_CONFIG_HOME", ".config").join("tpt");
            (state.clone(), cache, state, config)
        };

        let installed_db_path = state_dir.join("installed.json");
        let repo_cache_dir = cache_dir.join("repos");
        let staging_dir = state_dir.join("staging");
        let icon_cache_dir = cache_dir.join("icons");
        let log_file = log_dir.join("tpt.log");
        let applied_patches_list = state_dir.join("tpt-patches-applied.list");

        let repos_file = if Path::new("tpt-repos.list").exists() {
            PathBuf::from("tpt-repos.list")
        } else {
            config_dir.join("tpt-repos.list")
        };
        let branch_file = config_dir.join("branch.txt");

        let settings_path = config_dir.join("settings.json");
        let settings = if settings_path.exists() {
            let raw = std::fs::read_to_string(&settings_path)
                .map_err(|e| Error::Critical(format!("reading {}: {e}", settings_path.display())))?;
            serde_json::from_str(&raw)
                .map_err(|e| Error::Critical(format!("parsing {}: {e}", settings_path.display())))?
        } else {
            Settings::default()
        };

        Ok(Self {
            state_dir,
            cache_dir,
            log_dir,
            config_dir,
            bin_dir: PathBuf::from("/usr/local/bin"),
            applications_dir: PathBuf::from("/usr/share/applications"),
            opt_dir: PathBuf::from("/opt"),
            installed_db_path,
            repo_cache_dir,
            staging_dir,
            icon_cache_dir,
            log_file,
            applied_patches_list,
            repos_file,
            branch_file,
            settings,
            running_as_root: root,
        })
    }

    pub fn running_as_root(&self) -> bool {
        self.running_as_root
    }

    pub fn wine_prefix_dir(&self) -> PathBuf {
        self.state_dir.join("wine_prefixes")
    }

    /// Create every directory TPT needs at startup. Fatal if it fails: a
    /// TPT process that can't write its own state directory can't do
    /// anything useful, so this returns [`Error::Critical`] rather than a
    /// recoverable kind.
    pub fn ensure_dirs(&self) -> Result<(), Error> {
        for dir in [
            &self.state_dir,
            &self.cache_dir,
            &self.log_dir,
            &self.config_dir,
            &self.repo_cache_dir,
            &self.icon_cache_dir,
            &self.staging_dir,
        ] {
            std::fs::create_dir_all(dir)
                .map_err(|e| Error::Critical(format!("could not create {}: {e}", dir.display())))?;
        }
        Ok(())
    }

    /// Save `settings` back to `config_dir/settings.json`.
    pub fn save_settings(&self) -> Result<(), Error> {
        let path = self.config_dir.join("settings.json");
        let json = serde_json::to_string_pretty(&self.settings)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn configured_repos(&self) -> Vec<String> {
        if let Ok(contents) = std::fs::read_to_string(&self.repos_file) {
            let repos: Vec<String> = contents
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#'))
                .map(str::to_string)
                .collect();
            if !repos.is_empty() {
                return repos;
            }
        }
        DEFAULT_REPOS.iter().map(|s| (*s).to_string()).collect()
    }

    pub fn branch(&self) -> String {
        std::fs::read_to_string(&self.branch_file)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|_| DEFAULT_BRANCH.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_default_to_sane_values() {
        let s = Settings::default();
        assert!(s.use_rich);
        assert!(s.confirm_actions);
        assert!(!s.aadpo_enabled);
        assert_eq!(s.network_timeout_secs, 30);
    }

    #[test]
    fn settings_deserialize_with_partial_json() {
        let s: Settings = serde_json::from_str(r#"{"aadpo_enabled":true}"#).unwrap();
        assert!(s.aadpo_enabled);
        assert!(s.use_rich);
    }
}
