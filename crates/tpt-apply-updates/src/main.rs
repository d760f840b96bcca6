//! `tpt-apply-updates` - the AADPO applier, invoked by systemd at shutdown
//! via the `tpt-aadpo.service` unit `PackageManager::system_integrate_install`
//! writes. Reads the staged manifest, replays each action, clears staging,
//! and exits non-zero if anything failed (systemd bounds the whole run with
//! `TimeoutStopSec=900s`, so this binary never waits indefinitely on its own
//! subprocesses beyond what `SystemCommand` itself blocks on).

use std::process::ExitCode;
use std::sync::Arc;

use tpt_core::aadpo::{apply_all, AadpoStaging};
use tpt_core::{Config, NullReporter, PackageManager};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    match run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!(error = %e, "tpt-apply-updates aborted");
            ExitCode::FAILURE
        }
    }
}

/// Returns `Ok(true)` if every staged action succeeded.
async fn run() -> anyhow::Result<bool> {
    let config = Arc::new(Config::load()?);
    config.ensure_dirs()?;
    let staging = AadpoStaging::new(&config);

    let manifest = staging.read().await;
    if manifest.is_empty() {
        tracing::info!("no aadpo actions staged, nothing to do");
        return Ok(true);
    }

    let manager = PackageManager::new(config.clone(), Arc::new(NullReporter))?;

    let outcomes = apply_all(&manifest, |name, staged_file| {
        let manager = manager.clone();
        async move { manager.install_from_staged_file(&name, staged_file).await }
    })
    .await;

    let all_succeeded = outcomes.iter().all(|o| o.succeeded);
    for outcome in &outcomes {
        if !outcome.succeeded {
            tracing::warn!(?outcome.action, error = ?outcome.error, "aadpo action failed");
        }
    }

    staging.clear().await?;
    Ok(all_succeeded)
}
