//! RPM packages, preferring `dnf`/`zypper` over bare `rpm`, grounded on
//! `handlers/rpm_handler.py`.

use async_trait::async_trait;
use tpt_schema::{Error, InstallationDetails};

use super::{Handler, InstallCtx, UninstallCtx};
use crate::exec::{check_dependency, SystemCommand};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RpmTool {
    Dnf,
    Zypper,
    Rpm,
}

fn detect_tool() -> Option<RpmTool> {
    if check_dependency("dnf").is_some() {
        Some(RpmTool::Dnf)
    } else if check_dependency("zypper").is_some() {
        Some(RpmTool::Zypper)
    } else if check_dependency("rpm").is_some() {
        Some(RpmTool::Rpm)
    } else {
        None
    }
}

pub struct RpmHandler;

#[async_trait]
impl Handler for RpmHandler {
    async fn install(&self, ctx: &InstallCtx) -> Result<InstallationDetails, Error> {
        let path = ctx
            .artifact_path
            .as_ref()
            .ok_or_else(|| Error::Other("rpm handler requires a downloaded artifact".into()))?;
        let tool = detect_tool().ok_or_else(|| {
            Error::MissingDependency("no compatible RPM package manager (dnf, zypper, rpm)".into())
        })?;

        let path_str = path.to_string_lossy().into_owned();
        let argv: Vec<&str> = match tool {
            RpmTool::Dnf => vec!["dnf", "install", "-y", &path_str],
            RpmTool::Zypper => vec!["zypper", "--non-interactive", "install", &path_str],
            RpmTool::Rpm => vec!["rpm", "-i", &path_str],
        };
        SystemCommand::new(argv).as_root(true).run().await?;

        let package_name = query_package_name(path).await.unwrap_or_else(|| ctx.descriptor.name.clone());
        Ok(InstallationDetails::Rpm { package_name })
    }

    async fn uninstall(&self, _ctx: &UninstallCtx, details: &InstallationDetails) -> Result<(), Error> {
        let InstallationDetails::Rpm { package_name } = details else {
            return Err(Error::Other("installation details do not match RpmHandler".into()));
        };
        let tool = detect_tool().ok_or_else(|| {
            Error::MissingDependency("no compatible RPM package manager (dnf, zypper, rpm)".into())
        })?;
        let argv: Vec<&str> = match tool {
            RpmTool::Dnf => vec!["dnf", "remove", "-y", package_name],
            RpmTool::Zypper => vec!["zypper", "--non-interactive", "remove", package_name],
            RpmTool::Rpm => vec!["rpm", "-e", package_name],
        };
        SystemCommand::new(argv).as_root(true).run().await?;
        Ok(())
    }
}

async fn query_package_name(path: &std::path::Path) -> Option<String> {
    let out = SystemCommand::new(["rpm", "-q", "--queryformat", "%{NAME}", "-p", &path.to_string_lossy()])
        .run()
        .await
        .ok()?;
    let name = out.stdout.trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
