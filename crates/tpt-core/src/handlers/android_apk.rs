//! Android `.apk` files installed into Waydroid, grounded on
//! `handlers/android_apk_handler.py`. Neither `waydroid` nor `aapt`
//! invocations need root.

use async_trait::async_trait;
use regex::Regex;
use tpt_schema::{Error, InstallationDetails};

use super::{Handler, InstallCtx, UninstallCtx};
use crate::exec::SystemCommand;

pub struct AndroidApkHandler;

/// Extract `package: name='com.example.app'` from `aapt dump badging`.
fn extract_app_id(aapt_output: &str) -> Option<String> {
    let re = Regex::new(r"package: name='([^']+)'").ok()?;
    re.captures(aapt_output)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

#[async_trait]
impl Handler for AndroidApkHandler {
    async fn install(&self, ctx: &InstallCtx) -> Result<InstallationDetails, Error> {
        let path = ctx
            .artifact_path
            .as_ref()
            .ok_or_else(|| Error::Other("android_apk handler requires a downloaded artifact".into()))?;

        let inspect = SystemCommand::new(["aapt", "dump", "badging", &path.to_string_lossy()])
            .run()
            .await?;
        let app_id = extract_app_id(&inspect.stdout)
            .ok_or_else(|| Error::VerificationFailed {
                file: path.to_string_lossy().into_owned(),
                expected: "package: name='...' in aapt output".into(),
                actual: "not found".into(),
            })?;

        SystemCommand::new(["waydroid", "app", "install", &path.to_string_lossy()])
            .run()
            .await?;
        ctx.reporter
            .info("Waydroid will finish installing in the background; the app may take a moment to appear");

        Ok(InstallationDetails::AndroidApk { package_name: app_id })
    }

    async fn uninstall(&self, _ctx: &UninstallCtx, details: &InstallationDetails) -> Result<(), Error> {
        let InstallationDetails::AndroidApk { package_name } = details else {
            return Err(Error::Other("installation details do not match AndroidApkHandler".into()));
        };
        SystemCommand::new(["waydroid", "app", "remove", package_name]).run().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_app_id_from_aapt_output() {
        let output = "package: name='com.spotify.music' versionCode='1' versionName='1.0'\nsdkVersion:'21'";
        assert_eq!(extract_app_id(output).as_deref(), Some("com.spotify.music"));
    }

    #[test]
    fn returns_none_when_package_name_missing() {
        assert!(extract_app_id("no package line here").is_none());
    }
}
