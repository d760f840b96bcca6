//! Streaming download with SHA-256 verification.
//!
//! Grounded on `apl_core::io::download::download_and_verify_simple`: stream
//! the response body in 8 KiB-ish chunks, update a running digest as each
//! chunk lands, and delete the partial file on any failure rather than
//! leaving a corrupt artifact behind for the next run to trip over.

use std::path::Path;
use std::sync::Arc;

use futures::StreamExt;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tpt_schema::Error;

use crate::reporter::Reporter;

pub const USER_AGENT: &str = concat!("TPT-PackageManager/", env!("CARGO_PKG_VERSION"));

/// Download `url` to `dest`, verifying the body against `expected_sha256`
/// when one is given.
///
/// # Errors
///
/// Returns [`Error::Http`] on a transport/HTTP-status failure,
/// [`Error::Io`] on a filesystem failure, or
/// [`Error::VerificationFailed`] when `expected_sha256` doesn't match.
/// In every error case, a partially written `dest` is removed before the
/// error is returned.
pub async fn download_and_verify(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    expected_sha256: Option<&str>,
    name: &str,
    reporter: &Arc<dyn Reporter>,
) -> Result<(), Error> {
    match try_download(client, url, dest, expected_sha256, name, reporter).await {
        Ok(()) => Ok(()),
        Err(e) => {
            if dest.exists() {
                tracing::warn!(path = %dest.display(), "cleaning up partial download");
                let _ = tokio::fs::remove_file(dest).await;
            }
            Err(e)
        }
    }
}

async fn try_download(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    expected_sha256: Option<&str>,
    name: &str,
    reporter: &Arc<dyn Reporter>,
) -> Result<(), Error> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    tracing::info!(%url, path = %dest.display(), "starting download");
    let response = client.get(url).send().await?.error_for_status()?;
    let total = response.content_length();

    let mut file = tokio::fs::File::create(dest).await?;
    let mut hasher = Sha256::new();
    let mut downloaded: u64 = 0;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        hasher.update(&chunk);
        downloaded += chunk.len() as u64;
        reporter.downloading(name, downloaded, total);
    }
    file.flush().await?;

    if let Some(expected) = expected_sha256 {
        let actual = hex::encode(hasher.finalize());
        if !actual.eq_ignore_ascii_case(expected) {
            return Err(Error::VerificationFailed {
                file: dest.display().to_string(),
                expected: expected.to_string(),
                actual,
            });
        }
    }

    tracing::info!(path = %dest.display(), "download complete");
    Ok(())
}

/// Build the shared `reqwest::Client` used for manifest fetches and
/// package downloads: one `User-Agent`, one timeout, one TLS-verify
/// setting, matching `core/package_manager.py`'s `requests.Session` setup.
pub fn build_client(timeout_secs: u64, ssl_verify: bool) -> Result<reqwest::Client, Error> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .danger_accept_invalid_certs(!ssl_verify)
        .build()
        .map_err(Error::Http)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::NullReporter;

    #[tokio::test]
    async fn downloads_and_verifies_matching_checksum() {
        let mut server = mockito::Server::new_async().await;
        let body = b"hello world";
        let digest = hex::encode(Sha256::digest(body));
        let mock = server
            .mock("GET", "/file.bin")
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("file.bin");
        let client = reqwest::Client::new();
        let reporter: Arc<dyn Reporter> = Arc::new(NullReporter);

        download_and_verify(
            &client,
            &format!("{}/file.bin", server.url()),
            &dest,
            Some(&digest),
            "file.bin",
            &reporter,
        )
        .await
        .unwrap();

        mock.assert_async().await;
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), body);
    }

    #[tokio::test]
    async fn mismatched_checksum_cleans_up_partial_file() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/file.bin")
            .with_status(200)
            .with_body(b"hello world")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("file.bin");
        let client = reqwest::Client::new();
        let reporter: Arc<dyn Reporter> = Arc::new(NullReporter);

        let err = download_and_verify(
            &client,
            &format!("{}/file.bin", server.url()),
            &dest,
            Some(&"0".repeat(64)),
            "file.bin",
            &reporter,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::VerificationFailed { .. }));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn http_error_status_is_surfaced_and_cleaned_up() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/missing.bin").with_status(404).create_async().await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("missing.bin");
        let client = reqwest::Client::new();
        let reporter: Arc<dyn Reporter> = Arc::new(NullReporter);

        let err = download_and_verify(
            &client,
            &format!("{}/missing.bin", server.url()),
            &dest,
            None,
            "missing.bin",
            &reporter,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Http(_)));
        assert!(!dest.exists());
    }
}
