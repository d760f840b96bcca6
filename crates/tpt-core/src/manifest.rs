//! Manifest Fetcher: retrieves and caches each repository's `packages.json`.
//!
//! Shares the same `User-Agent`/timeout/SSL-verify session setup as the
//! rest of this crate's HTTP clients. The cache key is `sha256(repo_url)`
//! rather than a content hash, since what's being cached is "the last
//! manifest we saw from this URL," not content-addressed data.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tpt_schema::{Error, RepositoryManifest};

use crate::config::REPO_MANIFEST_FILENAME;

#[derive(Clone)]
pub struct ManifestFetcher {
    client: reqwest::Client,
    cache_dir: PathBuf,
}

impl ManifestFetcher {
    pub fn new(client: reqwest::Client, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            cache_dir: cache_dir.into(),
        }
    }

    fn cache_path(&self, repo_url: &str) -> PathBuf {
        let digest = hex::encode(Sha256::digest(repo_url.as_bytes()));
        self.cache_dir.join(format!("{digest}.json"))
    }

    /// Fetch `packages.json` from a single repository base URL, falling
    /// back to the last cached copy (logged at `warn!`) if the network
    /// request fails. Returns [`Error::Download`] only if both the
    /// network fetch and the cache fallback are unavailable.
    pub async fn fetch(&self, repo_base_url: &str) -> Result<RepositoryManifest, Error> {
        let url = format!(
            "{}/{REPO_MANIFEST_FILENAME}",
            repo_base_url.trim_end_matches('/')
        );
        let cache_path = self.cache_path(repo_base_url);

        match self.fetch_live(&url).await {
            Ok(manifest) => {
                if let Ok(json) = serde_json::to_vec(&manifest) {
                    if let Some(parent) = cache_path.parent() {
                        let _ = tokio::fs::create_dir_all(parent).await;
                    }
                    let _ = tokio::fs::write(&cache_path, json).await;
                }
                Ok(manifest)
            }
            Err(e) => {
                tracing::warn!(%url, error = %e, "manifest fetch failed, trying cache");
                self.read_cache(&cache_path).await.ok_or(e)
            }
        }
    }

    async fn fetch_live(&self, url: &str) -> Result<RepositoryManifest, Error> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;
        let manifest: RepositoryManifest = serde_json::from_slice(&bytes)?;
        Ok(manifest)
    }

    async fn read_cache(&self, cache_path: &Path) -> Option<RepositoryManifest> {
        let bytes = tokio::fs::read(cache_path).await.ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fetches_and_caches_manifest() {
        let mut server = mockito::Server::new_async().await;
        let body = r#"{"schema_version":1,"packages":[]}"#;
        server
            .mock("GET", "/packages.json")
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let fetcher = ManifestFetcher::new(reqwest::Client::new(), dir.path());
        let manifest = fetcher.fetch(&server.url()).await.unwrap();
        assert_eq!(manifest.schema_version, 1);

        let cache_path = fetcher.cache_path(&server.url());
        assert!(cache_path.exists());
    }

    #[tokio::test]
    async fn falls_back_to_cache_on_network_failure() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = ManifestFetcher::new(reqwest::Client::new(), dir.path());
        let repo_url = "http://127.0.0.1:1/repo";
        let cache_path = fetcher.cache_path(repo_url);
        tokio::fs::create_dir_all(cache_path.parent().unwrap()).await.unwrap();
        tokio::fs::write(&cache_path, r#"{"schema_version":1,"packages":[]}"#)
            .await
            .unwrap();

        let manifest = fetcher.fetch(repo_url).await.unwrap();
        assert_eq!(manifest.schema_version, 1);
    }

    #[tokio::test]
    async fn errors_when_no_cache_and_no_network() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = ManifestFetcher::new(reqwest::Client::new(), dir.path());
        let err = fetcher.fetch("http://127.0.0.1:1/repo").await.unwrap_err();
        assert!(matches!(err, Error::Http(_)));
    }
}
