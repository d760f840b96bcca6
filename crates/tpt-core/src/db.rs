//! Installed-package database: a flat `name -> InstalledRecord` map
//! persisted as pretty JSON, using a `tempfile` + explicit rename over
//! in-place writes and `fs4`'s directory-lock idiom for concurrent access.
//!
//! Read failures (missing or corrupt file) fall back to an empty map with a
//! warning rather than failing the caller -- a fresh install has no DB yet,
//! and a corrupt one is not worth blocking on.

use std::path::{Path, PathBuf};

use fs4::tokio::AsyncFileExt;
use tpt_schema::{Error, InstalledDb, InstalledRecord, PackageName};

/// Holds an exclusive lock on the DB directory for as long as it lives,
/// enforcing only one orchestrator process at a time.
pub struct InstalledDbLock {
    _file: tokio::fs::File,
}

pub struct InstalledDbHandle {
    path: PathBuf,
}

impl InstalledDbHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Acquire an advisory exclusive lock on `<dir of path>/.lock`, blocking
    /// until it is available.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the lock file cannot be created or locked.
    pub async fn lock(&self) -> Result<InstalledDbLock, Error> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        tokio::fs::create_dir_all(dir).await?;
        let lock_path = dir.join(".lock");
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .open(&lock_path)
            .await?;
        file.lock_exclusive()?;
        Ok(InstalledDbLock { _file: file })
    }

    /// Load the database, defaulting to empty on any read/parse failure.
    pub async fn load(&self) -> InstalledDb {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                tracing::warn!(path = %self.path.display(), error = %e, "installed-db is corrupt, starting empty");
                InstalledDb::new()
            }),
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %self.path.display(), error = %e, "could not read installed-db, starting empty");
                }
                InstalledDb::new()
            }
        }
    }

    /// Write the database atomically: serialize to a sibling temp file,
    /// then rename over the real path so a crash mid-write never leaves a
    /// truncated DB.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] or [`Error::Json`] on failure.
    pub async fn save(&self, db: &InstalledDb) -> Result<(), Error> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        tokio::fs::create_dir_all(dir).await?;
        let json = serde_json::to_vec_pretty(db)?;

        let tmp = tempfile::NamedTempFile::new_in(dir)?;
        tokio::fs::write(tmp.path(), &json).await?;
        tmp.persist(&self.path)
            .map_err(|e| Error::Io(e.error))?;
        Ok(())
    }

    /// Convenience wrapper: lock, load, call `f`, save, unlock.
    ///
    /// # Errors
    ///
    /// Propagates any error from locking, loading, `f`, or saving.
    pub async fn with_db<F, T>(&self, f: F) -> Result<T, Error>
    where
        F: FnOnce(&mut InstalledDb) -> Result<T, Error>,
    {
        let _lock = self.lock().await?;
        let mut db = self.load().await;
        let result = f(&mut db)?;
        self.save(&db).await?;
        Ok(result)
    }
}

pub fn insert(db: &mut InstalledDb, name: PackageName, record: InstalledRecord) {
    db.insert(name, record);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tpt_schema::{InstallationDetails, Source, Version};

    fn sample_record() -> InstalledRecord {
        InstalledRecord {
            version: Version::from("1.0".to_string()),
            source: Source::Tpt,
            repository_url: None,
            installation_details: InstallationDetails::Deb { package_name: "hello".into() },
        }
    }

    #[tokio::test]
    async fn load_is_empty_when_file_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let handle = InstalledDbHandle::new(dir.path().join("installed.json"));
        let db = handle.load().await;
        assert!(db.is_empty());
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let handle = InstalledDbHandle::new(dir.path().join("installed.json"));
        let mut db = InstalledDb::new();
        insert(&mut db, "hello".into(), sample_record());
        handle.save(&db).await.unwrap();

        let reloaded = handle.load().await;
        assert_eq!(reloaded.len(), 1);
        assert!(reloaded.contains_key("hello"));
    }

    #[tokio::test]
    async fn with_db_persists_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let handle = InstalledDbHandle::new(dir.path().join("installed.json"));
        handle
            .with_db(|db| {
                insert(db, "hello".into(), sample_record());
                Ok(())
            })
            .await
            .unwrap();

        let reloaded = handle.load().await;
        assert!(reloaded.contains_key("hello"));
    }

    #[tokio::test]
    async fn corrupt_file_falls_back_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("installed.json");
        tokio::fs::write(&path, b"not json").await.unwrap();
        let handle = InstalledDbHandle::new(path);
        let db = handle.load().await;
        assert!(db.is_empty());
    }
}
