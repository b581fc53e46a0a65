//! Local filesystem storage implementation.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── top1000.json          # Snapshot document
//! └── top1000.json.*.tmp    # Transient, only while a write is in progress
//! ```
//!
//! Writes go to a sibling temporary file which is flushed, synced and then
//! renamed over the target. Rename within one directory is atomic, so a
//! concurrent reader opens either the old or the new document.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result, StoreError};
use crate::models::{Snapshot, StorageConfig};
use crate::storage::SnapshotStore;

/// Distinguishes temp files of overlapping writes within one process.
static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
    file_name: String,
    pretty: bool,
}

impl LocalStorage {
    /// Create a LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            root_dir: root_dir.into(),
            file_name: file_name.into(),
            pretty: false,
        }
    }

    /// Create a LocalStorage from storage settings.
    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(&config.dir, &config.file_name).with_pretty(config.pretty)
    }

    /// Indent written documents.
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Full path of the snapshot document.
    pub fn snapshot_path(&self) -> PathBuf {
        self.path(&self.file_name)
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let seq = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let tmp = self.path(&format!("{}.{}.{}.tmp", key, std::process::id(), seq));

        if let Err(e) = Self::write_tmp(&tmp, bytes).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e);
        }

        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(AppError::Io(e));
        }
        Ok(())
    }

    async fn write_tmp(tmp: &Path, bytes: &[u8]) -> Result<()> {
        let mut file = tokio::fs::File::create(tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        Ok(())
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }
}

#[async_trait]
impl SnapshotStore for LocalStorage {
    async fn write(&self, snapshot: &Snapshot) -> Result<()> {
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(snapshot)?
        } else {
            serde_json::to_vec(snapshot)?
        };
        self.write_bytes(&self.file_name, &bytes).await?;

        log::info!(
            "Snapshot written: {} records to {}",
            snapshot.len(),
            self.snapshot_path().display()
        );
        Ok(())
    }

    async fn read(&self) -> Result<Snapshot> {
        let path = self.snapshot_path();
        let bytes = self
            .read_bytes(&self.file_name)
            .await?
            .ok_or_else(|| StoreError::Missing(path.clone()))?;

        serde_json::from_slice(&bytes)
            .map_err(|source| StoreError::Corrupt { path, source }.into())
    }

    fn location(&self) -> String {
        self.snapshot_path().display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SiteRecord;
    use tempfile::TempDir;

    fn sample_snapshot(count: u32) -> Snapshot {
        let items = (1..=count)
            .map(|i| SiteRecord {
                site_name: format!("site{}", i % 3),
                site_id: i.to_string(),
                duplication_count: "5%".to_string(),
                file_size: "1.2GB".to_string(),
                ordinal_id: i,
            })
            .collect();
        Snapshot::new("2025-01-01 00:00", items)
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path(), "top1000.json");

        let snapshot = sample_snapshot(4);
        storage.write(&snapshot).await.unwrap();

        let loaded = storage.read().await.unwrap();
        assert_eq!(loaded, snapshot);
    }

    #[tokio::test]
    async fn test_read_missing() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path(), "top1000.json");

        let err = storage.read().await.unwrap_err();
        assert!(matches!(err, AppError::Store(StoreError::Missing(_))));
    }

    #[tokio::test]
    async fn test_read_corrupt() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path(), "top1000.json");
        std::fs::write(tmp.path().join("top1000.json"), b"{\"time\": ").unwrap();

        let err = storage.read().await.unwrap_err();
        assert!(matches!(err, AppError::Store(StoreError::Corrupt { .. })));
    }

    #[tokio::test]
    async fn test_creates_missing_dir_and_leaves_no_tmp() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("nested/public");
        let storage = LocalStorage::new(&root, "top1000.json").with_pretty(true);

        storage.write(&sample_snapshot(2)).await.unwrap();
        storage.write(&sample_snapshot(3)).await.unwrap();

        let names: Vec<_> = std::fs::read_dir(&root)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["top1000.json"]);

        let text = std::fs::read_to_string(root.join("top1000.json")).unwrap();
        assert!(text.contains("\n  \"items\""));
        assert_eq!(storage.read().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_failed_write_keeps_previous() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path(), "top1000.json");
        storage.write(&sample_snapshot(2)).await.unwrap();

        // Rooting a store under the existing snapshot file makes its writes fail.
        let blocked = LocalStorage::new(tmp.path().join("top1000.json"), "child.json");
        assert!(blocked.write(&sample_snapshot(5)).await.is_err());

        assert_eq!(storage.read().await.unwrap().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reader_never_sees_partial_document() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path(), "top1000.json");
        storage.write(&sample_snapshot(1)).await.unwrap();

        let writer = {
            let storage = storage.clone();
            tokio::spawn(async move {
                for round in 0..40 {
                    storage.write(&sample_snapshot(200 + round)).await.unwrap();
                }
            })
        };

        let reader = {
            let storage = storage.clone();
            tokio::spawn(async move {
                for _ in 0..200 {
                    let snapshot = storage.read().await.unwrap();
                    assert!(!snapshot.is_empty());
                    tokio::task::yield_now().await;
                }
            })
        };

        writer.await.unwrap();
        reader.await.unwrap();
    }
}
