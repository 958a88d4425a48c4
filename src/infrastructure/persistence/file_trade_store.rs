//! # File Trade Store
//!
//! [`TradeStore`] keeping one JSON snapshot per trade in a directory.
//!
//! Writes go to `<id>.json.tmp`, are synced, then renamed over
//! `<id>.json`. Rename is atomic on one filesystem, so a reader never sees
//! a partial snapshot.

use crate::application::ports::{StoreError, StoreResult, TradeStore};
use crate::domain::entities::Trade;
use crate::domain::value_objects::TradeId;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

const EXTENSION: &str = "json";

/// Directory-backed implementation of [`TradeStore`].
#[derive(Debug, Clone)]
pub struct FileTradeStore {
    dir: PathBuf,
}

impl FileTradeStore {
    /// Opens the store, creating `dir` if needed.
    ///
    /// # Errors
    ///
    /// `StoreError::Io` if the directory cannot be created.
    pub async fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await.map_err(|e| io_error(&dir, &e))?;
        Ok(Self { dir })
    }

    /// Directory holding the snapshots.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &TradeId) -> PathBuf {
        self.dir.join(format!("{}.{EXTENSION}", id.as_str()))
    }

    async fn read_path(path: &Path) -> StoreResult<Option<Trade>> {
        let data = match fs::read(path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(path, &e)),
        };
        serde_json::from_slice(&data)
            .map(Some)
            .map_err(|e| StoreError::Corrupt {
                id: path.display().to_string(),
                reason: e.to_string(),
            })
    }
}

fn io_error(path: &Path, err: &std::io::Error) -> StoreError {
    StoreError::Io(format!("{}: {err}", path.display()))
}

#[async_trait]
impl TradeStore for FileTradeStore {
    async fn read(&self, id: &TradeId) -> StoreResult<Option<Trade>> {
        Self::read_path(&self.path_for(id)).await
    }

    async fn write(&self, trade: &Trade) -> StoreResult<Trade> {
        let stored = trade.to_snapshot();
        let json = serde_json::to_vec_pretty(&stored)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let path = self.path_for(stored.id());
        let tmp = path.with_extension(format!("{EXTENSION}.tmp"));
        let mut file = fs::File::create(&tmp).await.map_err(|e| io_error(&tmp, &e))?;
        file.write_all(&json).await.map_err(|e| io_error(&tmp, &e))?;
        file.sync_all().await.map_err(|e| io_error(&tmp, &e))?;
        drop(file);
        fs::rename(&tmp, &path).await.map_err(|e| io_error(&path, &e))?;

        debug!(trade_id = %stored.id(), version = stored.version(), "snapshot written");
        Ok(stored)
    }

    async fn all(&self) -> StoreResult<Vec<Trade>> {
        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| io_error(&self.dir, &e))?;
        let mut trades = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| io_error(&self.dir, &e))? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(EXTENSION) {
                continue;
            }
            match Self::read_path(&path).await {
                Ok(Some(trade)) => trades.push(trade),
                Ok(None) => warn!(path = %path.display(), "snapshot vanished during scan"),
                Err(StoreError::Corrupt { id, reason }) => {
                    warn!(path = %id, %reason, "skipping unreadable snapshot");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(trades)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::entities::test_support::*;

    async fn store() -> (tempfile::TempDir, FileTradeStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTradeStore::open(dir.path().join("trades")).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn missing_is_none() {
        let (_dir, store) = store().await;
        assert!(store.read(sell_trade().id()).await.unwrap().is_none());
        assert!(store.all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn snapshot_survives_reopen() {
        let (dir, store) = store().await;
        let mut trade = funded_trade();
        trade.update_status().unwrap();
        trade.set_version(4);
        let stored = store.write(&trade).await.unwrap();

        let reopened = FileTradeStore::open(dir.path().join("trades")).await.unwrap();
        let read = reopened.read(trade.id()).await.unwrap().unwrap();
        assert_eq!(read, stored);
        assert_eq!(read.status(), trade.status());
        assert_eq!(read.version(), 4);
    }

    #[tokio::test]
    async fn leaves_no_temp_file() {
        let (_dir, store) = store().await;
        let trade = sell_trade();
        store.write(&trade).await.unwrap();
        store.write(&trade).await.unwrap();

        let mut names = Vec::new();
        let mut entries = fs::read_dir(store.dir()).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names, vec![format!("{}.json", trade.id())]);
    }

    #[tokio::test]
    async fn all_skips_temp_files() {
        let (_dir, store) = store().await;
        store.write(&sell_trade()).await.unwrap();
        store.write(&buy_trade()).await.unwrap();
        fs::write(store.dir().join("stray.json.tmp"), b"{").await.unwrap();
        assert_eq!(store.all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn all_skips_corrupt_snapshots() {
        let (_dir, store) = store().await;
        store.write(&sell_trade()).await.unwrap();
        fs::write(store.dir().join("junk.json"), b"not json").await.unwrap();
        let trades = store.all().await.unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].id(), sell_trade().id());
    }

    #[tokio::test]
    async fn garbage_is_corrupt() {
        let (_dir, store) = store().await;
        let id = sell_trade().id().clone();
        fs::write(store.dir().join(format!("{id}.json")), b"not json").await.unwrap();
        let err = store.read(&id).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }
}
