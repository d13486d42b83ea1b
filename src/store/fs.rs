//! File-backed key-value store for the deferred queue.
//!
//! One JSON file per key under a single directory. Keys are base32-encoded
//! into filenames so arbitrary document identifiers stay filesystem-safe
//! and can be recovered when listing.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use data_encoding::BASE32_NOPAD;
use tokio::fs;

use super::KeyValue;
use crate::error::StoreError;

/// Durable key-value store writing each entry to its own file.
#[derive(Debug, Clone)]
pub struct FileKv {
    dir: PathBuf,
}

impl FileKv {
    /// Open (creating if needed) a store rooted at `dir`.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await.map_err(io_err)?;
        Ok(Self { dir })
    }

    /// Open the store at its default location under the platform data
    /// directory.
    pub async fn open_default() -> Result<Self, StoreError> {
        let base = dirs::data_dir()
            .ok_or_else(|| StoreError::Backend("no platform data directory".to_string()))?;
        Self::open(base.join("doctrack").join("deferred")).await
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.json", BASE32_NOPAD.encode(key.as_bytes())))
    }

    fn key_for(path: &Path) -> Option<String> {
        if path.extension()? != "json" {
            return None;
        }
        let stem = path.file_stem()?.to_str()?;
        let bytes = BASE32_NOPAD.decode(stem.as_bytes()).ok()?;
        String::from_utf8(bytes).ok()
    }
}

#[async_trait]
impl KeyValue for FileKv {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path_for(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err(e)),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        fs::write(self.path_for(key), value).await.map_err(io_err)
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(e)),
        }
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await.map_err(io_err)?;
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            if let Some(key) = Self::key_for(&entry.path()) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let mut entries = fs::read_dir(&self.dir).await.map_err(io_err)?;
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            if Self::key_for(&entry.path()).is_some() {
                match fs::remove_file(entry.path()).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(io_err(e)),
                }
            }
        }
        Ok(())
    }
}

fn io_err(e: std::io::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}
